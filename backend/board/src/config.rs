use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

use crate::error::{BoardError, Result};

pub const DEFAULT_PORT: &str = "22291";
pub const DEFAULT_PROFILE_REFRESH_SECS: &str = "300";

const SECRETS_DIR: &str = "/run/secrets";

pub struct Config {
    pub port: u16,
    pub redis_url: Option<String>,
    pub discord_token: Option<String>,
    pub profile_refresh_secs: u64,
    pub leaderboard_channel_id: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            port: try_load("RUST_PORT", DEFAULT_PORT)?,
            redis_url: optional("REDIS_URL"),
            discord_token: read_secret("DISCORD_TOKEN"),
            profile_refresh_secs: try_load("PROFILE_REFRESH_SECS", DEFAULT_PROFILE_REFRESH_SECS)?,
            leaderboard_channel_id: optional("LEADERBOARD_CHANNEL_ID"),
        })
    }

    pub fn require_redis_url(&self) -> Result<&str> {
        self.redis_url
            .as_deref()
            .ok_or_else(|| BoardError::MissingVar("REDIS_URL".to_string()))
    }

    pub fn require_discord_token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .ok_or_else(|| BoardError::MissingVar("DISCORD_TOKEN".to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 22291,
            redis_url: None,
            discord_token: None,
            profile_refresh_secs: 300,
            leaderboard_channel_id: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn optional(key: &str) -> Option<String> {
    var(key).or_else(|| {
        info!("{key} not set");
        None
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    parse(
        key,
        var(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }),
    )
}

fn parse<T: FromStr>(key: &str, value: String) -> Result<T>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        BoardError::InvalidVar {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Docker secret first, then the environment.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Failed to read {secret_name} from file: {e}, trying environment");
        })
        .ok()
        .or_else(|| optional(secret_name))
}
