//! # Discord
//!
//! Minimal REST v10 client: look up users for the web frontend and post
//! leaderboard messages. Gateway events and interactions are not handled here.
//!
//! Markdown helpers match what Discord renders in message content.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{BoardError, Result},
    models::DiscordProfile,
};

pub const API_BASE: &str = "https://discord.com/api/v10";
pub const CDN_BASE: &str = "https://cdn.discordapp.com";
pub const AVATAR_SIZE: u32 = 256;

/// Discord's hard limit on message content.
pub const MESSAGE_LIMIT: usize = 2000;

/// Where leaderboard messages are sent.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Sends `content` to `channel_id`, optionally as a reply, and returns the new message id.
    async fn send(&self, channel_id: &str, content: &str, reply_to: Option<&str>) -> Result<String>;
}

/// Where display names and avatars come from.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> Result<DiscordProfile>;
}

#[derive(Deserialize)]
struct User {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    discriminator: Option<String>,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReference<'a>>,
}

#[derive(Serialize)]
struct MessageReference<'a> {
    message_id: &'a str,
    fail_if_not_exists: bool,
}

#[derive(Deserialize)]
struct Message {
    id: String,
}

#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    token: String,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BoardError::Discord {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ProfileSource for DiscordClient {
    async fn fetch_profile(&self, user_id: &str) -> Result<DiscordProfile> {
        let url = format!("{API_BASE}/users/{user_id}");
        let response = self.authorized(self.http.get(&url)).send().await?;
        let user: User = Self::checked(response).await?.json().await?;

        Ok(profile_from_user(user))
    }
}

#[async_trait]
impl MessageSink for DiscordClient {
    async fn send(&self, channel_id: &str, content: &str, reply_to: Option<&str>) -> Result<String> {
        let url = format!("{API_BASE}/channels/{channel_id}/messages");
        let payload = CreateMessage {
            content,
            message_reference: reply_to.map(|message_id| MessageReference {
                message_id,
                fail_if_not_exists: false,
            }),
        };

        debug!("Posting {} characters to channel {channel_id}", content.chars().count());

        let response = self.authorized(self.http.post(&url)).json(&payload).send().await?;
        let message: Message = Self::checked(response).await?.json().await?;

        Ok(message.id)
    }
}

fn profile_from_user(user: User) -> DiscordProfile {
    let avatar_url = avatar_url(&user.id, user.avatar.as_deref(), user.discriminator.as_deref());

    DiscordProfile {
        display_name: user.global_name.unwrap_or(user.username),
        id: user.id,
        avatar_url,
    }
}

/// Custom avatar when set, otherwise one of the default embed avatars.
pub fn avatar_url(user_id: &str, avatar: Option<&str>, discriminator: Option<&str>) -> String {
    if let Some(hash) = avatar {
        let extension = if hash.starts_with("a_") { "gif" } else { "png" };
        return format!("{CDN_BASE}/avatars/{user_id}/{hash}.{extension}?size={AVATAR_SIZE}");
    }

    // legacy accounts keep a 4 digit discriminator, migrated ones report "0"
    let index = match discriminator.and_then(|d| d.parse::<u64>().ok()) {
        Some(discriminator) if discriminator != 0 => discriminator % 5,
        _ => user_id.parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0),
    };

    format!("{CDN_BASE}/embed/avatars/{index}.png")
}

pub fn user_mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

pub fn bold(text: &str) -> String {
    format!("**{text}**")
}

pub fn italic(text: &str) -> String {
    format!("_{text}_")
}

pub fn underline(text: &str) -> String {
    format!("__{text}__")
}

pub fn inline_code(text: &str) -> String {
    format!("`{text}`")
}

#[derive(Debug, Clone, Copy)]
pub enum TimestampStyle {
    LongDate,
    Relative,
}

pub fn timestamp(unix_seconds: i64, style: TimestampStyle) -> String {
    let flag = match style {
        TimestampStyle::LongDate => 'D',
        TimestampStyle::Relative => 'R',
    };

    format!("<t:{unix_seconds}:{flag}>")
}
