//! # Profile jobs
//!
//! Keeps cached Discord display names and avatars fresh for the frontend.
//! Runs only when a `DISCORD_TOKEN` is configured.

use std::{sync::Arc, time::Duration};

use board::{
    discord::DiscordClient,
    profiles::{ensure_profiles, refresh_due_profiles},
};
use chrono::Utc;
use tokio::{task::JoinHandle, time::interval};
use tracing::{error, info, warn};

use crate::state::AppState;

pub fn start_jobs(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let Some(token) = state.config.discord_token.clone() else {
        warn!("DISCORD_TOKEN not set, profile refresh disabled");
        return None;
    };

    let discord = DiscordClient::new(token);
    let period = Duration::from_secs(state.config.profile_refresh_secs.max(1));

    Some(tokio::spawn(async move {
        info!("Starting jobs");

        if let Err(e) = ensure_profiles(state.store.as_ref(), &discord, Utc::now()).await {
            error!("Initial profile fetch failed: {e}");
        }

        let mut ticker = interval(period);
        // first tick completes immediately, startup already covered it
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if let Err(e) = refresh_due_profiles(state.store.as_ref(), &discord, Utc::now()).await {
                error!("Profile refresh failed: {e}");
            }
        }
    }))
}
