use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    models::{DiscordProfile, Leggy, NewLeggy, Page, Registration, UserTotal},
};

/// Persistence for leggies, board updates and cached Discord profiles.
#[async_trait]
pub trait LeggyStore: Send + Sync {
    /// Stores a new leggy unless its message URL is already registered.
    async fn register(&self, new: NewLeggy) -> Result<Registration>;

    /// Deletes a leggy by index, returning it if it existed.
    async fn remove(&self, index: u64) -> Result<Option<Leggy>>;

    async fn count_for_user(&self, user_id: &str) -> Result<u64>;

    async fn total_count(&self) -> Result<u64>;

    /// Newest first.
    async fn latest(&self, page: Page) -> Result<Vec<Leggy>>;

    /// Newest first, one user.
    async fn latest_for_user(&self, user_id: &str, page: Page) -> Result<Vec<Leggy>>;

    /// Per-user totals, highest first, ties by user id.
    async fn totals(&self) -> Result<Vec<UserTotal>>;

    /// Leggies created at or after `since`.
    async fn created_since(&self, since: DateTime<Utc>) -> Result<Vec<Leggy>>;

    async fn last_board_update(&self) -> Result<Option<DateTime<Utc>>>;

    async fn record_board_update(&self, at: DateTime<Utc>) -> Result<()>;

    async fn upsert_profile(&self, profile: &DiscordProfile, refetch_at: DateTime<Utc>)
    -> Result<()>;

    async fn profiles(&self, user_ids: &[String]) -> Result<HashMap<String, DiscordProfile>>;

    /// Ids of stored profiles whose refetch time has passed.
    async fn profiles_due(&self, now: DateTime<Utc>) -> Result<Vec<String>>;
}

/// A fresh store gets a board update for `now` so the first leaderboard has a
/// baseline for "added since last update".
pub async fn ensure_board_baseline(store: &dyn LeggyStore, now: DateTime<Utc>) -> Result<()> {
    if store.last_board_update().await?.is_none() {
        store.record_board_update(now).await?;
    }

    Ok(())
}
