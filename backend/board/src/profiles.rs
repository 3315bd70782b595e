//! # Profile refresh
//!
//! The web frontend shows display names and avatars, which live on Discord.
//! We cache them per user and refetch every few hours.
//!
//! - On startup, every user with leggies but no cached profile is fetched once
//! - Afterwards, a periodic job refetches profiles whose `refetch_at` has passed
//! - A failed lookup is logged and retried on the next pass

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::{discord::ProfileSource, error::Result, store::LeggyStore};

pub const REFETCH_AFTER_HOURS: i64 = 3;

pub fn next_refetch(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(REFETCH_AFTER_HOURS)
}

async fn refresh(
    store: &dyn LeggyStore,
    source: &dyn ProfileSource,
    user_ids: &[String],
    now: DateTime<Utc>,
) -> Result<usize> {
    let mut refreshed = 0;

    for user_id in user_ids {
        match source.fetch_profile(user_id).await {
            Ok(profile) => {
                store.upsert_profile(&profile, next_refetch(now)).await?;
                refreshed += 1;
            }
            Err(e) => warn!("Failed to fetch Discord user {user_id}: {e}"),
        }
    }

    Ok(refreshed)
}

/// Fetches a profile for every ranked user that has none cached.
pub async fn ensure_profiles(
    store: &dyn LeggyStore,
    source: &dyn ProfileSource,
    now: DateTime<Utc>,
) -> Result<usize> {
    let user_ids: Vec<String> = store
        .totals()
        .await?
        .into_iter()
        .map(|total| total.user_id)
        .collect();

    let known = store.profiles(&user_ids).await?;
    let missing: Vec<String> = user_ids
        .into_iter()
        .filter(|id| !known.contains_key(id))
        .collect();

    let fetched = refresh(store, source, &missing, now).await?;
    info!("Fetched {fetched} of {} missing Discord users", missing.len());

    Ok(fetched)
}

/// Refetches every cached profile that is due.
pub async fn refresh_due_profiles(
    store: &dyn LeggyStore,
    source: &dyn ProfileSource,
    now: DateTime<Utc>,
) -> Result<usize> {
    let due = store.profiles_due(now).await?;

    let refreshed = refresh(store, source, &due, now).await?;
    info!("Refreshed {refreshed} discord users");

    Ok(refreshed)
}
