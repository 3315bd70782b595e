use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
};
use board::{
    assign_ranks,
    models::{DEFAULT_PAGE_LIMIT, DiscordProfile, Leggy, Page},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

#[derive(Deserialize)]
pub struct Pagination {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn first_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Pagination {
    fn page(&self) -> Result<Page, AppError> {
        Ok(Page::new(self.page, self.limit)?)
    }
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct UserView {
    id: String,
    username: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Serialize)]
pub struct LeggyView {
    id: String,
    index: u64,
    url: Option<String>,
    user: UserView,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct LeaderboardRow {
    user_id: String,
    total: u64,
    rank: usize,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

fn leggy_view(leggy: Leggy, profiles: &HashMap<String, DiscordProfile>) -> LeggyView {
    let profile = profiles.get(&leggy.user_id);

    LeggyView {
        id: leggy.id,
        index: leggy.index,
        url: leggy.message_url,
        user: UserView {
            username: profile.map(|p| p.display_name.clone()),
            avatar_url: profile.map(|p| p.avatar_url.clone()),
            id: leggy.user_id,
        },
        created_at: leggy.created_at,
    }
}

async fn with_profiles(state: &AppState, leggies: Vec<Leggy>) -> Result<Vec<LeggyView>, AppError> {
    let mut user_ids: Vec<String> = leggies.iter().map(|l| l.user_id.clone()).collect();
    user_ids.sort();
    user_ids.dedup();

    let profiles = state.store.profiles(&user_ids).await?;

    Ok(leggies
        .into_iter()
        .map(|leggy| leggy_view(leggy, &profiles))
        .collect())
}

/// Discord ids are snowflakes: plain decimal u64s.
fn is_snowflake(user_id: &str) -> bool {
    !user_id.is_empty() && user_id.len() <= 20 && user_id.bytes().all(|b| b.is_ascii_digit())
}

pub async fn health_handler() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: Utc::now(),
    })
}

pub async fn not_found_handler() -> AppError {
    AppError::NotFound
}

pub async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<LeggyView>>, AppError> {
    let leggies = state.store.latest(pagination.page()?).await?;

    Ok(Json(with_profiles(&state, leggies).await?))
}

pub async fn user_leggies_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<LeggyView>>, AppError> {
    if !is_snowflake(&user_id) {
        return Err(AppError::MalformedPayload(format!(
            "{user_id} is not a Discord user id"
        )));
    }

    let leggies = state
        .store
        .latest_for_user(&user_id, pagination.page()?)
        .await?;

    Ok(Json(with_profiles(&state, leggies).await?))
}

pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LeaderboardRow>>, AppError> {
    let totals = state.store.totals().await?;

    let user_ids: Vec<String> = totals.iter().map(|t| t.user_id.clone()).collect();
    let profiles = state.store.profiles(&user_ids).await?;

    let rows = assign_ranks(totals)
        .into_iter()
        .map(|ranked| {
            let profile = profiles.get(&ranked.entry.user_id);

            LeaderboardRow {
                display_name: profile.map(|p| p.display_name.clone()),
                avatar_url: profile.map(|p| p.avatar_url.clone()),
                user_id: ranked.entry.user_id,
                total: ranked.entry.total,
                rank: ranked.rank,
            }
        })
        .collect();

    Ok(Json(rows))
}
