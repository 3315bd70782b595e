//! # Leggy Processing
//!
//! Admin side of the leaderboard. Everything that writes lives here so the API
//! server can stay read-only.
//!
//! ## Commands
//!
//! - `register <user> <message link>`: count a leggy for a user, once per message
//! - `unregister <index>`: undo a registration by its `#index`
//! - `seed <path or url>`: bulk load `count,user_id` CSV rows as link-less leggies
//! - `leaderboard [--channel id] [--dry-run]`: post the ranked board to Discord
//!
//! ## Leaderboard Flow
//! 1. Read totals, highest first, and rank them with ties sharing a rank.
//! 2. Count leggies per user since the previous board update for the 🔺 markers.
//! 3. Format podium headings for the first three tie groups, then an "Other" list.
//! 4. Pack lines into messages under Discord's size cap, never splitting a line.
//! 5. Send the first message, reply to it with the rest, then record the update.
//!
//! A dry run stops after step 4 and prints the messages.
use std::path::Path;

use anyhow::{Context, Result, bail};
use board::{
    LeggyStore,
    config::Config,
    database::RedisStore,
    discord::{DiscordClient, inline_code, user_mention},
    format::group_thousands,
    models::{NewLeggy, Registration},
    publish::{publish_leaderboard, render_leaderboard},
    store::ensure_board_baseline,
};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub mod utils;

use utils::{SeedRow, parse_message_url, parse_seed_csv, parse_user_id};

pub async fn open_store(config: &Config) -> Result<RedisStore> {
    let redis_url = config.require_redis_url()?;

    let store = RedisStore::connect(redis_url)
        .await
        .with_context(|| format!("failed to connect to {redis_url}"))?;
    ensure_board_baseline(&store, Utc::now()).await?;

    Ok(store)
}

pub async fn register(store: &dyn LeggyStore, user: &str, message_url: &str) -> Result<String> {
    let user_id = parse_user_id(user)?;
    let message_url = parse_message_url(message_url)?;

    let registration = store
        .register(NewLeggy {
            user_id: user_id.clone(),
            message_url: Some(message_url.clone()),
            created_at: Utc::now(),
        })
        .await?;

    Ok(match registration {
        Registration::Registered { leggy, user_total } => format!(
            "Successfully registered leggy {} for {} ({})!",
            inline_code(&format!("#{user_total}")),
            user_mention(&user_id),
            inline_code(&format!("#{}", leggy.index)),
        ),
        Registration::Duplicate { index } => format!(
            "Leggy already registered for {message_url} ({})",
            inline_code(&format!("#{index}"))
        ),
    })
}

pub async fn unregister(store: &dyn LeggyStore, index: u64) -> Result<String> {
    match store.remove(index).await? {
        Some(leggy) => {
            info!("Removed leggy #{index} for {}", leggy.user_id);
            Ok(format!(
                "Successfully deleted leggy {}.",
                inline_code(&format!("#{index}"))
            ))
        }
        None => bail!("No leggy #{index} found"),
    }
}

async fn read_source(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source).await?.error_for_status()?;
        return Ok(response.text().await?);
    }

    tokio::fs::read_to_string(Path::new(source))
        .await
        .with_context(|| format!("failed to read {source}"))
}

pub async fn seed_rows(store: &dyn LeggyStore, rows: &[SeedRow]) -> Result<u64> {
    let total: u64 = rows.iter().map(|row| row.count).sum();

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    for row in rows {
        pb.set_message(format!("Seeding {}", row.user_id));

        for _ in 0..row.count {
            store
                .register(NewLeggy {
                    user_id: row.user_id.clone(),
                    message_url: None,
                    created_at: Utc::now(),
                })
                .await?;
            pb.inc(1);
        }
    }

    pb.finish_with_message("Done");

    Ok(total)
}

pub async fn seed(store: &dyn LeggyStore, source: &str) -> Result<String> {
    let text = read_source(source).await?;
    let rows = parse_seed_csv(&text)?;

    println!(
        "Parsed {} users. Seeding database...",
        inline_code(&group_thousands(rows.len() as u64))
    );

    let created = seed_rows(store, &rows).await?;

    Ok(format!(
        "Database seeded! Created {} leggy entries.",
        inline_code(&group_thousands(created))
    ))
}

pub async fn leaderboard(
    store: &dyn LeggyStore,
    config: &Config,
    channel: Option<String>,
    dry_run: bool,
) -> Result<String> {
    let now = Utc::now();

    if dry_run {
        let (messages, summary) = render_leaderboard(store, now).await?;
        for (idx, message) in messages.iter().enumerate() {
            println!("--- message {} of {} ---\n{message}", idx + 1, messages.len());
        }

        return Ok(format!(
            "Dry run: {} users, {} messages, nothing sent",
            summary.users,
            messages.len()
        ));
    }

    let Some(channel) = channel.or_else(|| config.leaderboard_channel_id.clone()) else {
        bail!("pass --channel or set LEADERBOARD_CHANNEL_ID");
    };
    let discord = DiscordClient::new(config.require_discord_token()?);

    let summary = publish_leaderboard(store, &discord, &channel, now).await?;

    Ok(format!(
        "Posted {} messages: {} leggies total, {} since last update",
        summary.message_ids.len(),
        group_thousands(summary.total_leggies),
        group_thousands(summary.added_since_update)
    ))
}
