//! # Redis
//!
//! Primary store for leggies and the per-user tallies.
//!
//! ## Keys
//!
//! - `leggy:next_index`: **int** counter, `INCR` hands out the next `#index`
//! - `leggy:{index}`: **hash** with `id`, `user_id`, `created_at` (ms) and an optional `message_url`
//! - `leggies:latest`: **zset** of zero-padded indexes scored by `created_at`
//! - `user:{user_id}:leggies`: **zset** of one user's zero-padded indexes scored by `created_at`
//! - `leggy:counts`: **hash** user id to total, kept with `HINCRBY`
//! - `leggy:urls`: **hash** message URL to index, `HSETNX` makes registration idempotent
//! - `board:updates`: **zset** of leaderboard publication times (ms)
//! - `discord_user:{id}`: **hash** with `display_name` and `avatar_url`
//! - `discord_users:refetch`: **zset** of profile ids scored by their refetch time
//!
//! ## Notes
//!
//! Registration and removal each run as one Lua script, so a failed or racing
//! call never leaves a URL claim, hash, zset member or tally behind on its own.
//! Profile writes use `MULTI` pipelines. Totals read straight from
//! `leggy:counts`, so the leaderboard is a single `HGETALL` rather than a scan.
//!
//! Zset members are padded to 20 digits. Redis orders equal scores by member
//! bytes, so padding keeps same-millisecond leggies in index order.
use std::{collections::HashMap, sync::LazyLock, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::debug;

use crate::{
    error::Result,
    models::{DiscordProfile, Leggy, NewLeggy, Page, Registration, UserTotal, new_leggy_id, sort_totals},
    store::LeggyStore,
};

const NEXT_INDEX: &str = "leggy:next_index";
const LATEST: &str = "leggies:latest";
const COUNTS: &str = "leggy:counts";
const URLS: &str = "leggy:urls";
const BOARD_UPDATES: &str = "board:updates";
const PROFILE_REFETCH: &str = "discord_users:refetch";

/// KEYS: next index, urls, latest, user zset, counts.
/// ARGV: id, user id, created_at (ms), message url or "".
/// Returns `{0, existing index}` for a known URL, else `{1, index, user total}`.
static REGISTER: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local url = ARGV[4]
if url ~= '' then
  local existing = redis.call('HGET', KEYS[2], url)
  if existing then
    return {0, tonumber(existing)}
  end
end

local index = redis.call('INCR', KEYS[1])
local key = 'leggy:' .. index
local member = string.format('%020d', index)

redis.call('HSET', key, 'id', ARGV[1], 'user_id', ARGV[2], 'created_at', ARGV[3])
if url ~= '' then
  redis.call('HSET', key, 'message_url', url)
  redis.call('HSET', KEYS[2], url, index)
end

redis.call('ZADD', KEYS[3], ARGV[3], member)
redis.call('ZADD', KEYS[4], ARGV[3], member)
local total = redis.call('HINCRBY', KEYS[5], ARGV[2], 1)

return {1, index, total}
",
    )
});

/// KEYS: leggy hash, latest, user zset, urls, counts.
/// ARGV: member, user id, message url or "".
/// Returns -1 when the hash was already gone, else the user's remaining total.
static REMOVE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('DEL', KEYS[1]) == 0 then
  return -1
end

redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('ZREM', KEYS[3], ARGV[1])
if ARGV[3] ~= '' then
  redis.call('HDEL', KEYS[4], ARGV[3])
end

local remaining = redis.call('HINCRBY', KEYS[5], ARGV[2], -1)
if remaining <= 0 then
  redis.call('HDEL', KEYS[5], ARGV[2])
end

return remaining
",
    )
});

fn member(index: u64) -> String {
    format!("{index:020}")
}

fn leggy_key(index: u64) -> String {
    format!("leggy:{index}")
}

fn user_key(user_id: &str) -> String {
    format!("user:{user_id}:leggies")
}

fn profile_key(user_id: &str) -> String {
    format!("discord_user:{user_id}")
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_secs(1));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        Ok(Self::new(init_redis(redis_url).await?))
    }

    async fn load_leggies(&self, indices: Vec<u64>) -> Result<Vec<Leggy>> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let mut connection = self.connection.clone();
        let mut pipe = redis::pipe();
        for index in &indices {
            pipe.hgetall(leggy_key(*index));
        }

        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut connection).await?;

        Ok(indices
            .into_iter()
            .zip(rows)
            .filter_map(|(index, fields)| leggy_from_fields(index, fields))
            .collect())
    }

    async fn page_of(&self, key: &str, page: Page) -> Result<Vec<Leggy>> {
        let mut connection = self.connection.clone();

        let start = page.offset();
        let stop = start + page.limit() - 1;
        let indices: Vec<u64> = connection
            .zrevrange(key, start as isize, stop as isize)
            .await?;

        self.load_leggies(indices).await
    }
}

/// Rows missing required fields (half-deleted, hand-edited) are skipped.
fn leggy_from_fields(index: u64, mut fields: HashMap<String, String>) -> Option<Leggy> {
    let created_at = fields.get("created_at")?.parse::<i64>().ok()?;

    Some(Leggy {
        id: fields.remove("id")?,
        index,
        user_id: fields.remove("user_id")?,
        message_url: fields.remove("message_url"),
        created_at: DateTime::from_timestamp_millis(created_at)?,
    })
}

fn profile_from_fields(id: &str, mut fields: HashMap<String, String>) -> Option<DiscordProfile> {
    Some(DiscordProfile {
        id: id.to_string(),
        display_name: fields.remove("display_name")?,
        avatar_url: fields.remove("avatar_url")?,
    })
}

#[async_trait]
impl LeggyStore for RedisStore {
    async fn register(&self, new: NewLeggy) -> Result<Registration> {
        let mut connection = self.connection.clone();

        let id = new_leggy_id();
        let created_ms = new.created_at.timestamp_millis();
        let url = new.message_url.as_deref().unwrap_or_default();

        let reply: Vec<u64> = REGISTER
            .key(NEXT_INDEX)
            .key(URLS)
            .key(LATEST)
            .key(user_key(&new.user_id))
            .key(COUNTS)
            .arg(&id)
            .arg(&new.user_id)
            .arg(created_ms)
            .arg(url)
            .invoke_async(&mut connection)
            .await?;

        match reply.as_slice() {
            [0, index] => {
                debug!("Message {url} already registered as #{index}");
                Ok(Registration::Duplicate { index: *index })
            }
            [1, index, user_total] => Ok(Registration::Registered {
                leggy: Leggy {
                    id,
                    index: *index,
                    user_id: new.user_id,
                    message_url: new.message_url,
                    created_at: new.created_at,
                },
                user_total: *user_total,
            }),
            _ => Err(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "unexpected register script reply",
            ))
            .into()),
        }
    }

    async fn remove(&self, index: u64) -> Result<Option<Leggy>> {
        let mut connection = self.connection.clone();

        let fields: HashMap<String, String> = connection.hgetall(leggy_key(index)).await?;
        let Some(leggy) = leggy_from_fields(index, fields) else {
            return Ok(None);
        };

        let remaining: i64 = REMOVE
            .key(leggy_key(index))
            .key(LATEST)
            .key(user_key(&leggy.user_id))
            .key(URLS)
            .key(COUNTS)
            .arg(member(index))
            .arg(&leggy.user_id)
            .arg(leggy.message_url.as_deref().unwrap_or_default())
            .invoke_async(&mut connection)
            .await?;

        // a concurrent remove got there first
        if remaining < 0 {
            return Ok(None);
        }

        Ok(Some(leggy))
    }

    async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        let mut connection = self.connection.clone();
        let count: Option<u64> = connection.hget(COUNTS, user_id).await?;

        Ok(count.unwrap_or(0))
    }

    async fn total_count(&self) -> Result<u64> {
        let mut connection = self.connection.clone();

        Ok(connection.zcard(LATEST).await?)
    }

    async fn latest(&self, page: Page) -> Result<Vec<Leggy>> {
        self.page_of(LATEST, page).await
    }

    async fn latest_for_user(&self, user_id: &str, page: Page) -> Result<Vec<Leggy>> {
        self.page_of(&user_key(user_id), page).await
    }

    async fn totals(&self) -> Result<Vec<UserTotal>> {
        let mut connection = self.connection.clone();
        let counts: HashMap<String, i64> = connection.hgetall(COUNTS).await?;

        let mut totals: Vec<UserTotal> = counts
            .into_iter()
            .filter(|(_, total)| *total > 0)
            .map(|(user_id, total)| UserTotal {
                user_id,
                total: total as u64,
            })
            .collect();
        sort_totals(&mut totals);

        Ok(totals)
    }

    async fn created_since(&self, since: DateTime<Utc>) -> Result<Vec<Leggy>> {
        let mut connection = self.connection.clone();
        let indices: Vec<u64> = connection
            .zrangebyscore(LATEST, since.timestamp_millis(), "+inf")
            .await?;

        self.load_leggies(indices).await
    }

    async fn last_board_update(&self) -> Result<Option<DateTime<Utc>>> {
        let mut connection = self.connection.clone();
        let newest: Vec<i64> = connection.zrevrange(BOARD_UPDATES, 0, 0).await?;

        Ok(newest
            .first()
            .and_then(|&ms| DateTime::from_timestamp_millis(ms)))
    }

    async fn record_board_update(&self, at: DateTime<Utc>) -> Result<()> {
        let mut connection = self.connection.clone();
        let ms = at.timestamp_millis();
        let _: () = connection.zadd(BOARD_UPDATES, ms, ms).await?;

        Ok(())
    }

    async fn upsert_profile(
        &self,
        profile: &DiscordProfile,
        refetch_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut connection = self.connection.clone();

        let () = redis::pipe()
            .atomic()
            .hset_multiple(
                profile_key(&profile.id),
                &[
                    ("display_name", profile.display_name.as_str()),
                    ("avatar_url", profile.avatar_url.as_str()),
                ],
            )
            .ignore()
            .zadd(PROFILE_REFETCH, &profile.id, refetch_at.timestamp_millis())
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(())
    }

    async fn profiles(&self, user_ids: &[String]) -> Result<HashMap<String, DiscordProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut connection = self.connection.clone();
        let mut pipe = redis::pipe();
        for id in user_ids {
            pipe.hgetall(profile_key(id));
        }

        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut connection).await?;

        Ok(user_ids
            .iter()
            .zip(rows)
            .filter_map(|(id, fields)| profile_from_fields(id, fields).map(|p| (id.clone(), p)))
            .collect())
    }

    async fn profiles_due(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();

        Ok(connection
            .zrangebyscore(PROFILE_REFETCH, "-inf", now.timestamp_millis())
            .await?)
    }
}
