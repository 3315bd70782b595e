use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    chunk::chunk_text,
    discord::{MESSAGE_LIMIT, MessageSink},
    error::{BoardError, Result},
    format::{LeaderboardInput, format_leaderboard},
    store::LeggyStore,
};

/// Packing size per message, kept under Discord's 2000 character cap.
pub const CHUNK_CAPACITY: usize = 1_950;
pub const LINE_SEPARATOR: &str = "\n";

/// Packs formatted lines into message bodies.
///
/// `chunk_text` only charges one separator per addition, so every line carries
/// its own newline here and is packed with an empty separator. That keeps each
/// joined message within [`CHUNK_CAPACITY`] however many lines it holds.
pub fn pack_messages(lines: Vec<String>) -> Result<Vec<String>> {
    let fragments = lines.into_iter().map(|line| line + LINE_SEPARATOR);

    Ok(chunk_text(fragments, CHUNK_CAPACITY, "")?
        .into_iter()
        .map(|batch| batch.concat().trim_end_matches(LINE_SEPARATOR).to_string())
        .collect())
}

/// Rejects the whole board if any message is over Discord's limit, so a
/// failed send never leaves a partial board behind.
pub fn ensure_sendable(messages: &[String]) -> Result<()> {
    match messages
        .iter()
        .position(|message| message.chars().count() > MESSAGE_LIMIT)
    {
        Some(idx) => Err(BoardError::InvalidInput(format!(
            "message {} of {} is over {MESSAGE_LIMIT} characters",
            idx + 1,
            messages.len()
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub message_ids: Vec<String>,
    pub total_leggies: u64,
    pub added_since_update: u64,
    pub users: usize,
}

/// Formats the current leaderboard into message-sized chunks.
///
/// Returns the joined messages plus the summary counts, without sending anything.
pub async fn render_leaderboard(
    store: &dyn LeggyStore,
    now: DateTime<Utc>,
) -> Result<(Vec<String>, PublishSummary)> {
    let totals = store.totals().await?;
    let total_leggies = store.total_count().await?;

    let mut added_since_update: HashMap<String, u64> = HashMap::new();
    if let Some(last_update) = store.last_board_update().await? {
        for leggy in store.created_since(last_update).await? {
            *added_since_update.entry(leggy.user_id).or_insert(0) += 1;
        }
    }

    let input = LeaderboardInput {
        totals: &totals,
        added_since_update: &added_since_update,
        total_leggies,
        generated_at: now,
    };
    let lines = format_leaderboard(&input);

    let messages = pack_messages(lines)?;

    let summary = PublishSummary {
        message_ids: Vec::new(),
        total_leggies,
        added_since_update: input.added_total(),
        users: totals.len(),
    };

    Ok((messages, summary))
}

/// Posts the leaderboard to `channel_id` and records the board update.
///
/// The first chunk is sent as a fresh message and every later chunk replies to it.
pub async fn publish_leaderboard(
    store: &dyn LeggyStore,
    sink: &dyn MessageSink,
    channel_id: &str,
    now: DateTime<Utc>,
) -> Result<PublishSummary> {
    let (messages, mut summary) = render_leaderboard(store, now).await?;
    ensure_sendable(&messages)?;

    for (idx, content) in messages.iter().enumerate() {
        debug!(
            "Sending chunk {} of {}: {} characters",
            idx + 1,
            messages.len(),
            content.chars().count()
        );

        let reply_to = summary.message_ids.first().map(String::as_str);
        let id = sink.send(channel_id, content, reply_to).await?;
        summary.message_ids.push(id);
    }

    store.record_board_update(now).await?;

    info!(
        "Published leaderboard for {} users in {} messages",
        summary.users,
        summary.message_ids.len()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use tokio::sync::Mutex;

    use super::*;
    use crate::{memory::MemoryStore, models::NewLeggy};

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String, Option<String>)>>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, channel_id: &str, content: &str, reply_to: Option<&str>) -> Result<String> {
            let mut sent = self.sent.lock().await;
            sent.push((
                channel_id.to_string(),
                content.to_string(),
                reply_to.map(str::to_string),
            ));

            Ok(format!("m{}", sent.len()))
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    async fn seed(store: &MemoryStore, user_id: &str, count: u64, created_at: DateTime<Utc>) {
        for _ in 0..count {
            store
                .register(NewLeggy {
                    user_id: user_id.to_string(),
                    message_url: None,
                    created_at,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_publish_small_board() {
        let store = MemoryStore::new();
        store.record_board_update(at(0)).await.unwrap();
        seed(&store, "1", 3, at(-10)).await;
        seed(&store, "2", 2, at(10)).await;

        let sink = RecordingSink::default();
        let summary = publish_leaderboard(&store, &sink, "chan", at(20)).await.unwrap();

        assert_eq!(summary.message_ids, vec!["m1".to_string()]);
        assert_eq!(summary.total_leggies, 5);
        assert_eq!(summary.added_since_update, 2);
        assert_eq!(summary.users, 2);

        let sent = sink.sent.lock().await;
        let (channel, content, reply_to) = &sent[0];
        assert_eq!(channel, "chan");
        assert!(reply_to.is_none());
        assert!(content.contains("# 🥇 `3` Leggies\n<@1>"));
        assert!(content.contains("## 🥈 `2` Leggies\n<@2> (**🔺2**)"));

        assert_eq!(store.last_board_update().await.unwrap(), Some(at(20)));
    }

    #[tokio::test]
    async fn test_large_board_splits_into_replies() {
        let store = MemoryStore::new();
        for user in 0..400u64 {
            // distinct totals so every user gets its own line
            seed(&store, &format!("{}", 100_000_000_000_000_000 + user), user + 1, at(0)).await;
        }

        let sink = RecordingSink::default();
        let summary = publish_leaderboard(&store, &sink, "chan", at(60)).await.unwrap();

        let sent = sink.sent.lock().await;
        assert!(sent.len() > 1);
        assert_eq!(summary.message_ids.len(), sent.len());
        assert!(sent[0].2.is_none());
        assert!(sent[1..].iter().all(|(_, _, reply)| reply.as_deref() == Some("m1")));
        assert!(sent.iter().all(|(_, content, _)| content.chars().count() <= MESSAGE_LIMIT));

        // nothing dropped: every user is mentioned exactly once across messages
        let everything: String = sent.iter().map(|(_, content, _)| content.as_str()).collect();
        assert_eq!(everything.matches("<@").count(), 400);
    }

    #[tokio::test]
    async fn test_huge_tie_stays_under_limit() {
        let store = MemoryStore::new();
        seed(&store, "1", 3, at(0)).await;
        for user in 0..400u64 {
            seed(&store, &format!("{}", 200_000_000_000_000_000 + user), 1, at(0)).await;
        }

        let sink = RecordingSink::default();
        publish_leaderboard(&store, &sink, "chan", at(60)).await.unwrap();

        let sent = sink.sent.lock().await;
        assert!(sent.len() > 1);
        assert!(sent.iter().all(|(_, content, _)| content.chars().count() <= MESSAGE_LIMIT));

        let everything: String = sent.iter().map(|(_, content, _)| content.as_str()).collect();
        assert_eq!(everything.matches("<@").count(), 401);
    }

    #[test]
    fn test_ensure_sendable() {
        assert!(ensure_sendable(&["a".repeat(MESSAGE_LIMIT)]).is_ok());

        let too_long = vec!["ok".to_string(), "a".repeat(MESSAGE_LIMIT + 1)];
        assert!(matches!(ensure_sendable(&too_long), Err(BoardError::InvalidInput(_))));
    }

    #[test]
    fn test_pack_messages_counts_every_newline() {
        let lines: Vec<String> = (0..100).map(|_| "z".repeat(38)).collect();
        let messages = pack_messages(lines).unwrap();

        // 39 characters per line with its newline, 50 lines fit in 1950
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].lines().count(), 50);
        assert_eq!(messages[0].chars().count(), 50 * 39 - 1);
        assert!(!messages[1].ends_with('\n'));
    }

    #[tokio::test]
    async fn test_no_baseline_means_nothing_added() {
        let store = MemoryStore::new();
        seed(&store, "1", 1, at(0)).await;

        let (messages, summary) = render_leaderboard(&store, at(0) + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(summary.added_since_update, 0);
    }
}
