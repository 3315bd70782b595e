//! # In-process store
//!
//! Backs the test suites and anything wiring `AppState::with_store` by hand.
//! Nothing survives a restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::Result,
    models::{DiscordProfile, Leggy, NewLeggy, Page, Registration, UserTotal, new_leggy_id, sort_totals},
    store::LeggyStore,
};

#[derive(Default)]
struct Inner {
    next_index: u64,
    leggies: BTreeMap<u64, Leggy>,
    urls: HashMap<String, u64>,
    counts: HashMap<String, u64>,
    board_updates: Vec<DateTime<Utc>>,
    profiles: HashMap<String, (DiscordProfile, DateTime<Utc>)>,
}

impl Inner {
    /// Newest first; equal timestamps fall back to the higher index.
    fn newest_first<'a>(&'a self, filter: impl Fn(&Leggy) -> bool) -> Vec<&'a Leggy> {
        let mut leggies: Vec<&Leggy> = self.leggies.values().filter(|&l| filter(l)).collect();
        leggies.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.index.cmp(&a.index))
        });

        leggies
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate(leggies: Vec<&Leggy>, page: Page) -> Vec<Leggy> {
    leggies
        .into_iter()
        .skip(page.offset())
        .take(page.limit())
        .cloned()
        .collect()
}

#[async_trait]
impl LeggyStore for MemoryStore {
    async fn register(&self, new: NewLeggy) -> Result<Registration> {
        let mut inner = self.inner.write().await;

        if let Some(url) = &new.message_url {
            if let Some(&index) = inner.urls.get(url) {
                return Ok(Registration::Duplicate { index });
            }
        }

        inner.next_index += 1;
        let leggy = Leggy {
            id: new_leggy_id(),
            index: inner.next_index,
            user_id: new.user_id,
            message_url: new.message_url,
            created_at: new.created_at,
        };

        if let Some(url) = &leggy.message_url {
            inner.urls.insert(url.clone(), leggy.index);
        }

        let count = inner.counts.entry(leggy.user_id.clone()).or_insert(0);
        *count += 1;
        let user_total = *count;

        inner.leggies.insert(leggy.index, leggy.clone());

        Ok(Registration::Registered { leggy, user_total })
    }

    async fn remove(&self, index: u64) -> Result<Option<Leggy>> {
        let mut inner = self.inner.write().await;

        let Some(leggy) = inner.leggies.remove(&index) else {
            return Ok(None);
        };

        if let Some(url) = &leggy.message_url {
            inner.urls.remove(url);
        }

        if let Some(count) = inner.counts.get_mut(&leggy.user_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.counts.remove(&leggy.user_id);
            }
        }

        Ok(Some(leggy))
    }

    async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .await
            .counts
            .get(user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn total_count(&self) -> Result<u64> {
        Ok(self.inner.read().await.leggies.len() as u64)
    }

    async fn latest(&self, page: Page) -> Result<Vec<Leggy>> {
        let inner = self.inner.read().await;

        Ok(paginate(inner.newest_first(|_| true), page))
    }

    async fn latest_for_user(&self, user_id: &str, page: Page) -> Result<Vec<Leggy>> {
        let inner = self.inner.read().await;

        Ok(paginate(inner.newest_first(|l| l.user_id == user_id), page))
    }

    async fn totals(&self) -> Result<Vec<UserTotal>> {
        let inner = self.inner.read().await;

        let mut totals: Vec<UserTotal> = inner
            .counts
            .iter()
            .map(|(user_id, &total)| UserTotal {
                user_id: user_id.clone(),
                total,
            })
            .collect();
        sort_totals(&mut totals);

        Ok(totals)
    }

    async fn created_since(&self, since: DateTime<Utc>) -> Result<Vec<Leggy>> {
        let inner = self.inner.read().await;

        Ok(inner
            .leggies
            .values()
            .filter(|l| l.created_at >= since)
            .cloned()
            .collect())
    }

    async fn last_board_update(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.read().await.board_updates.iter().max().copied())
    }

    async fn record_board_update(&self, at: DateTime<Utc>) -> Result<()> {
        self.inner.write().await.board_updates.push(at);

        Ok(())
    }

    async fn upsert_profile(
        &self,
        profile: &DiscordProfile,
        refetch_at: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .write()
            .await
            .profiles
            .insert(profile.id.clone(), (profile.clone(), refetch_at));

        Ok(())
    }

    async fn profiles(&self, user_ids: &[String]) -> Result<HashMap<String, DiscordProfile>> {
        let inner = self.inner.read().await;

        Ok(user_ids
            .iter()
            .filter_map(|id| {
                inner
                    .profiles
                    .get(id)
                    .map(|(profile, _)| (id.clone(), profile.clone()))
            })
            .collect())
    }

    async fn profiles_due(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let inner = self.inner.read().await;

        let mut due: Vec<String> = inner
            .profiles
            .iter()
            .filter(|(_, (_, refetch_at))| *refetch_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();

        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::store::ensure_board_baseline;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn new(user_id: &str, url: Option<&str>, seconds: i64) -> NewLeggy {
        NewLeggy {
            user_id: user_id.to_string(),
            message_url: url.map(str::to_string),
            created_at: at(seconds),
        }
    }

    #[tokio::test]
    async fn test_register_counts_and_dedupes() {
        let store = MemoryStore::new();

        let first = store.register(new("1", Some("u1"), 0)).await.unwrap();
        let Registration::Registered { leggy, user_total } = first else {
            panic!("expected registration");
        };
        assert_eq!(leggy.index, 1);
        assert_eq!(user_total, 1);

        let second = store.register(new("1", Some("u2"), 1)).await.unwrap();
        assert!(matches!(second, Registration::Registered { user_total: 2, .. }));

        let duplicate = store.register(new("2", Some("u1"), 2)).await.unwrap();
        assert_eq!(duplicate, Registration::Duplicate { index: 1 });

        assert_eq!(store.count_for_user("1").await.unwrap(), 2);
        assert_eq!(store.count_for_user("2").await.unwrap(), 0);
        assert_eq!(store.total_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_urlless_leggies_never_collide() {
        let store = MemoryStore::new();

        for i in 0..3 {
            store.register(new("7", None, i)).await.unwrap();
        }

        assert_eq!(store.count_for_user("7").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_remove_undoes_registration() {
        let store = MemoryStore::new();
        store.register(new("1", Some("u1"), 0)).await.unwrap();

        let removed = store.remove(1).await.unwrap().unwrap();
        assert_eq!(removed.user_id, "1");
        assert!(store.remove(1).await.unwrap().is_none());

        assert!(store.totals().await.unwrap().is_empty());
        assert!(matches!(
            store.register(new("1", Some("u1"), 5)).await.unwrap(),
            Registration::Registered { user_total: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_latest_pages_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let user = if i % 2 == 0 { "a" } else { "b" };
            store.register(new(user, None, i)).await.unwrap();
        }

        let page = store.latest(Page::new(1, 2).unwrap()).await.unwrap();
        assert_eq!(page.iter().map(|l| l.index).collect::<Vec<_>>(), vec![5, 4]);

        let page = store.latest(Page::new(3, 2).unwrap()).await.unwrap();
        assert_eq!(page.iter().map(|l| l.index).collect::<Vec<_>>(), vec![1]);

        let mine = store
            .latest_for_user("a", Page::default())
            .await
            .unwrap();
        assert_eq!(mine.iter().map(|l| l.index).collect::<Vec<_>>(), vec![5, 3, 1]);
    }

    #[tokio::test]
    async fn test_totals_and_created_since() {
        let store = MemoryStore::new();
        store.register(new("b", None, 0)).await.unwrap();
        store.register(new("a", None, 10)).await.unwrap();
        store.register(new("c", None, 20)).await.unwrap();
        store.register(new("c", None, 30)).await.unwrap();

        let totals = store.totals().await.unwrap();
        let order: Vec<(&str, u64)> = totals
            .iter()
            .map(|t| (t.user_id.as_str(), t.total))
            .collect();
        assert_eq!(order, vec![("c", 2), ("a", 1), ("b", 1)]);

        let recent = store.created_since(at(20)).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn test_board_baseline_only_once() {
        let store = MemoryStore::new();
        assert!(store.last_board_update().await.unwrap().is_none());

        ensure_board_baseline(&store, at(0)).await.unwrap();
        ensure_board_baseline(&store, at(50)).await.unwrap();
        assert_eq!(store.last_board_update().await.unwrap(), Some(at(0)));

        store.record_board_update(at(100)).await.unwrap();
        assert_eq!(store.last_board_update().await.unwrap(), Some(at(100)));
    }

    #[tokio::test]
    async fn test_profiles_due() {
        let store = MemoryStore::new();
        let profile = DiscordProfile {
            id: "1".into(),
            display_name: "one".into(),
            avatar_url: "https://cdn.discordapp.com/embed/avatars/0.png".into(),
        };

        store.upsert_profile(&profile, at(0) + Duration::hours(3)).await.unwrap();

        assert!(store.profiles_due(at(0)).await.unwrap().is_empty());
        assert_eq!(
            store.profiles_due(at(0) + Duration::hours(3)).await.unwrap(),
            vec!["1".to_string()]
        );

        let found = store
            .profiles(&["1".to_string(), "2".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["1"].display_name, "one");
    }
}
