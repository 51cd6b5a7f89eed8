use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::models::{RecommendationPage, UserId};

/// Cache key for a first-page recommendation request
///
/// Tags are held sorted, so the order a client listed them in never matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    user_id: UserId,
    tags: Vec<String>,
    limit: usize,
}

impl Fingerprint {
    pub fn new(user_id: &UserId, tags: &BTreeSet<String>, limit: usize) -> Self {
        Self {
            user_id: user_id.clone(),
            tags: tags.iter().cloned().collect(),
            limit,
        }
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "recs:{}:{}:{}", self.user_id, self.tags.join(","), self.limit)
    }
}

/// Short-lived store of first-page responses
///
/// Entries expire `ttl` after they were inserted. Expired entries are never
/// returned and are dropped during the cache's own maintenance, which runs on
/// the calling task; no threads are spawned. Once `capacity` entries are held,
/// inserts evict older, rarely read ones.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<Fingerprint, Arc<RecommendationPage>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Returns the stored page if it is younger than the TTL
    pub async fn get(&self, key: &Fingerprint) -> Option<Arc<RecommendationPage>> {
        self.cache.get(key).await
    }

    /// Stores `page` under `key`, replacing any previous entry and restarting its TTL
    pub async fn insert(&self, key: Fingerprint, page: Arc<RecommendationPage>) {
        self.cache.insert(key, page).await;
    }

    /// Number of live entries, after pending evictions have been applied
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cursor;

    fn key(user: &str, tags: &[&str], limit: usize) -> Fingerprint {
        let tags: BTreeSet<String> = tags.iter().map(|t| t.to_string()).collect();
        Fingerprint::new(&UserId::new(user), &tags, limit)
    }

    fn page(marker: &str) -> Arc<RecommendationPage> {
        Arc::new(RecommendationPage {
            articles: vec![],
            last_key: Some(Cursor::new(marker)),
        })
    }

    #[test]
    fn test_fingerprint_ignores_tag_order() {
        assert_eq!(key("u1", &["Sports", "Health"], 10), key("u1", &["Health", "Sports"], 10));
        assert_ne!(key("u1", &["Sports"], 10), key("u1", &["Sports"], 5));
        assert_ne!(key("u1", &["Sports"], 10), key("u2", &["Sports"], 10));
    }

    #[test]
    fn test_fingerprint_display() {
        assert_eq!(
            key("auth0|7", &["Sports", "Health"], 10).to_string(),
            "recs:auth0|7:Health,Sports:10"
        );
    }

    #[tokio::test]
    async fn test_hit_within_ttl_returns_same_page() {
        let cache = ResponseCache::new(Duration::from_secs(300), 8);
        let stored = page("p1");

        cache.insert(key("u", &["Health"], 10), stored.clone()).await;
        let hit = cache.get(&key("u", &["Health"], 10)).await.unwrap();

        assert!(Arc::ptr_eq(&hit, &stored));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_returned() {
        let cache = ResponseCache::new(Duration::from_millis(50), 8);

        cache.insert(key("u", &["Health"], 10), page("p1")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get(&key("u", &["Health"], 10)).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_overwrites_previous_page() {
        let cache = ResponseCache::new(Duration::from_secs(300), 8);

        cache.insert(key("u", &["Health"], 10), page("old")).await;
        cache.insert(key("u", &["Health"], 10), page("new")).await;

        let hit = cache.get(&key("u", &["Health"], 10)).await.unwrap();
        assert_eq!(hit.last_key, Some(Cursor::new("new")));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_bounds_entry_count() {
        let cache = ResponseCache::new(Duration::from_secs(300), 2);

        for user in ["a", "b", "c", "d", "e"] {
            cache.insert(key(user, &["T"], 1), page(user)).await;
            cache.len().await;
        }

        assert!(cache.len().await <= 2);
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let cache = ResponseCache::new(Duration::from_secs(300), 4);
        cache.insert(key("a", &["T"], 1), page("a")).await;
        cache.clear();
        assert!(cache.get(&key("a", &["T"], 1)).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_access_stays_bounded() {
        let cache = ResponseCache::new(Duration::from_secs(300), 16);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for i in 0..200 {
                        let k = key(&format!("user{}", i % 24), &["T"], t % 2);
                        if cache.get(&k).await.is_none() {
                            cache.insert(k, page("x")).await;
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.len().await <= 16);
    }
}
