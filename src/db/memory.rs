use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{cursor, ArticleStore, PreferenceStore, RawItem, ScanPage, ScanRequest, StoreError};
use crate::{models::UserId, services::candidates::normalize_tags_field};

/// Resume key: position in the scan order
#[derive(Debug, Serialize, Deserialize)]
struct OffsetKey {
    offset: usize,
}

/// Article store backed by an ordered list of raw records
///
/// Scan order is insertion order. Records are kept exactly as supplied so the
/// adapter sees the same loosely shaped items a real store would hand back,
/// duplicates included.
#[derive(Default)]
pub struct InMemoryArticleStore {
    items: RwLock<Vec<RawItem>>,
}

impl InMemoryArticleStore {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Loads a JSON array of raw records
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let items: Vec<RawItem> = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;

        tracing::info!(path = %path.display(), count = items.len(), "Seeded in-memory article store");
        Ok(Self::new(items))
    }

}

#[async_trait::async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn scan(&self, request: ScanRequest) -> Result<ScanPage, StoreError> {
        let items = self.items.read().await;

        let start = match &request.cursor {
            Some(c) => cursor::decode::<OffsetKey>(c)?.offset,
            None => 0,
        };
        if start > items.len() {
            return Err(StoreError::Validation("Cursor is out of range".to_string()));
        }

        let mut matched = Vec::new();
        let mut next_cursor = None;

        for (pos, item) in items.iter().enumerate().skip(start) {
            if let Some(predicate) = &request.predicate {
                // Records whose tags cannot be read never satisfy a tag predicate
                let tags = normalize_tags_field(item.get("tags")).unwrap_or_default();
                if !predicate.matches(&tags) {
                    continue;
                }
            }

            matched.push(item.clone());
            if matched.len() == request.limit {
                if pos + 1 < items.len() {
                    next_cursor = Some(cursor::encode(&OffsetKey { offset: pos + 1 })?);
                }
                break;
            }
        }

        Ok(ScanPage {
            items: matched,
            next_cursor,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Preferences held in process memory
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    preferences: RwLock<HashMap<UserId, BTreeSet<String>>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user: &UserId) -> Result<BTreeSet<String>, StoreError> {
        let preferences = self.preferences.read().await;
        Ok(preferences.get(user).cloned().unwrap_or_default())
    }

    async fn put(&self, user: &UserId, tags: BTreeSet<String>) -> Result<(), StoreError> {
        let mut preferences = self.preferences.write().await;
        preferences.insert(user.clone(), tags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cursor;
    use crate::services::predicate::Predicate;
    use serde_json::json;

    fn raw(id: &str, tags: serde_json::Value) -> RawItem {
        match json!({ "id": id, "tags": tags }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn predicate(tags: &[&str]) -> Option<Predicate> {
        let tags: BTreeSet<String> = tags.iter().map(|s| s.to_string()).collect();
        Predicate::any_tag(&tags)
    }

    fn ids(page: &ScanPage) -> Vec<&str> {
        page.items
            .iter()
            .map(|item| item["id"].as_str().unwrap())
            .collect()
    }

    fn store() -> InMemoryArticleStore {
        InMemoryArticleStore::new(vec![
            raw("1", json!(["Sports"])),
            raw("2", json!(["Politics"])),
            raw("3", json!("[\"Sports\", \"Health\"]")),
            raw("4", json!({ "SS": ["Health"] })),
            raw("5", json!(["Sports"])),
            raw("6", json!({ "L": [{ "S": "Travel" }, { "S": "Health" }] })),
            raw("7", json!("Travel, Science")),
        ])
    }

    #[tokio::test]
    async fn test_scan_filters_across_tag_encodings() {
        let page = store()
            .scan(ScanRequest {
                predicate: predicate(&["Health"]),
                cursor: None,
                limit: 10,
            })
            .await
            .unwrap();

        assert_eq!(ids(&page), vec!["3", "4", "6"]);
        assert!(page.next_cursor.is_none());

        let page = store()
            .scan(ScanRequest {
                predicate: predicate(&["Travel"]),
                cursor: None,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["6", "7"]);
    }

    #[tokio::test]
    async fn test_unfiltered_scan_pages_through_everything() {
        let store = store();
        let mut seen = Vec::new();
        let mut cursor = None;

        loop {
            let page = store
                .scan(ScanRequest {
                    predicate: None,
                    cursor,
                    limit: 3,
                })
                .await
                .unwrap();
            seen.extend(ids(&page).into_iter().map(str::to_string));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen, vec!["1", "2", "3", "4", "5", "6", "7"]);
    }

    #[tokio::test]
    async fn test_scan_resumes_from_cursor() {
        let store = store();
        let first = store
            .scan(ScanRequest {
                predicate: predicate(&["Sports"]),
                cursor: None,
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(ids(&first), vec!["1", "3"]);
        assert!(first.next_cursor.is_some());

        let second = store
            .scan(ScanRequest {
                predicate: predicate(&["Sports"]),
                cursor: first.next_cursor,
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(ids(&second), vec!["5"]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_last_item_filling_page_ends_scan() {
        let page = store()
            .scan(ScanRequest {
                predicate: predicate(&["Travel"]),
                cursor: None,
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["6", "7"]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_foreign_cursor_is_rejected() {
        let err = store()
            .scan(ScanRequest {
                predicate: predicate(&["Sports"]),
                cursor: Some(Cursor::new("bogus")),
                limit: 2,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_preferences_default_to_empty() {
        let store = InMemoryPreferenceStore::new();
        let user = UserId::new("auth0|42");

        let tags = tokio_test::block_on(store.get(&user)).unwrap();
        assert!(tags.is_empty());

        let wanted: BTreeSet<String> = ["Science".to_string()].into_iter().collect();
        tokio_test::block_on(store.put(&user, wanted.clone())).unwrap();
        assert_eq!(tokio_test::block_on(store.get(&user)).unwrap(), wanted);
    }
}
