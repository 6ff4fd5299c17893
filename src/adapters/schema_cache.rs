use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::clock::Clock;
use crate::domain::schema::SchemaDocument;

/// Parsed schema documents keyed by schema key, each valid for `ttl` after
/// insertion
pub struct SchemaCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    document: Arc<SchemaDocument>,
    stored_at: DateTime<Utc>,
}

impl SchemaCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh entry for `key`; expired entries are dropped on lookup
    pub async fn get(&self, key: &str) -> Option<Arc<SchemaDocument>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if now - entry.stored_at < self.ttl => {
                    return Some(entry.document.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().await.remove(key);
        None
    }

    pub async fn insert(&self, key: impl Into<String>, document: Arc<SchemaDocument>) {
        let entry = CacheEntry {
            document,
            stored_at: self.clock.now(),
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use serde_json::json;

    fn document() -> Arc<SchemaDocument> {
        Arc::new(
            SchemaDocument::from_value(&json!({
                "$defs": { "Root": { "type": "object", "properties": {} } }
            }))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::default());
        let cache = SchemaCache::new(Duration::seconds(300), clock.clone());
        cache.insert("summarize", document()).await;

        clock.advance(Duration::seconds(299));
        assert!(cache.get("summarize").await.is_some());

        clock.advance(Duration::seconds(1));
        assert!(cache.get("summarize").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = SchemaCache::new(Duration::seconds(60), Arc::new(ManualClock::default()));
        cache.insert("a", document()).await;
        cache.invalidate("a").await;
        assert!(cache.get("a").await.is_none());
    }
}
