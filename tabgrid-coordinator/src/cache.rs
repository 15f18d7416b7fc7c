use scc::HashMap;

use crate::model::Line;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub table: String,
    pub primary_key_value: String,
}

impl CacheKey {
    pub fn new(table: &str, primary_key_value: &str) -> Self {
        Self {
            table: table.into(),
            primary_key_value: primary_key_value.into(),
        }
    }
}

/// Last known line per (table, primary-key value).
#[async_trait::async_trait]
pub trait LineCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Line>;

    async fn put(&self, key: CacheKey, line: Line);

    async fn invalidate(&self, key: &CacheKey);
}

/// Unbounded map without expiry.
#[derive(Default)]
pub struct MemoryLineCache {
    map: HashMap<CacheKey, Line>,
}

impl MemoryLineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait::async_trait]
impl LineCache for MemoryLineCache {
    async fn get(&self, key: &CacheKey) -> Option<Line> {
        self.map.read_async(key, |_, v| v.clone()).await
    }

    async fn put(&self, key: CacheKey, line: Line) {
        self.map.upsert_async(key, line).await;
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.map.remove_async(key).await;
    }
}
