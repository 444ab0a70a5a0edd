//! 캐시 엔트리 저장소.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::CacheEntry;
use crate::error::Result;

/// 키 단위로 엔트리를 읽고 덮어쓰는 저장소.
///
/// 엔트리는 삭제하지 않습니다. 만료는 TTL 비교로만 판단합니다.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// 같은 키의 기존 엔트리를 덮어씁니다.
    async fn save(&self, entry: &CacheEntry) -> Result<()>;
}

/// 프로세스 내 저장소.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }
}
