//! PostgreSQL 캐시 저장소.
//!
//! `data_cache` 테이블에 키당 한 행을 유지합니다. 새로 가져온 데이터는
//! 기존 행을 덮어쓰며 이전 버전은 보존하지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signal_core::Timeframe;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStore};
use crate::error::{DataError, Result};

/// `data_cache` 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct DataCacheRecord {
    pub cache_key: String,
    pub instrument: String,
    pub timeframe: String,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub ttl_secs: i64,
}

impl DataCacheRecord {
    fn into_entry(self) -> Result<CacheEntry> {
        let timeframe: Timeframe = self
            .timeframe
            .parse()
            .map_err(DataError::InvalidData)?;

        Ok(CacheEntry {
            key: self.cache_key,
            instrument: self.instrument,
            timeframe,
            payload: self.payload,
            fetched_at: self.fetched_at,
            ttl: Duration::from_secs(self.ttl_secs.max(0) as u64),
        })
    }
}

/// PostgreSQL 기반 캐시 저장소.
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let record: Option<DataCacheRecord> = sqlx::query_as(
            r#"
            SELECT cache_key, instrument, timeframe, payload, fetched_at, ttl_secs
            FROM data_cache
            WHERE cache_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        record.map(DataCacheRecord::into_entry).transpose()
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO data_cache (cache_key, instrument, timeframe, payload, fetched_at, ttl_secs)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (cache_key) DO UPDATE SET
                instrument = EXCLUDED.instrument,
                timeframe = EXCLUDED.timeframe,
                payload = EXCLUDED.payload,
                fetched_at = EXCLUDED.fetched_at,
                ttl_secs = EXCLUDED.ttl_secs
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.instrument)
        .bind(entry.timeframe.code())
        .bind(&entry.payload)
        .bind(entry.fetched_at)
        .bind(entry.ttl.as_secs() as i64)
        .execute(&self.pool)
        .await?;

        debug!(cache_key = %entry.key, "캐시 엔트리 저장");
        Ok(())
    }
}
