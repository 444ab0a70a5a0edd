//! 캐시 엔트리와 키 생성.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use signal_core::{NormalizedMarketData, Timeframe};
use std::time::Duration;

use crate::error::Result;

/// `instrument:timeframe`의 SHA-256 다이제스트 (hex).
///
/// 대소문자와 표기를 정규화하지 않습니다. `"btc/usdt"`와 `"BTC/USDT"`는 서로 다른 키입니다.
pub fn cache_key(instrument: &str, timeframe: Timeframe) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instrument.as_bytes());
    hasher.update(b":");
    hasher.update(timeframe.code().as_bytes());
    hex::encode(hasher.finalize())
}

/// 직렬화된 시장 데이터 스냅샷 1건.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub instrument: String,
    pub timeframe: Timeframe,
    /// `NormalizedMarketData`의 JSON 직렬화
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// 스냅샷을 직렬화해 엔트리를 만듭니다.
    pub fn from_data(
        data: &NormalizedMarketData,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            key: cache_key(data.instrument(), data.timeframe()),
            instrument: data.instrument().to_string(),
            timeframe: data.timeframe(),
            payload: serde_json::to_value(data)?,
            fetched_at,
            ttl,
        })
    }

    /// `now - fetched_at < min(ttl, requested_ttl)`이면 사용 가능합니다.
    pub fn is_fresh(&self, now: DateTime<Utc>, requested_ttl: Duration) -> bool {
        let max_age = self.ttl.min(requested_ttl);
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now - self.fetched_at < max_age,
            Err(_) => true,
        }
    }

    /// 페이로드를 역직렬화합니다. 순서 불변식도 다시 검증됩니다.
    pub fn decode(&self) -> Result<NormalizedMarketData> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
