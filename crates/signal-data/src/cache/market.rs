//! 단일 비행(single-flight) TTL 시장 데이터 캐시.
//!
//! # 동작 흐름
//!
//! ```text
//! get_or_fetch(instrument, timeframe, ttl)
//!         │
//!         ▼
//! ┌──────────────────┐   신선함
//! │ 1. 저장소 조회     │ ─────────> 반환 (hit)
//! └────────┬─────────┘
//!          │ 없음/오래됨
//! ┌────────▼─────────┐
//! │ 2. 키별 비행 합류  │ ← 같은 키는 진행 중인 비행 하나를 공유
//! └────────┬─────────┘
//!          │ (선두 호출자만)
//! ┌────────▼─────────┐
//! │ 3. 재확인 후 페치  │ ← 어댑터 호출 (타임아웃)
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ 4. 저장소 덮어쓰기 │
//! └────────┬─────────┘
//!          ▼
//!   모든 합류자에게 같은 결과(또는 실패) 전달
//! ```
//!
//! 서로 다른 키의 요청은 서로를 기다리지 않습니다.

use serde::Serialize;
use signal_core::{CacheConfig, Clock, NormalizedMarketData, SystemClock, Timeframe};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::{cache_key, CacheEntry, CacheStore};
use crate::error::{DataError, Result};
use crate::provider::DataAdapter;

/// 진행 중인 페치 하나의 공유 결과.
type Flight = Arc<OnceCell<Result<Arc<NormalizedMarketData>>>>;

/// 캐시 통계 스냅샷.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// 실제 어댑터 호출 수
    pub fetches: u64,
    /// 진행 중인 비행에 합류한 호출 수
    pub coalesced: u64,
    pub failures: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn log_summary(&self) {
        info!(
            hits = self.hits,
            misses = self.misses,
            fetches = self.fetches,
            coalesced = self.coalesced,
            failures = self.failures,
            hit_rate = format!("{:.1}%", self.hit_rate * 100.0),
            "시장 데이터 캐시 통계"
        );
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

/// 어댑터 앞단의 시장 데이터 캐시.
pub struct MarketDataCache {
    adapter: Arc<dyn DataAdapter>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    fetch_limit: usize,
    fetch_timeout: Duration,
    in_flight: Mutex<HashMap<String, Flight>>,
    counters: Counters,
}

impl MarketDataCache {
    pub fn new(adapter: Arc<dyn DataAdapter>, store: Arc<dyn CacheStore>) -> Self {
        let defaults = CacheConfig::default();
        Self {
            adapter,
            store,
            clock: Arc::new(SystemClock),
            default_ttl: Duration::from_secs(defaults.ttl_secs),
            fetch_limit: defaults.fetch_limit,
            fetch_timeout: Duration::from_secs(defaults.fetch_timeout_secs),
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// 설정값으로 캐시를 생성합니다.
    pub fn from_config(
        adapter: Arc<dyn DataAdapter>,
        store: Arc<dyn CacheStore>,
        config: &CacheConfig,
    ) -> Self {
        Self::new(adapter, store)
            .with_default_ttl(Duration::from_secs(config.ttl_secs))
            .with_fetch_limit(config.fetch_limit)
            .with_fetch_timeout(Duration::from_secs(config.fetch_timeout_secs))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 기본 TTL로 조회합니다.
    pub async fn get(
        &self,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<Arc<NormalizedMarketData>> {
        self.get_or_fetch(instrument, timeframe, self.default_ttl).await
    }

    /// 신선한 캐시가 있으면 반환하고, 없으면 어댑터에서 가져옵니다.
    ///
    /// 같은 키에 대한 동시 요청은 하나의 어댑터 호출로 합쳐지며 모두 같은 결과를 받습니다.
    /// 어댑터가 실패하면 오래된 엔트리가 있더라도 [`DataError::Unavailable`]을 반환합니다.
    #[instrument(skip(self), fields(cache_key = tracing::field::Empty))]
    pub async fn get_or_fetch(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        ttl: Duration,
    ) -> Result<Arc<NormalizedMarketData>> {
        let key = cache_key(instrument, timeframe);
        tracing::Span::current().record("cache_key", key.as_str());

        if let Some(data) = self.load_fresh(&key, ttl).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("캐시 히트");
            return Ok(data);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let flight = self.join_flight(&key);
        let mut led = false;
        let outcome = flight
            .get_or_init(|| {
                led = true;
                self.fetch_and_store(instrument, timeframe, &key, ttl)
            })
            .await
            .clone();

        if !led {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!("진행 중인 페치 결과 공유");
        }
        self.finish_flight(&key, &flight);

        outcome
    }

    /// 통계 스냅샷을 반환합니다.
    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// 신선한 엔트리를 읽습니다. 저장소 오류와 손상된 페이로드는 미스로 취급합니다.
    async fn load_fresh(&self, key: &str, ttl: Duration) -> Option<Arc<NormalizedMarketData>> {
        let entry = match self.store.load(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(error = %e, "캐시 저장소 조회 실패, 미스로 처리");
                return None;
            }
        };

        if !entry.is_fresh(self.clock.now(), ttl) {
            debug!(fetched_at = %entry.fetched_at, "캐시 엔트리 만료");
            return None;
        }

        match entry.decode() {
            Ok(data) => Some(Arc::new(data)),
            Err(e) => {
                warn!(error = %e, "캐시 페이로드 손상, 미스로 처리");
                None
            }
        }
    }

    fn join_flight(&self, key: &str) -> Flight {
        let mut flights = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn finish_flight(&self, key: &str, flight: &Flight) {
        let mut flights = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if flights.get(key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            flights.remove(key);
        }
    }

    async fn fetch_and_store(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        key: &str,
        ttl: Duration,
    ) -> Result<Arc<NormalizedMarketData>> {
        // 직전 비행이 이미 저장했을 수 있음
        if let Some(data) = self.load_fresh(key, ttl).await {
            return Ok(data);
        }

        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        info!(adapter = self.adapter.name(), limit = self.fetch_limit, "시장 데이터 페치 시작");

        let fetch = self
            .adapter
            .fetch_candles(instrument, timeframe, self.fetch_limit);
        let result = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout(format!(
                "{} 어댑터 응답 없음 ({}초)",
                self.adapter.name(),
                self.fetch_timeout.as_secs()
            ))),
        };

        let data = match result {
            Ok(data) => Arc::new(data),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "시장 데이터 페치 실패");
                return Err(DataError::Unavailable {
                    instrument: instrument.to_string(),
                    timeframe: timeframe.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let fetched_at = self.clock.now();
        match CacheEntry::from_data(&data, fetched_at, ttl) {
            Ok(mut entry) => {
                entry.key = key.to_string();
                if let Err(e) = self.store.save(&entry).await {
                    warn!(error = %e, "캐시 저장 실패, 페치 결과는 그대로 반환");
                }
            }
            Err(e) => warn!(error = %e, "캐시 직렬화 실패"),
        }

        info!(candles = data.len(), source = data.source(), "시장 데이터 페치 완료");
        Ok(data)
    }
}
