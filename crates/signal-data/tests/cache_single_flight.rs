//! MarketDataCache 단일 비행 / 신선도 통합 테스트

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal_macros::dec;
use signal_core::{Candle, ManualClock, NormalizedMarketData, Timeframe};
use signal_data::{
    CacheEntry, CacheStore, DataAdapter, DataError, InMemoryCacheStore, MarketDataCache, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// 호출 횟수를 세는 테스트용 어댑터.
#[derive(Default)]
struct CountingAdapter {
    calls: Mutex<HashMap<(String, Timeframe), usize>>,
    delay: Duration,
    fail: AtomicBool,
    /// 설정되면 H1 요청은 알림을 받을 때까지 대기
    h1_gate: Option<Arc<Notify>>,
}

impl CountingAdapter {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn calls(&self, instrument: &str, timeframe: Timeframe) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&(instrument.to_string(), timeframe))
            .copied()
            .unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl DataAdapter for CountingAdapter {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        _limit: usize,
    ) -> Result<NormalizedMarketData> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry((instrument.to_string(), timeframe))
            .or_default() += 1;

        if timeframe == Timeframe::H1 {
            if let Some(gate) = &self.h1_gate {
                gate.notified().await;
            }
        }
        tokio::time::sleep(self.delay).await;

        if self.fail.load(Ordering::SeqCst) {
            return Err(DataError::provider("counting", "connection reset"));
        }

        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = vec![Candle::new(ts, dec!(1), dec!(2), dec!(0.5), dec!(1.5), dec!(10))];
        Ok(NormalizedMarketData::new(instrument, timeframe, "counting", candles, Utc::now()).unwrap())
    }
}

/// 항상 실패하는 저장소.
struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn load(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Err(DataError::Store("connection refused".to_string()))
    }

    async fn save(&self, _entry: &CacheEntry) -> Result<()> {
        Err(DataError::Store("connection refused".to_string()))
    }
}

const TTL: Duration = Duration::from_secs(300);

fn cache_with(adapter: Arc<CountingAdapter>) -> MarketDataCache {
    MarketDataCache::new(adapter, Arc::new(InMemoryCacheStore::new()))
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_same_key_single_fetch() {
    let adapter = Arc::new(CountingAdapter::with_delay(Duration::from_millis(100)));
    let cache = cache_with(adapter.clone());

    let (a, b) = tokio::join!(
        cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL),
        cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL),
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(adapter.calls("BTC/USDT", Timeframe::H1), 1);

    let stats = cache.stats();
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.coalesced, 1);
}

#[tokio::test(start_paused = true)]
async fn test_many_concurrent_callers_share_one_fetch() {
    let adapter = Arc::new(CountingAdapter::with_delay(Duration::from_millis(50)));
    let cache = Arc::new(cache_with(adapter.clone()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_fetch("ETH/USDT", Timeframe::M15, TTL).await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(adapter.total_calls(), 1);
}

#[tokio::test]
async fn test_different_keys_do_not_block_each_other() {
    let gate = Arc::new(Notify::new());
    let adapter = Arc::new(CountingAdapter {
        h1_gate: Some(gate.clone()),
        ..Default::default()
    });
    let cache = Arc::new(cache_with(adapter.clone()));

    // H1 페치는 알림 전까지 멈춰 있음
    let h1 = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL).await })
    };
    tokio::task::yield_now().await;

    // D1은 H1을 기다리지 않고 완료되어야 함
    let d1 = tokio::time::timeout(
        Duration::from_secs(5),
        cache.get_or_fetch("BTC/USDT", Timeframe::D1, TTL),
    )
    .await
    .expect("D1 fetch blocked by H1 flight");
    assert!(d1.is_ok());

    gate.notify_one();
    assert!(h1.await.unwrap().is_ok());

    assert_eq!(adapter.calls("BTC/USDT", Timeframe::H1), 1);
    assert_eq!(adapter.calls("BTC/USDT", Timeframe::D1), 1);
}

#[tokio::test]
async fn test_freshness_boundary() {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let adapter = Arc::new(CountingAdapter::default());
    let cache = cache_with(adapter.clone()).with_clock(clock.clone());

    cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL).await.unwrap();
    assert_eq!(adapter.total_calls(), 1);

    clock.set(start + ChronoDuration::seconds(299));
    cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL).await.unwrap();
    assert_eq!(adapter.total_calls(), 1);

    clock.set(start + ChronoDuration::seconds(301));
    cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL).await.unwrap();
    assert_eq!(adapter.total_calls(), 2);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}

#[tokio::test]
async fn test_shorter_requested_ttl_forces_refetch() {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let adapter = Arc::new(CountingAdapter::default());
    let cache = cache_with(adapter.clone()).with_clock(clock.clone());

    cache.get_or_fetch("AAPL", Timeframe::D1, TTL).await.unwrap();
    clock.advance(ChronoDuration::seconds(90));
    cache
        .get_or_fetch("AAPL", Timeframe::D1, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(adapter.total_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_shared_and_not_cached() {
    let adapter = Arc::new(CountingAdapter::with_delay(Duration::from_millis(100)));
    adapter.fail.store(true, Ordering::SeqCst);
    let cache = cache_with(adapter.clone());

    let (a, b) = tokio::join!(
        cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL),
        cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL),
    );

    let err = a.unwrap_err();
    assert!(matches!(err, DataError::Unavailable { .. }));
    assert_eq!(b.unwrap_err(), err);
    assert_eq!(adapter.total_calls(), 1);

    // 실패는 저장되지 않으므로 다음 호출은 다시 페치
    adapter.fail.store(false, Ordering::SeqCst);
    assert!(cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL).await.is_ok());
    assert_eq!(adapter.total_calls(), 2);
    assert_eq!(cache.stats().failures, 1);
}

#[tokio::test]
async fn test_stale_entry_is_not_served_on_failure() {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let adapter = Arc::new(CountingAdapter::default());
    let cache = cache_with(adapter.clone()).with_clock(clock.clone());

    cache.get_or_fetch("SPY", Timeframe::D1, TTL).await.unwrap();

    clock.advance(ChronoDuration::seconds(600));
    adapter.fail.store(true, Ordering::SeqCst);

    let err = cache.get_or_fetch("SPY", Timeframe::D1, TTL).await.unwrap_err();
    assert!(matches!(err, DataError::Unavailable { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_adapter_timeout_is_unavailable() {
    let adapter = Arc::new(CountingAdapter::with_delay(Duration::from_secs(120)));
    let cache = cache_with(adapter).with_fetch_timeout(Duration::from_secs(5));

    let err = cache
        .get_or_fetch("BTC/USDT", Timeframe::H1, TTL)
        .await
        .unwrap_err();

    match err {
        DataError::Unavailable { reason, .. } => assert!(reason.contains("timeout")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_store_failures_degrade_to_fetch() {
    let adapter = Arc::new(CountingAdapter::default());
    let cache = MarketDataCache::new(adapter.clone(), Arc::new(BrokenStore));

    let data = cache.get_or_fetch("AAPL", Timeframe::D1, TTL).await.unwrap();
    assert_eq!(data.instrument(), "AAPL");

    cache.get_or_fetch("AAPL", Timeframe::D1, TTL).await.unwrap();
    assert_eq!(adapter.total_calls(), 2);
}

#[tokio::test]
async fn test_refresh_overwrites_entry() {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(InMemoryCacheStore::new());
    let cache = MarketDataCache::new(Arc::new(CountingAdapter::default()), store.clone())
        .with_clock(clock.clone());

    cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL).await.unwrap();
    clock.advance(ChronoDuration::seconds(400));
    cache.get_or_fetch("BTC/USDT", Timeframe::H1, TTL).await.unwrap();

    assert_eq!(store.len().await, 1);
    let key = signal_data::cache_key("BTC/USDT", Timeframe::H1);
    let entry = store.load(&key).await.unwrap().unwrap();
    assert_eq!(entry.fetched_at, start + ChronoDuration::seconds(400));
}
