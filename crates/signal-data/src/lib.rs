//! 시장 데이터 수집 및 캐싱.
//!
//! 이 crate는 다음을 제공합니다:
//! - 암호화폐(바이낸스)/주식(Yahoo Finance) 데이터 어댑터
//! - 종목 형태 기반 어댑터 라우팅
//! - 단일 비행(single-flight) TTL 캐시
//! - PostgreSQL 캐시 저장소

pub mod cache;
pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use cache::{cache_key, CacheEntry, CacheStats, CacheStore, InMemoryCacheStore, MarketDataCache};
pub use provider::{AdapterRouter, BinanceAdapter, DataAdapter, YahooAdapter};
pub use storage::PgCacheStore;
