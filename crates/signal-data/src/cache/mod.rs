//! 시장 데이터 캐시.

mod entry;
mod market;
mod store;

pub use entry::{cache_key, CacheEntry};
pub use market::{CacheStats, MarketDataCache};
pub use store::{CacheStore, InMemoryCacheStore};
