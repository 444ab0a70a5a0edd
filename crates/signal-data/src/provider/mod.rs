//! 시장 데이터 어댑터.
//!
//! 모든 어댑터는 소스와 무관하게 [`NormalizedMarketData`]를 반환합니다.
//! 업스트림 문제(심볼 없음, 네트워크 실패, 빈 결과)는 모두 [`DataError::Provider`]로 보고합니다.

pub mod binance;
pub mod yahoo;

use async_trait::async_trait;
use signal_core::{InstrumentKind, NormalizedMarketData, Timeframe};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

pub use binance::BinanceAdapter;
pub use yahoo::YahooAdapter;

/// 캔들 데이터 제공자.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    /// 소스 식별자 (예: "binance").
    fn name(&self) -> &str;

    /// 최근 `limit`개 캔들을 시간순으로 가져옵니다.
    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<NormalizedMarketData>;
}

/// 종목 형태에 따라 암호화폐/주식 어댑터로 분기합니다.
#[derive(Clone)]
pub struct AdapterRouter {
    crypto: Arc<dyn DataAdapter>,
    equity: Arc<dyn DataAdapter>,
}

impl AdapterRouter {
    pub fn new(crypto: Arc<dyn DataAdapter>, equity: Arc<dyn DataAdapter>) -> Self {
        Self { crypto, equity }
    }

    /// 종목에 해당하는 어댑터를 선택합니다.
    pub fn route(&self, instrument: &str) -> &Arc<dyn DataAdapter> {
        match InstrumentKind::classify(instrument) {
            InstrumentKind::Crypto => &self.crypto,
            InstrumentKind::Equity => &self.equity,
        }
    }
}

#[async_trait]
impl DataAdapter for AdapterRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<NormalizedMarketData> {
        let adapter = self.route(instrument);
        debug!(instrument, adapter = adapter.name(), "어댑터 선택");
        adapter.fetch_candles(instrument, timeframe, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Named(&'static str);

    #[async_trait]
    impl DataAdapter for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn fetch_candles(
            &self,
            instrument: &str,
            timeframe: Timeframe,
            _limit: usize,
        ) -> Result<NormalizedMarketData> {
            Ok(NormalizedMarketData::new(instrument, timeframe, self.0, vec![], Utc::now())?)
        }
    }

    fn router() -> AdapterRouter {
        AdapterRouter::new(Arc::new(Named("binance")), Arc::new(Named("yfinance")))
    }

    #[test]
    fn test_route_by_shape() {
        let router = router();
        assert_eq!(router.route("BTC/USDT").name(), "binance");
        assert_eq!(router.route("ETHUSDT").name(), "binance");
        assert_eq!(router.route("AAPL").name(), "yfinance");
    }

    #[tokio::test]
    async fn test_router_delegates() {
        let data = router().fetch_candles("SPY", Timeframe::D1, 10).await.unwrap();
        assert_eq!(data.source(), "yfinance");
    }
}
