//! 정규화된 시장 데이터.
//!
//! 모든 데이터 어댑터는 소스와 무관하게 `NormalizedMarketData`를 생성합니다.
//! 생성 이후에는 변경할 수 없으며, 캔들 타임스탬프는 항상 엄격히 증가합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Timeframe;

/// OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 양봉(종가 > 시가)인지 확인합니다.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// 음봉(종가 < 시가)인지 확인합니다.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// 역직렬화 시 불변식 검증을 거치기 위한 원시 형태.
#[derive(Deserialize)]
struct MarketDataPayload {
    instrument: String,
    timeframe: Timeframe,
    source: String,
    candles: Vec<Candle>,
    fetched_at: DateTime<Utc>,
}

impl TryFrom<MarketDataPayload> for NormalizedMarketData {
    type Error = CoreError;

    fn try_from(raw: MarketDataPayload) -> Result<Self, Self::Error> {
        NormalizedMarketData::new(
            raw.instrument,
            raw.timeframe,
            raw.source,
            raw.candles,
            raw.fetched_at,
        )
    }
}

/// 한 종목/타임프레임에 대한 OHLCV 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MarketDataPayload")]
pub struct NormalizedMarketData {
    instrument: String,
    timeframe: Timeframe,
    source: String,
    candles: Vec<Candle>,
    fetched_at: DateTime<Utc>,
}

impl NormalizedMarketData {
    /// 스냅샷을 생성합니다.
    ///
    /// 캔들 타임스탬프가 엄격히 증가하지 않으면 `CoreError::Validation`을 반환합니다.
    pub fn new(
        instrument: impl Into<String>,
        timeframe: Timeframe,
        source: impl Into<String>,
        candles: Vec<Candle>,
        fetched_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if let Some(pos) = candles
            .windows(2)
            .position(|w| w[0].timestamp >= w[1].timestamp)
        {
            return Err(CoreError::Validation(format!(
                "candle timestamps must be strictly increasing (index {}: {} >= {})",
                pos + 1,
                candles[pos].timestamp,
                candles[pos + 1].timestamp
            )));
        }

        Ok(Self {
            instrument: instrument.into(),
            timeframe,
            source: source.into(),
            candles,
            fetched_at,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// 데이터 소스 식별자 (예: "binance", "yfinance").
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// 마지막 `n`개 캔들 (시간순).
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// 최근 종가.
    pub fn last_close(&self) -> Option<Decimal> {
        self.candles.last().map(|c| c.close)
    }

    /// 전체 구간의 (최저가, 최고가).
    pub fn price_range(&self) -> Option<(Decimal, Decimal)> {
        let first = self.candles.first()?;
        Some(self.candles.iter().fold((first.low, first.high), |(lo, hi), c| {
            (lo.min(c.low), hi.max(c.high))
        }))
    }

    /// 전체 거래량 합계.
    pub fn total_volume(&self) -> Decimal {
        self.candles.iter().map(|c| c.volume).sum()
    }

    /// 평균 거래량.
    pub fn average_volume(&self) -> Option<Decimal> {
        if self.candles.is_empty() {
            return None;
        }
        Some(self.total_volume() / Decimal::from(self.candles.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn candle(hour: i64, close: Decimal) -> Candle {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour);
        Candle::new(ts, close - dec!(1), close + dec!(2), close - dec!(3), close, dec!(10))
    }

    #[test]
    fn test_rejects_non_increasing_timestamps() {
        let candles = vec![candle(1, dec!(100)), candle(1, dec!(101))];
        let result = NormalizedMarketData::new("BTC/USDT", Timeframe::H1, "binance", candles, Utc::now());
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_summary_helpers() {
        let candles = vec![candle(0, dec!(100)), candle(1, dec!(110)), candle(2, dec!(105))];
        let data =
            NormalizedMarketData::new("BTC/USDT", Timeframe::H1, "binance", candles, Utc::now())
                .unwrap();

        assert_eq!(data.last_close(), Some(dec!(105)));
        assert_eq!(data.price_range(), Some((dec!(97), dec!(112))));
        assert_eq!(data.total_volume(), dec!(30));
        assert_eq!(data.average_volume(), Some(dec!(10)));
        assert_eq!(data.tail(2).len(), 2);
        assert_eq!(data.tail(10).len(), 3);
    }

    #[test]
    fn test_deserialize_validates_order() {
        let candles = vec![candle(2, dec!(100)), candle(1, dec!(101))];
        let json = serde_json::json!({
            "instrument": "AAPL",
            "timeframe": "D1",
            "source": "yfinance",
            "candles": candles,
            "fetched_at": Utc::now(),
        });
        assert!(serde_json::from_value::<NormalizedMarketData>(json).is_err());
    }
}
