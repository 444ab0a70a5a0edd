//! Yahoo Finance 주식/ETF 캔들 어댑터.
//!
//! 조회 기간은 일중 타임프레임이면 `5d`, 일봉이면 `1mo`를 사용하고
//! 최근 `limit`개만 반환합니다.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use signal_core::{Candle, NormalizedMarketData, Timeframe};
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use super::DataAdapter;
use crate::error::{DataError, Result};

const SOURCE: &str = "yfinance";

/// Yahoo Finance 어댑터.
pub struct YahooAdapter {
    connector: yahoo::YahooConnector,
}

impl YahooAdapter {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| DataError::provider(SOURCE, format!("Yahoo Finance 연결 실패: {}", e)))?;

        Ok(Self { connector })
    }

    /// 타임프레임에 따른 조회 기간.
    pub fn range_for(timeframe: Timeframe) -> &'static str {
        if timeframe.is_intraday() {
            "5d"
        } else {
            "1mo"
        }
    }

    fn quote_to_candle(q: &yahoo::Quote) -> Result<Candle> {
        let timestamp = Utc
            .timestamp_opt(q.timestamp as i64, 0)
            .single()
            .ok_or_else(|| DataError::InvalidData(format!("잘못된 타임스탬프: {}", q.timestamp)))?;

        let price = |v: f64| {
            Decimal::from_f64_retain(v)
                .ok_or_else(|| DataError::InvalidData(format!("가격 변환 실패: {}", v)))
        };

        Ok(Candle::new(
            timestamp,
            price(q.open)?,
            price(q.high)?,
            price(q.low)?,
            price(q.close)?,
            Decimal::from(q.volume),
        ))
    }
}

#[async_trait]
impl DataAdapter for YahooAdapter {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<NormalizedMarketData> {
        let interval = timeframe.to_yahoo_interval().ok_or_else(|| {
            DataError::provider(SOURCE, format!("{} 타임프레임은 지원하지 않습니다", timeframe))
        })?;
        let range = Self::range_for(timeframe);

        debug!(instrument, interval, range, "Yahoo Finance API 호출");

        let response = self
            .connector
            .get_quote_range(instrument, interval, range)
            .await
            .map_err(|e| DataError::provider(SOURCE, format!("Yahoo Finance API 오류 ({}): {}", instrument, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::provider(SOURCE, format!("Quote 파싱 오류: {}", e)))?;

        if quotes.is_empty() {
            warn!(instrument, "Yahoo Finance: 데이터 없음");
            return Err(DataError::provider(SOURCE, format!("{} 데이터 없음", instrument)));
        }

        let mut candles = quotes
            .iter()
            .map(Self::quote_to_candle)
            .collect::<Result<Vec<_>>>()?;

        // 시간순 정렬, 중복 타임스탬프 제거
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);

        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }

        Ok(NormalizedMarketData::new(
            instrument,
            timeframe,
            SOURCE,
            candles,
            Utc::now(),
        )?)
    }
}
