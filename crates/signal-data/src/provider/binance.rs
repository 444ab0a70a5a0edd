//! 바이낸스 공개 REST 캔들 어댑터.
//!
//! 인증이 필요 없는 `/api/v3/klines` 엔드포인트만 사용합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use signal_core::{Candle, NormalizedMarketData, Timeframe, KNOWN_QUOTE_SUFFIXES, PAIR_SEPARATOR};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::DataAdapter;
use crate::error::{DataError, Result};

const SOURCE: &str = "binance";

/// 기본 호가 통화.
const DEFAULT_QUOTE: &str = "USDT";

#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

/// 바이낸스 캔들 어댑터.
pub struct BinanceAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::provider(SOURCE, format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// 거래소 심볼 형식으로 변환합니다.
    ///
    /// `"btc"` → `"BTCUSDT"`, `"BTC/USDT"` → `"BTCUSDT"`, `"ETHUSDC"` → `"ETHUSDC"`
    pub fn to_exchange_symbol(instrument: &str) -> String {
        let upper = instrument.trim().to_uppercase();
        if upper.contains(PAIR_SEPARATOR) {
            return upper.replace(PAIR_SEPARATOR, "");
        }
        let has_quote = KNOWN_QUOTE_SUFFIXES
            .iter()
            .any(|q| upper.len() > q.len() && upper.ends_with(q));
        if has_quote {
            upper
        } else {
            format!("{}{}", upper, DEFAULT_QUOTE)
        }
    }

    fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
        Decimal::from_str(value)
            .map_err(|e| DataError::InvalidData(format!("{} 파싱 실패 ({}): {}", field, value, e)))
    }

    fn to_candle(k: &BinanceKline) -> Result<Candle> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(k.0)
            .ok_or_else(|| DataError::InvalidData(format!("잘못된 타임스탬프: {}", k.0)))?;

        Ok(Candle::new(
            timestamp,
            Self::parse_decimal("open", &k.1)?,
            Self::parse_decimal("high", &k.2)?,
            Self::parse_decimal("low", &k.3)?,
            Self::parse_decimal("close", &k.4)?,
            Self::parse_decimal("volume", &k.5)?,
        ))
    }
}

#[async_trait]
impl DataAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<NormalizedMarketData> {
        let symbol = Self::to_exchange_symbol(instrument);
        let url = format!("{}/api/v3/klines", self.base_url);

        debug!(instrument, symbol = %symbol, timeframe = %timeframe, limit, "바이낸스 캔들 요청");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.as_str()),
                ("interval", timeframe.to_exchange_interval()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| DataError::provider(SOURCE, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DataError::provider(SOURCE, e.to_string()))?;

        if !status.is_success() {
            warn!(symbol = %symbol, status = status.as_u16(), "바이낸스 API 오류");
            return Err(DataError::provider(
                SOURCE,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let klines: Vec<BinanceKline> = serde_json::from_str(&body)?;
        if klines.is_empty() {
            return Err(DataError::provider(
                SOURCE,
                format!("{} {} 데이터 없음", symbol, timeframe),
            ));
        }

        let candles = klines.iter().map(Self::to_candle).collect::<Result<Vec<_>>>()?;

        Ok(NormalizedMarketData::new(
            instrument,
            timeframe,
            SOURCE,
            candles,
            Utc::now(),
        )?)
    }
}
