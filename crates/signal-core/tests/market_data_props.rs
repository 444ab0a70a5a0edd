//! NormalizedMarketData 불변식 속성 테스트

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use signal_core::{Candle, InstrumentKind, NormalizedMarketData, Timeframe};

fn candle_at(offset_secs: i64, close: i64) -> Candle {
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_secs);
    let close = Decimal::from(close);
    Candle::new(ts, close, close + Decimal::ONE, close - Decimal::ONE, close, Decimal::TEN)
}

proptest! {
    /// 엄격히 증가하는 타임스탬프는 항상 허용된다.
    #[test]
    fn increasing_timestamps_accepted(gaps in prop::collection::vec(1i64..10_000, 0..50)) {
        let mut offset = 0;
        let candles: Vec<Candle> = gaps
            .iter()
            .map(|gap| {
                offset += gap;
                candle_at(offset, 100)
            })
            .collect();
        let len = candles.len();

        let data = NormalizedMarketData::new("BTC/USDT", Timeframe::M5, "binance", candles, Utc::now());
        prop_assert!(data.is_ok());
        prop_assert_eq!(data.unwrap().len(), len);
    }

    /// 중복되거나 역순인 타임스탬프가 하나라도 있으면 거부된다.
    #[test]
    fn any_non_increasing_pair_rejected(
        offsets in prop::collection::vec(0i64..100, 2..30),
    ) {
        let strictly_increasing = offsets.windows(2).all(|w| w[0] < w[1]);
        let candles: Vec<Candle> = offsets.iter().map(|o| candle_at(*o, 50)).collect();

        let result = NormalizedMarketData::new("AAPL", Timeframe::D1, "yfinance", candles, Utc::now());
        prop_assert_eq!(result.is_ok(), strictly_increasing);
    }

    /// 분류는 대소문자와 무관하다.
    #[test]
    fn classification_ignores_case(base in "[a-zA-Z]{2,6}", slash in any::<bool>()) {
        let symbol = if slash { format!("{}/usdt", base) } else { base.clone() };
        prop_assert_eq!(
            InstrumentKind::classify(&symbol),
            InstrumentKind::classify(&symbol.to_uppercase())
        );
    }
}

#[test]
fn serde_round_trip_preserves_snapshot() {
    let candles = vec![candle_at(0, 10), candle_at(60, 11), candle_at(120, 12)];
    let data =
        NormalizedMarketData::new("ETH/USDT", Timeframe::M1, "binance", candles, Utc::now()).unwrap();

    let json = serde_json::to_string(&data).unwrap();
    let restored: NormalizedMarketData = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, data);
}
