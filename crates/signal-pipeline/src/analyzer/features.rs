//! 프롬프트용 시장 특성 요약.
//!
//! 같은 캔들에 대해 항상 같은 요약을 만듭니다 (입력 스냅샷 재현성).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use signal_core::Candle;
use std::fmt::Write;

/// 최근 캔들 구간의 요약 통계.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub candle_count: usize,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub open: Option<Decimal>,
    pub close: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    /// 구간 등락률 (%)
    pub change_pct: Option<Decimal>,
    pub total_volume: Decimal,
    pub average_volume: Option<Decimal>,
    pub bullish_count: usize,
    pub bearish_count: usize,
    /// 양봉 거래량 - 음봉 거래량 (캔들 기반 델타 근사)
    pub volume_delta: Decimal,
    pub candles: Vec<Candle>,
}

impl MarketSummary {
    /// 캔들 구간에서 요약을 계산합니다.
    pub fn from_candles(candles: &[Candle]) -> Self {
        let first = candles.first();
        let last = candles.last();

        let high = candles.iter().map(|c| c.high).max();
        let low = candles.iter().map(|c| c.low).min();
        let total_volume: Decimal = candles.iter().map(|c| c.volume).sum();
        let average_volume = if candles.is_empty() {
            None
        } else {
            Some((total_volume / Decimal::from(candles.len())).round_dp(4))
        };

        let change_pct = match (first, last) {
            (Some(f), Some(l)) if !f.open.is_zero() => {
                Some(((l.close - f.open) / f.open * Decimal::ONE_HUNDRED).round_dp(2))
            }
            _ => None,
        };

        let mut bullish_count = 0;
        let mut bearish_count = 0;
        let mut volume_delta = Decimal::ZERO;
        for candle in candles {
            if candle.is_bullish() {
                bullish_count += 1;
                volume_delta += candle.volume;
            } else if candle.is_bearish() {
                bearish_count += 1;
                volume_delta -= candle.volume;
            }
        }

        Self {
            candle_count: candles.len(),
            from: first.map(|c| c.timestamp),
            to: last.map(|c| c.timestamp),
            open: first.map(|c| c.open),
            close: last.map(|c| c.close),
            high,
            low,
            change_pct,
            total_volume,
            average_volume,
            bullish_count,
            bearish_count,
            volume_delta,
            candles: candles.to_vec(),
        }
    }

    /// 프롬프트에 삽입할 텍스트.
    pub fn to_prompt_text(&self) -> String {
        let (Some(from), Some(to)) = (self.from, self.to) else {
            return "No candles available.".to_string();
        };

        let mut text = String::new();
        let _ = writeln!(
            text,
            "Candles: {} ({} -> {})",
            self.candle_count,
            from.format("%Y-%m-%d %H:%M UTC"),
            to.format("%Y-%m-%d %H:%M UTC")
        );
        if let (Some(low), Some(high)) = (self.low, self.high) {
            let _ = write!(text, "Range: low {} / high {}", low, high);
            if let Some(change) = self.change_pct {
                let _ = write!(text, ", change {:+}%", change);
            }
            text.push('\n');
        }
        let _ = writeln!(
            text,
            "Volume: total {}, average {}, delta {:+} (bullish {} / bearish {})",
            self.total_volume,
            self.average_volume.unwrap_or_default(),
            self.volume_delta,
            self.bullish_count,
            self.bearish_count
        );
        text.push_str("Time | Open | High | Low | Close | Volume\n");
        for c in &self.candles {
            let _ = writeln!(
                text,
                "{} | {} | {} | {} | {} | {}",
                c.timestamp.format("%Y-%m-%d %H:%M"),
                c.open,
                c.high,
                c.low,
                c.close,
                c.volume
            );
        }
        text.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(hour: u32, open: Decimal, close: Decimal, volume: Decimal) -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            open,
            open.max(close) + dec!(1),
            open.min(close) - dec!(1),
            close,
            volume,
        )
    }

    #[test]
    fn test_summary_statistics() {
        let candles = vec![
            candle(0, dec!(100), dec!(105), dec!(10)),
            candle(1, dec!(105), dec!(103), dec!(4)),
            candle(2, dec!(103), dec!(110), dec!(6)),
        ];
        let summary = MarketSummary::from_candles(&candles);

        assert_eq!(summary.candle_count, 3);
        assert_eq!(summary.high, Some(dec!(111)));
        assert_eq!(summary.low, Some(dec!(99)));
        assert_eq!(summary.change_pct, Some(dec!(10.00)));
        assert_eq!(summary.total_volume, dec!(20));
        assert_eq!(summary.bullish_count, 2);
        assert_eq!(summary.bearish_count, 1);
        assert_eq!(summary.volume_delta, dec!(12));
    }

    #[test]
    fn test_summary_is_deterministic() {
        let candles = vec![candle(0, dec!(1), dec!(2), dec!(3))];
        assert_eq!(
            MarketSummary::from_candles(&candles).to_prompt_text(),
            MarketSummary::from_candles(&candles).to_prompt_text()
        );
    }

    #[test]
    fn test_empty_window() {
        let summary = MarketSummary::from_candles(&[]);
        assert_eq!(summary.candle_count, 0);
        assert_eq!(summary.average_volume, None);
        assert_eq!(summary.to_prompt_text(), "No candles available.");
    }
}
