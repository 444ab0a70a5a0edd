//! 종목 유형 분류.
//!
//! 심볼 형태만으로 데이터 소스를 결정합니다:
//! - `/` 구분자 포함 또는 알려진 호가 통화 접미사 → 암호화폐
//! - 그 외 → 주식

use serde::{Deserialize, Serialize};
use std::fmt;

/// 페어 구분자.
pub const PAIR_SEPARATOR: char = '/';

/// 암호화폐로 판단하는 호가 통화 접미사.
pub const KNOWN_QUOTE_SUFFIXES: [&str; 3] = ["USDT", "USDC", "BUSD"];

/// 종목 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    /// 암호화폐 (거래소 어댑터)
    Crypto,
    /// 주식/ETF (Yahoo Finance 어댑터)
    Equity,
}

impl InstrumentKind {
    /// 심볼 형태로 종목 유형을 분류합니다.
    pub fn classify(instrument: &str) -> Self {
        let upper = instrument.to_uppercase();
        if upper.contains(PAIR_SEPARATOR)
            || KNOWN_QUOTE_SUFFIXES
                .iter()
                .any(|suffix| upper.len() > suffix.len() && upper.ends_with(suffix))
        {
            InstrumentKind::Crypto
        } else {
            InstrumentKind::Equity
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentKind::Crypto => write!(f, "crypto"),
            InstrumentKind::Equity => write!(f, "equity"),
        }
    }
}
