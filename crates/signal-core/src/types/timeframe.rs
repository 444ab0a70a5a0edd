//! 캔들스틱 데이터를 위한 타임프레임 정의.
//!
//! 분석 요청은 `H1`, `D1` 같은 코드로 타임프레임을 지정하며,
//! 각 데이터 소스는 자체 간격 문자열(`1h`, `1d`)로 변환해 사용합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들스틱 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 4시간봉
    H4,
    /// 일봉
    D1,
}

impl Timeframe {
    /// 지원하는 모든 타임프레임.
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::H4 => Duration::from_secs(4 * 60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// 이 타임프레임의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 분석 요청/캐시 키에 쓰이는 코드 (예: "H1").
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    /// 거래소(바이낸스) 간격 문자열로 변환합니다.
    pub fn to_exchange_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Yahoo Finance 간격 문자열로 변환합니다.
    ///
    /// Yahoo는 4시간봉을 제공하지 않으므로 `H4`는 `None`입니다.
    pub fn to_yahoo_interval(&self) -> Option<&'static str> {
        match self {
            Timeframe::M1 => Some("1m"),
            Timeframe::M5 => Some("5m"),
            Timeframe::M15 => Some("15m"),
            Timeframe::M30 => Some("30m"),
            Timeframe::H1 => Some("1h"),
            Timeframe::H4 => None,
            Timeframe::D1 => Some("1d"),
        }
    }

    /// 일중(intraday) 타임프레임인지 확인합니다.
    pub fn is_intraday(&self) -> bool {
        !matches!(self, Timeframe::D1)
    }

    /// 거래소 간격 문자열에서 파싱합니다.
    pub fn from_exchange_interval(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.to_exchange_interval() == s)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    /// `H1` 형식(대소문자 무시)과 `1h` 형식을 모두 허용합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|tf| tf.code() == upper)
            .or_else(|| Self::from_exchange_interval(s.trim()))
            .ok_or_else(|| format!("Invalid timeframe: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::M1.as_secs(), 60);
        assert_eq!(Timeframe::H1.as_secs(), 3600);
        assert_eq!(Timeframe::D1.as_secs(), 86400);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("H1".parse::<Timeframe>(), Ok(Timeframe::H1));
        assert_eq!("d1".parse::<Timeframe>(), Ok(Timeframe::D1));
        assert_eq!("15m".parse::<Timeframe>(), Ok(Timeframe::M15));
        assert!("H2".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_intervals() {
        assert_eq!(Timeframe::H4.to_exchange_interval(), "4h");
        assert_eq!(Timeframe::H4.to_yahoo_interval(), None);
        assert_eq!(Timeframe::D1.to_yahoo_interval(), Some("1d"));
        assert!(Timeframe::H1.is_intraday());
        assert!(!Timeframe::D1.is_intraday());
    }

    #[test]
    fn test_timeframe_serde_uses_code() {
        let json = serde_json::to_string(&Timeframe::H1).unwrap();
        assert_eq!(json, "\"H1\"");
    }
}
