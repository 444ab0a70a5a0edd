//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
///
/// 단일 비행(single-flight) 결과를 모든 대기자에게 전달해야 하므로 `Clone`입니다.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    /// 업스트림 데이터 소스 오류 (심볼 없음, 네트워크, 빈 결과)
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// 사용 가능한 데이터 없음 (어댑터 실패 + 신선한 캐시 없음)
    #[error("Market data unavailable for {instrument} {timeframe}: {reason}")]
    Unavailable {
        instrument: String,
        timeframe: String,
        reason: String,
    },

    /// 어댑터 호출 타임아웃
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 캐시 저장소 오류
    #[error("Cache store error: {0}")]
    Store(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl DataError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        DataError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DataError::Store(db_err.message().to_string()),
            _ => DataError::Store(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<signal_core::CoreError> for DataError {
    fn from(err: signal_core::CoreError) -> Self {
        DataError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
