//! 모델 호출 에러.

use thiserror::Error;

/// 모델 호출 실패.
///
/// 메시지에는 HTTP 상태 코드가 포함되어 호출자가 실패 유형을 판별할 수 있습니다.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// 요청 한도 초과 (HTTP 429)
    #[error("Rate limit exceeded (HTTP 429): {0}")]
    RateLimited(String),

    /// API 키 오류 (HTTP 401)
    #[error("API key is invalid or expired (HTTP 401): {0}")]
    Unauthorized(String),

    /// 기타 HTTP 오류
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// 응답 형식 오류
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// 에러 종류 이름.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ModelError::RateLimited(_) => "RateLimitError",
            ModelError::Unauthorized(_) => "AuthenticationError",
            ModelError::Http { .. } => "HttpError",
            ModelError::Network(_) => "NetworkError",
            ModelError::Timeout(_) => "TimeoutError",
            ModelError::InvalidResponse(_) => "InvalidResponseError",
            ModelError::Config(_) => "ConfigError",
        }
    }

    /// HTTP 상태 코드 (알 수 있는 경우).
    pub fn status(&self) -> Option<u16> {
        match self {
            ModelError::RateLimited(_) => Some(429),
            ModelError::Unauthorized(_) => Some(401),
            ModelError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(err.to_string())
        } else {
            ModelError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
