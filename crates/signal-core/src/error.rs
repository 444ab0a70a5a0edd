//! 도메인 에러 타입.
//!
//! 엔티티 생성/상태 전이/설정 검증에서 발생하는 에러를 정의합니다.

use thiserror::Error;

use crate::domain::RunStatus;

/// 핵심 도메인 에러.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 검증 실패 (잘못된 엔티티 값)
    #[error("검증 실패: {0}")]
    Validation(String),

    /// 허용되지 않는 실행 상태 전이
    #[error("잘못된 상태 전이: {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_message() {
        let err = CoreError::InvalidTransition {
            from: RunStatus::Succeeded,
            to: RunStatus::Running,
        };
        assert_eq!(err.to_string(), "잘못된 상태 전이: SUCCEEDED -> RUNNING");
    }
}
