//! 단계 실패 분류.
//!
//! 모델/프로바이더 계열 실패는 실행을 중단시키고, 나머지는 해당 단계만 실패로 기록합니다.
//! 에러 메시지 문자열 기반 휴리스틱입니다.

use serde::{Deserialize, Serialize};

/// 실패 분류 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// 모델/프로바이더 실패 (실행 중단)
    Model,
    /// 일시적 실패 (단계만 실패 처리)
    Transient,
}

impl FailureClass {
    pub fn is_model(&self) -> bool {
        matches!(self, FailureClass::Model)
    }
}

/// 에러 메시지와 종류 이름으로 실패를 분류합니다.
///
/// 모델 실패 조건 (하나라도 만족):
/// - 메시지에 `429` 또는 `404` 포함
/// - 메시지에 "model"과 함께 "not found" 또는 "invalid" 포함
/// - 메시지에 "rate"와 "limit" 모두 포함
/// - 종류 이름에 "ratelimit" 포함
///
/// 문자 비교는 숫자 코드를 제외하고 대소문자를 구분하지 않습니다.
pub fn classify_failure(message: &str, kind_name: &str) -> FailureClass {
    if message.contains("429") || message.contains("404") {
        return FailureClass::Model;
    }

    let lower = message.to_lowercase();
    if lower.contains("model") && (lower.contains("not found") || lower.contains("invalid")) {
        return FailureClass::Model;
    }
    if lower.contains("rate") && lower.contains("limit") {
        return FailureClass::Model;
    }
    if kind_name.to_lowercase().contains("ratelimit") {
        return FailureClass::Model;
    }

    FailureClass::Transient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(classify_failure("HTTP 429: slow down", "HttpError"), FailureClass::Model);
        assert_eq!(classify_failure("HTTP 404: no route", "HttpError"), FailureClass::Model);
        assert_eq!(classify_failure("HTTP 500: boom", "HttpError"), FailureClass::Transient);
    }

    #[test]
    fn test_model_keywords() {
        assert!(classify_failure("Model foo/bar Not Found", "HttpError").is_model());
        assert!(classify_failure("invalid MODEL id", "InvalidResponseError").is_model());
        // "model" 없이 "invalid"만 있으면 일시적
        assert!(!classify_failure("invalid json payload", "InvalidResponseError").is_model());
    }

    #[test]
    fn test_rate_limit_keywords() {
        assert!(classify_failure("Rate LIMIT reached", "HttpError").is_model());
        assert!(classify_failure("quota exhausted", "RateLimitError").is_model());
        assert!(!classify_failure("connection reset by peer", "NetworkError").is_model());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert_eq!(
            classify_failure("step timed out after 180s", "TimeoutError"),
            FailureClass::Transient
        );
    }
}
