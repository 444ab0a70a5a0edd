//! 파이프라인 에러 타입.
//!
//! | 분류 | 전파 |
//! |------|------|
//! | `PipelineError::Precondition` | 부수 효과 없이 호출자에게 반환 |
//! | `PipelineError::DataFetch` | 실행을 FAILED로 기록 후 반환 |
//! | `PipelineError::Bookkeeping` | 실행을 FAILED로 기록 후 반환 |
//! | `StepError` | `run()` 밖으로 나가지 않음 (상태 변화로만 드러남) |

use signal_core::CoreError;
use signal_data::DataError;
use signal_llm::ModelError;
use thiserror::Error;
use uuid::Uuid;

/// `run()`이 호출자에게 반환하는 에러.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 설정 없음, 알 수 없는 실행, 잘못된 초기 상태
    #[error("전제 조건 실패: {0}")]
    Precondition(String),

    /// 시장 데이터 조회 실패 (단계 실행 전)
    #[error("시장 데이터 조회 실패: {0}")]
    DataFetch(#[from] DataError),

    /// 저장/상태 전이 등 단계 외부의 실패
    #[error("파이프라인 내부 오류: {0}")]
    Bookkeeping(String),
}

impl From<RepositoryError> for PipelineError {
    fn from(err: RepositoryError) -> Self {
        PipelineError::Bookkeeping(err.to_string())
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        PipelineError::Bookkeeping(err.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// 단일 단계 실패.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    /// 모델 호출 실패
    #[error(transparent)]
    Model(#[from] ModelError),

    /// 단계 타임아웃
    #[error("step timed out after {0}s")]
    Timeout(u64),
}

impl StepError {
    /// 에러 종류 이름 (분류기 입력).
    pub fn kind_name(&self) -> &'static str {
        match self {
            StepError::Model(e) => e.kind_name(),
            StepError::Timeout(_) => "TimeoutError",
        }
    }
}

/// 실행/단계 저장소 에러.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    NotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 저장된 값이 도메인 타입으로 변환되지 않음
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => RepositoryError::Database(db_err.message().to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
