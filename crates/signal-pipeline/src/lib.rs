//! LLM 기반 다단계 시장 분석 파이프라인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 단계 분석기 (Wyckoff, SMC, VSA, Delta, ICT, Price Action, Merge)
//! - 실행 컨텍스트와 실패 분류
//! - 모델 상태 레지스트리
//! - 실행/단계 저장소 (메모리, PostgreSQL)
//! - 분석 유형 기반 설정 해석
//! - 파이프라인 오케스트레이터

pub mod analyzer;
pub mod classify;
pub mod context;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod repository;
pub mod resolver;
pub mod telemetry;

pub use analyzer::{MarketSummary, PreparedStep, StepKind, DEFAULT_MODEL};
pub use classify::{classify_failure, FailureClass};
pub use context::{PipelineContext, StepResult};
pub use error::{PipelineError, PipelineResult, RepositoryError, StepError};
pub use health::{ModelHealth, ModelHealthRegistry};
pub use orchestrator::{PipelineOrchestrator, DEFAULT_STEP_TIMEOUT};
pub use repository::{InMemoryRunRepository, PgRunRepository, RepositoryResult, RunRepository};
pub use resolver::{
    daystart_analysis_type, AnalysisTypeSource, BuiltinAnalysisTypes, FileAnalysisTypes,
    PgAnalysisTypes, PipelineConfigResolver, ResolvedConfig,
};
pub use telemetry::RunTelemetry;
