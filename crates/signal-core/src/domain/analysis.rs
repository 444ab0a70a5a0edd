//! 분석 실행(run)과 단계(step) 기록.
//!
//! # 실행 상태 전이
//!
//! ```text
//! QUEUED ──> RUNNING ──┬──> SUCCEEDED
//!                      ├──> MODEL_FAILURE
//!                      └──> FAILED
//! ```
//!
//! 종료 상태(SUCCEEDED, MODEL_FAILURE, FAILED)는 최종이며 RUNNING으로 돌아가지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::Timeframe;

/// 모델 실패 진단 기록에 사용하는 합성 단계 이름.
pub const MODEL_FAILURES_STEP: &str = "model_failures";

/// 분석 실행 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// 대기 중 (유일한 초기 상태)
    Queued,
    /// 실행 중
    Running,
    /// 모든 단계 시도 완료
    Succeeded,
    /// 모델/프로바이더 실패로 중단
    ModelFailure,
    /// 파이프라인 자체 오류
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "QUEUED",
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::ModelFailure => "MODEL_FAILURE",
            RunStatus::Failed => "FAILED",
        }
    }

    /// 종료 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::ModelFailure | RunStatus::Failed
        )
    }

    /// `next`로의 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (RunStatus::Queued, RunStatus::Running) => true,
            // 실행 시작 기록 자체가 실패한 경우
            (RunStatus::Queued, RunStatus::Failed) => true,
            (RunStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(RunStatus::Queued),
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCEEDED" => Ok(RunStatus::Succeeded),
            "MODEL_FAILURE" => Ok(RunStatus::ModelFailure),
            "FAILED" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// 실행 트리거 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// 사용자 요청
    Manual,
    /// 스케줄러
    Scheduled,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Manual => "manual",
            TriggerKind::Scheduled => "scheduled",
        }
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(TriggerKind::Manual),
            "scheduled" => Ok(TriggerKind::Scheduled),
            _ => Err(format!("Unknown trigger kind: {}", s)),
        }
    }
}

/// 파이프라인 1회 실행.
///
/// 호출자가 QUEUED 상태로 생성하고, 이후 상태 변경은 오케스트레이터만 수행합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: Uuid,
    pub trigger: TriggerKind,
    /// 분석 유형 이름 (예: "daystart"), 임시 설정이면 None
    pub analysis_type: Option<String>,
    pub instrument: String,
    pub timeframe: Timeframe,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 누적 예상 비용
    pub cost_est_total: f64,
}

impl AnalysisRun {
    /// QUEUED 상태의 새 실행을 생성합니다.
    pub fn new(
        trigger: TriggerKind,
        instrument: impl Into<String>,
        timeframe: Timeframe,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            analysis_type: None,
            instrument: instrument.into(),
            timeframe,
            status: RunStatus::Queued,
            created_at,
            finished_at: None,
            cost_est_total: 0.0,
        }
    }

    /// 분석 유형 이름을 설정합니다.
    pub fn with_analysis_type(mut self, name: impl Into<String>) -> Self {
        self.analysis_type = Some(name.into());
        self
    }

    /// 상태를 전이합니다. 종료 상태로 전이하면 종료 시각을 기록합니다.
    pub fn transition_to(&mut self, next: RunStatus, at: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(at);
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// 실행 중 관측된 모델 실패 1건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailureRecord {
    pub step_name: String,
    pub model: Option<String>,
    /// 에러 종류 이름 (예: "RateLimitError")
    pub kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// 단계 출력 페이로드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutput {
    /// 모델이 생성한 분석 텍스트
    Text { content: String },
    /// 단계 실패
    Error { kind: String, message: String },
    /// 실행 내 모델 실패 집계 (진단용)
    ModelFailures { failures: Vec<ModelFailureRecord> },
}

impl StepOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StepOutput::Text { content } => Some(content),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, StepOutput::Text { .. })
    }
}

/// 실행 내 단계 1회의 추가 전용 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStep {
    pub id: Uuid,
    pub run_id: Uuid,
    pub step_name: String,
    /// 입력 스냅샷
    pub input_blob: serde_json::Value,
    pub output: StepOutput,
    pub llm_model: Option<String>,
    pub tokens_used: u32,
    pub cost_est: f64,
    pub created_at: DateTime<Utc>,
    pub is_model_error: bool,
}

impl AnalysisStep {
    /// 성공한 단계 기록.
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        run_id: Uuid,
        step_name: impl Into<String>,
        input_blob: serde_json::Value,
        content: impl Into<String>,
        model: impl Into<String>,
        tokens_used: u32,
        cost_est: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            step_name: step_name.into(),
            input_blob,
            output: StepOutput::Text {
                content: content.into(),
            },
            llm_model: Some(model.into()),
            tokens_used,
            cost_est,
            created_at,
            is_model_error: false,
        }
    }

    /// 실패한 단계 기록.
    #[allow(clippy::too_many_arguments)]
    pub fn failure(
        run_id: Uuid,
        step_name: impl Into<String>,
        input_blob: serde_json::Value,
        kind: impl Into<String>,
        message: impl Into<String>,
        model: Option<String>,
        is_model_error: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            step_name: step_name.into(),
            input_blob,
            output: StepOutput::Error {
                kind: kind.into(),
                message: message.into(),
            },
            llm_model: model,
            tokens_used: 0,
            cost_est: 0.0,
            created_at,
            is_model_error,
        }
    }

    /// 모델 실패 집계 진단 기록.
    pub fn model_failures(
        run_id: Uuid,
        failures: Vec<ModelFailureRecord>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let models: Vec<Option<String>> = failures.iter().map(|f| f.model.clone()).collect();
        Self {
            id: Uuid::new_v4(),
            run_id,
            step_name: MODEL_FAILURES_STEP.to_string(),
            input_blob: serde_json::json!({ "models": models }),
            output: StepOutput::ModelFailures { failures },
            llm_model: None,
            tokens_used: 0,
            cost_est: 0.0,
            created_at,
            is_model_error: true,
        }
    }

    /// 파이프라인 단계가 아닌 진단 기록인지 확인합니다.
    pub fn is_diagnostic(&self) -> bool {
        self.step_name == MODEL_FAILURES_STEP
    }
}
