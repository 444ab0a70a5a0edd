//! PostgreSQL 실행/단계 저장소.
//!
//! `analysis_runs`, `analysis_steps` 테이블을 사용합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signal_core::{AnalysisRun, AnalysisStep, RunStatus, StepOutput, Timeframe, TriggerKind};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{RepositoryResult, RunRepository};
use crate::error::RepositoryError;

// =====================================================
// 레코드 타입
// =====================================================

/// `analysis_runs` 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisRunRecord {
    pub id: Uuid,
    pub trigger: String,
    pub analysis_type: Option<String>,
    pub instrument: String,
    pub timeframe: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cost_est_total: f64,
}

impl TryFrom<AnalysisRunRecord> for AnalysisRun {
    type Error = RepositoryError;

    fn try_from(record: AnalysisRunRecord) -> Result<Self, Self::Error> {
        let trigger: TriggerKind = record.trigger.parse().map_err(RepositoryError::InvalidData)?;
        let timeframe: Timeframe = record.timeframe.parse().map_err(RepositoryError::InvalidData)?;
        let status: RunStatus = record.status.parse().map_err(RepositoryError::InvalidData)?;

        Ok(AnalysisRun {
            id: record.id,
            trigger,
            analysis_type: record.analysis_type,
            instrument: record.instrument,
            timeframe,
            status,
            created_at: record.created_at,
            finished_at: record.finished_at,
            cost_est_total: record.cost_est_total,
        })
    }
}

/// `analysis_steps` 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisStepRecord {
    pub id: Uuid,
    pub run_id: Uuid,
    pub step_name: String,
    pub input_blob: serde_json::Value,
    pub output_blob: serde_json::Value,
    pub llm_model: Option<String>,
    pub tokens_used: i32,
    pub cost_est: f64,
    pub created_at: DateTime<Utc>,
    pub is_model_error: bool,
}

impl TryFrom<AnalysisStepRecord> for AnalysisStep {
    type Error = RepositoryError;

    fn try_from(record: AnalysisStepRecord) -> Result<Self, Self::Error> {
        let output: StepOutput = serde_json::from_value(record.output_blob)?;

        Ok(AnalysisStep {
            id: record.id,
            run_id: record.run_id,
            step_name: record.step_name,
            input_blob: record.input_blob,
            output,
            llm_model: record.llm_model,
            tokens_used: record.tokens_used.max(0) as u32,
            cost_est: record.cost_est,
            created_at: record.created_at,
            is_model_error: record.is_model_error,
        })
    }
}

// =====================================================
// 저장소
// =====================================================

/// PostgreSQL 기반 실행 저장소.
#[derive(Clone)]
pub struct PgRunRepository {
    pool: PgPool,
}

impl PgRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRepository for PgRunRepository {
    async fn create_run(&self, run: &AnalysisRun) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_runs
                (id, trigger, analysis_type, instrument, timeframe, status,
                 created_at, finished_at, cost_est_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(run.id)
        .bind(run.trigger.as_str())
        .bind(&run.analysis_type)
        .bind(&run.instrument)
        .bind(run.timeframe.code())
        .bind(run.status.as_str())
        .bind(run.created_at)
        .bind(run.finished_at)
        .bind(run.cost_est_total)
        .execute(&self.pool)
        .await?;

        debug!(run_id = %run.id, "실행 생성");
        Ok(())
    }

    async fn update_run(&self, run: &AnalysisRun) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE analysis_runs
            SET status = $2, finished_at = $3, cost_est_total = $4
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.status.as_str())
        .bind(run.finished_at)
        .bind(run.cost_est_total)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(run.id));
        }
        debug!(run_id = %run.id, status = %run.status, "실행 갱신");
        Ok(())
    }

    async fn claim_run(&self, run: &AnalysisRun) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE analysis_runs
            SET status = $2, finished_at = $3, cost_est_total = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(run.id)
        .bind(run.status.as_str())
        .bind(run.finished_at)
        .bind(run.cost_est_total)
        .bind(RunStatus::Queued.as_str())
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        debug!(run_id = %run.id, claimed, "실행 점유");
        Ok(claimed)
    }

    async fn get_run(&self, id: Uuid) -> RepositoryResult<Option<AnalysisRun>> {
        let record: Option<AnalysisRunRecord> = sqlx::query_as(
            r#"
            SELECT id, trigger, analysis_type, instrument, timeframe, status,
                   created_at, finished_at, cost_est_total
            FROM analysis_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(AnalysisRun::try_from).transpose()
    }

    async fn append_step(&self, step: &AnalysisStep) -> RepositoryResult<()> {
        let output = serde_json::to_value(&step.output)?;

        sqlx::query(
            r#"
            INSERT INTO analysis_steps
                (id, run_id, step_name, input_blob, output_blob, llm_model,
                 tokens_used, cost_est, created_at, is_model_error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(step.id)
        .bind(step.run_id)
        .bind(&step.step_name)
        .bind(&step.input_blob)
        .bind(output)
        .bind(&step.llm_model)
        .bind(step.tokens_used.min(i32::MAX as u32) as i32)
        .bind(step.cost_est)
        .bind(step.created_at)
        .bind(step.is_model_error)
        .execute(&self.pool)
        .await?;

        debug!(run_id = %step.run_id, step = %step.step_name, "단계 기록");
        Ok(())
    }

    async fn list_steps(&self, run_id: Uuid) -> RepositoryResult<Vec<AnalysisStep>> {
        // 같은 created_at 안에서는 삽입 순서(seq)로 정렬
        let records: Vec<AnalysisStepRecord> = sqlx::query_as(
            r#"
            SELECT id, run_id, step_name, input_blob, output_blob, llm_model,
                   tokens_used, cost_est, created_at, is_model_error
            FROM analysis_steps
            WHERE run_id = $1
            ORDER BY seq
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(AnalysisStep::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_conversion() {
        let record = AnalysisRunRecord {
            id: Uuid::new_v4(),
            trigger: "scheduled".into(),
            analysis_type: Some("daystart".into()),
            instrument: "BTC/USDT".into(),
            timeframe: "H1".into(),
            status: "MODEL_FAILURE".into(),
            created_at: Utc::now(),
            finished_at: Some(Utc::now()),
            cost_est_total: 0.04,
        };
        let run = AnalysisRun::try_from(record).unwrap();
        assert_eq!(run.status, RunStatus::ModelFailure);
        assert_eq!(run.trigger, TriggerKind::Scheduled);
    }

    #[test]
    fn test_invalid_status_rejected() {
        let record = AnalysisRunRecord {
            id: Uuid::new_v4(),
            trigger: "manual".into(),
            analysis_type: None,
            instrument: "AAPL".into(),
            timeframe: "D1".into(),
            status: "DONE".into(),
            created_at: Utc::now(),
            finished_at: None,
            cost_est_total: 0.0,
        };
        assert!(matches!(
            AnalysisRun::try_from(record),
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[test]
    fn test_step_output_from_json() {
        let record = AnalysisStepRecord {
            id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            step_name: "smc".into(),
            input_blob: serde_json::json!({"error": "boom"}),
            output_blob: serde_json::json!({"type": "error", "kind": "NetworkError", "message": "boom"}),
            llm_model: None,
            tokens_used: 0,
            cost_est: 0.0,
            created_at: Utc::now(),
            is_model_error: false,
        };
        let step = AnalysisStep::try_from(record).unwrap();
        assert!(step.output.is_error());
    }
}
