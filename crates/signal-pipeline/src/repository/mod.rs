//! 실행/단계 저장소.
//!
//! 오케스트레이터는 [`RunRepository`]를 통해서만 실행과 단계를 기록합니다.
//! 서로 다른 실행의 동시 기록을 허용해야 합니다.

pub mod postgres;

use async_trait::async_trait;
use signal_core::{AnalysisRun, AnalysisStep, RunStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::RepositoryError;

pub use postgres::PgRunRepository;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 실행/단계 영속화 계약.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// QUEUED 실행을 생성합니다.
    async fn create_run(&self, run: &AnalysisRun) -> RepositoryResult<()>;

    /// 실행 상태/종료 시각/누적 비용을 갱신합니다.
    async fn update_run(&self, run: &AnalysisRun) -> RepositoryResult<()>;

    /// 저장된 실행이 QUEUED일 때만 `run`으로 갱신합니다.
    ///
    /// 확인과 갱신은 원자적이어야 합니다. 다른 호출자가 먼저 가져갔으면 `false`.
    async fn claim_run(&self, run: &AnalysisRun) -> RepositoryResult<bool>;

    async fn get_run(&self, id: Uuid) -> RepositoryResult<Option<AnalysisRun>>;

    /// 단계 기록을 추가합니다.
    async fn append_step(&self, step: &AnalysisStep) -> RepositoryResult<()>;

    /// 실행의 단계 기록 (추가 순서).
    async fn list_steps(&self, run_id: Uuid) -> RepositoryResult<Vec<AnalysisStep>>;
}

/// 메모리 저장소.
///
/// DB 없이 CLI를 실행하거나 테스트할 때 사용합니다.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<Uuid, AnalysisRun>>,
    steps: RwLock<Vec<AnalysisStep>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create_run(&self, run: &AnalysisRun) -> RepositoryResult<()> {
        self.runs.write().await.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &AnalysisRun) -> RepositoryResult<()> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(run.id)),
        }
    }

    async fn claim_run(&self, run: &AnalysisRun) -> RepositoryResult<bool> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(existing) if existing.status == RunStatus::Queued => {
                *existing = run.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(run.id)),
        }
    }

    async fn get_run(&self, id: Uuid) -> RepositoryResult<Option<AnalysisRun>> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn append_step(&self, step: &AnalysisStep) -> RepositoryResult<()> {
        if !self.runs.read().await.contains_key(&step.run_id) {
            return Err(RepositoryError::NotFound(step.run_id));
        }
        self.steps.write().await.push(step.clone());
        Ok(())
    }

    async fn list_steps(&self, run_id: Uuid) -> RepositoryResult<Vec<AnalysisStep>> {
        Ok(self
            .steps
            .read()
            .await
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect())
    }
}
