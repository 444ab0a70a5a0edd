//! 예약 실행.

use serde::Serialize;
use signal_core::{RunStatus, Timeframe, TriggerKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::app::App;

/// 예약 실행 1회분 통계.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    /// 시작한 실행 수
    pub total: usize,
    pub succeeded: usize,
    pub model_failures: usize,
    /// FAILED 또는 실행 생성 실패
    pub failed: usize,
    pub total_cost: f64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BatchStats {
    pub fn record(&mut self, status: Option<RunStatus>, cost: f64) {
        self.total += 1;
        self.total_cost += cost;
        match status {
            Some(RunStatus::Succeeded) => self.succeeded += 1,
            Some(RunStatus::ModelFailure) => self.model_failures += 1,
            _ => self.failed += 1,
        }
    }

    pub fn log_summary(&self) {
        info!(
            total = self.total,
            succeeded = self.succeeded,
            model_failures = self.model_failures,
            failed = self.failed,
            cost = format!("{:.4}", self.total_cost),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "예약 실행 완료"
        );
    }
}

/// 종목마다 태스크 하나로 실행을 동시에 진행합니다.
pub async fn run_batch(app: Arc<App>, instruments: &[String], timeframe: Timeframe) -> BatchStats {
    let started = Instant::now();
    let mut tasks = JoinSet::new();

    for instrument in instruments {
        let app = app.clone();
        let instrument = instrument.clone();
        tasks.spawn(async move {
            let result = app
                .execute(TriggerKind::Scheduled, &instrument, timeframe, None, None)
                .await;
            (instrument, result)
        });
    }

    let mut stats = BatchStats::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((instrument, Ok((run, telemetry)))) => {
                info!(instrument = %instrument, run_id = %run.id, status = %run.status, "예약 실행 종료");
                stats.record(Some(run.status), telemetry.total_cost);
            }
            Ok((instrument, Err(e))) => {
                error!(instrument = %instrument, error = %e, "예약 실행 실패");
                stats.record(None, 0.0);
            }
            Err(e) => {
                error!(error = %e, "예약 실행 태스크 비정상 종료");
                stats.record(None, 0.0);
            }
        }
    }

    stats.elapsed = started.elapsed();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_stats_record() {
        let mut stats = BatchStats::default();
        stats.record(Some(RunStatus::Succeeded), 0.05);
        stats.record(Some(RunStatus::ModelFailure), 0.01);
        stats.record(Some(RunStatus::Failed), 0.0);
        stats.record(None, 0.0);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.model_failures, 1);
        assert_eq!(stats.failed, 2);
        assert!((stats.total_cost - 0.06).abs() < 1e-12);
    }
}
