//! 실행 단위 비용/사용량 집계.

use serde::Serialize;
use signal_core::RunStatus;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// 실행 1회의 집계.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunTelemetry {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub steps_succeeded: usize,
    pub steps_failed: usize,
    pub model_failures: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl RunTelemetry {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: RunStatus::Queued,
            steps_succeeded: 0,
            steps_failed: 0,
            model_failures: 0,
            total_tokens: 0,
            total_cost: 0.0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn record_success(&mut self, tokens: u32, cost: f64) {
        self.steps_succeeded += 1;
        self.total_tokens += u64::from(tokens);
        self.total_cost += cost;
    }

    pub fn record_failure(&mut self, model_failure: bool) {
        self.steps_failed += 1;
        if model_failure {
            self.model_failures += 1;
        }
    }

    pub fn steps_attempted(&self) -> usize {
        self.steps_succeeded + self.steps_failed
    }

    /// 집계 요약 로그.
    pub fn log_summary(&self) {
        info!(
            run_id = %self.run_id,
            status = %self.status,
            succeeded = self.steps_succeeded,
            failed = self.steps_failed,
            model_failures = self.model_failures,
            tokens = self.total_tokens,
            cost = format!("{:.4}", self.total_cost),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "분석 실행 통계"
        );
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulation() {
        let mut telemetry = RunTelemetry::new(Uuid::new_v4());
        telemetry.record_success(1200, 0.012);
        telemetry.record_success(800, 0.008);
        telemetry.record_failure(false);
        telemetry.record_failure(true);

        assert_eq!(telemetry.steps_attempted(), 4);
        assert_eq!(telemetry.total_tokens, 2000);
        assert!((telemetry.total_cost - 0.02).abs() < 1e-12);
        assert_eq!(telemetry.model_failures, 1);
    }

    #[test]
    fn test_serialized_elapsed_in_millis() {
        let mut telemetry = RunTelemetry::new(Uuid::nil());
        telemetry.elapsed = Duration::from_millis(1500);
        let json = serde_json::to_value(&telemetry).unwrap();
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(json["status"], "QUEUED");
    }
}
