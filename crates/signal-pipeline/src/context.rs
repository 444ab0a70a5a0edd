//! 실행 범위 컨텍스트.

use serde::{Deserialize, Serialize};
use signal_core::{NormalizedMarketData, Timeframe};
use std::sync::Arc;

use crate::analyzer::StepKind;

/// 분석기 1회 실행 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 입력 스냅샷
    pub input: serde_json::Value,
    /// 모델 출력 텍스트
    pub output: String,
    pub model: String,
    pub tokens_used: u32,
    pub cost_estimate: f64,
}

/// 한 실행 동안만 존재하는 컨텍스트.
///
/// 성공한 단계의 결과만 삽입 순서대로 보관합니다. 실패한 단계는 없으므로
/// 조회 결과는 항상 `Option`입니다. 실행 계획이 지정되지 않으면 데이스타트 순서를 따릅니다.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    instrument: String,
    timeframe: Timeframe,
    market_data: Arc<NormalizedMarketData>,
    plan: Vec<StepKind>,
    completed: Vec<(String, StepResult)>,
}

impl PipelineContext {
    pub fn new(
        instrument: impl Into<String>,
        timeframe: Timeframe,
        market_data: Arc<NormalizedMarketData>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
            market_data,
            plan: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// 이번 실행의 단계 순서를 지정합니다.
    pub fn with_plan(mut self, plan: &[StepKind]) -> Self {
        self.plan = plan.to_vec();
        self
    }

    pub fn plan(&self) -> &[StepKind] {
        if self.plan.is_empty() {
            &StepKind::DAYSTART
        } else {
            &self.plan
        }
    }

    /// 계획에 있거나 이미 완료된 단계인지 확인합니다.
    pub fn is_planned(&self, step: StepKind) -> bool {
        self.plan().contains(&step) || self.previous(step.name()).is_some()
    }

    /// 계획에서 `step`보다 앞선 단계.
    ///
    /// `step`이 계획에 없으면 계획 전체(자기 자신 제외)를 반환합니다.
    pub fn planned_before(&self, step: StepKind) -> Vec<StepKind> {
        self.plan()
            .iter()
            .copied()
            .take_while(|k| *k != step)
            .collect()
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn market_data(&self) -> &NormalizedMarketData {
        &self.market_data
    }

    /// 단계 결과를 추가합니다. 같은 이름이 있으면 교체합니다.
    pub fn insert(&mut self, step_name: impl Into<String>, result: StepResult) {
        let step_name = step_name.into();
        match self.completed.iter_mut().find(|(name, _)| *name == step_name) {
            Some((_, existing)) => *existing = result,
            None => self.completed.push((step_name, result)),
        }
    }

    pub fn previous(&self, step_name: &str) -> Option<&StepResult> {
        self.completed
            .iter()
            .find(|(name, _)| name == step_name)
            .map(|(_, result)| result)
    }

    pub fn previous_output(&self, step_name: &str) -> Option<&str> {
        self.previous(step_name).map(|r| r.output.as_str())
    }

    /// 완료된 단계 (삽입 순서).
    pub fn completed(&self) -> impl Iterator<Item = (&str, &StepResult)> {
        self.completed.iter().map(|(name, r)| (name.as_str(), r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(output: &str) -> StepResult {
        StepResult {
            input: serde_json::json!({}),
            output: output.to_string(),
            model: "m".to_string(),
            tokens_used: 10,
            cost_estimate: 0.0001,
        }
    }

    fn context() -> PipelineContext {
        let data =
            NormalizedMarketData::new("BTC/USDT", Timeframe::H1, "test", vec![], Utc::now()).unwrap();
        PipelineContext::new("BTC/USDT", Timeframe::H1, Arc::new(data))
    }

    #[test]
    fn test_missing_step_is_absent() {
        let mut ctx = context();
        ctx.insert("wyckoff", result("phase B"));

        assert_eq!(ctx.previous_output("wyckoff"), Some("phase B"));
        assert!(ctx.previous("smc").is_none());
    }

    #[test]
    fn test_insertion_order_kept() {
        let mut ctx = context();
        ctx.insert("smc", result("a"));
        ctx.insert("wyckoff", result("b"));
        ctx.insert("smc", result("c"));

        let names: Vec<&str> = ctx.completed().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["smc", "wyckoff"]);
        assert_eq!(ctx.previous_output("smc"), Some("c"));
    }

    #[test]
    fn test_plan_defaults_to_daystart() {
        let ctx = context();
        assert_eq!(ctx.plan(), &StepKind::DAYSTART);
        assert_eq!(
            ctx.planned_before(StepKind::Merge),
            vec![
                StepKind::Wyckoff,
                StepKind::Smc,
                StepKind::Vsa,
                StepKind::Delta,
                StepKind::Ict
            ]
        );
    }

    #[test]
    fn test_planned_before_follows_custom_plan() {
        let ctx = context().with_plan(&[StepKind::PriceAction, StepKind::Wyckoff, StepKind::Merge]);

        assert_eq!(
            ctx.planned_before(StepKind::Merge),
            vec![StepKind::PriceAction, StepKind::Wyckoff]
        );
        assert!(ctx.planned_before(StepKind::PriceAction).is_empty());
        assert!(!ctx.is_planned(StepKind::Smc));
        assert!(ctx.is_planned(StepKind::Wyckoff));
    }
}
