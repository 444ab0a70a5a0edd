//! 단계 분석기.
//!
//! 분석기는 닫힌 열거형 [`StepKind`]로 표현됩니다. 모든 변형은 같은 계약을 따릅니다:
//! 컨텍스트와 (선택적) 단계 설정을 받아 모델을 한 번 호출하고 [`StepResult`]를 반환합니다.
//! 영속화와 캐시 접근은 하지 않습니다.

pub mod features;
pub mod prompts;

use serde::{Deserialize, Serialize};
use signal_core::StepConfig;
use signal_llm::{ModelCaller, ModelRequest};
use std::fmt;
use std::str::FromStr;

use crate::context::{PipelineContext, StepResult};
use crate::error::StepError;

pub use features::MarketSummary;
pub use prompts::{missing_output_marker, render, RenderedPrompt};

/// 설정이 없을 때 사용하는 모델.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const MERGE_MAX_TOKENS: u32 = 4000;

/// 파이프라인 단계 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Wyckoff,
    Smc,
    Vsa,
    Delta,
    Ict,
    PriceAction,
    Merge,
}

impl StepKind {
    pub const ALL: [StepKind; 7] = [
        StepKind::Wyckoff,
        StepKind::Smc,
        StepKind::Vsa,
        StepKind::Delta,
        StepKind::Ict,
        StepKind::PriceAction,
        StepKind::Merge,
    ];

    /// 데이스타트 분석 순서.
    pub const DAYSTART: [StepKind; 6] = [
        StepKind::Wyckoff,
        StepKind::Smc,
        StepKind::Vsa,
        StepKind::Delta,
        StepKind::Ict,
        StepKind::Merge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Wyckoff => "wyckoff",
            StepKind::Smc => "smc",
            StepKind::Vsa => "vsa",
            StepKind::Delta => "delta",
            StepKind::Ict => "ict",
            StepKind::PriceAction => "price_action",
            StepKind::Merge => "merge",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// 요약에 사용하는 최근 캔들 수.
    pub fn candle_window(&self) -> usize {
        match self {
            StepKind::Wyckoff => 20,
            StepKind::Smc | StepKind::Ict => 50,
            StepKind::Vsa | StepKind::Delta | StepKind::PriceAction => 30,
            StepKind::Merge => 20,
        }
    }

    pub fn default_data_sources(&self) -> Vec<String> {
        let sources: &[&str] = match self {
            StepKind::Ict => &["market_data", "previous_steps"],
            StepKind::Merge => &["previous_steps"],
            _ => &["market_data"],
        };
        sources.iter().map(|s| s.to_string()).collect()
    }

    pub fn default_system_prompt(&self) -> &'static str {
        match self {
            StepKind::Wyckoff => prompts::WYCKOFF_SYSTEM,
            StepKind::Smc => prompts::SMC_SYSTEM,
            StepKind::Vsa => prompts::VSA_SYSTEM,
            StepKind::Delta => prompts::DELTA_SYSTEM,
            StepKind::Ict => prompts::ICT_SYSTEM,
            StepKind::PriceAction => prompts::PRICE_ACTION_SYSTEM,
            StepKind::Merge => prompts::MERGE_SYSTEM,
        }
    }

    pub fn default_user_template(&self) -> &'static str {
        match self {
            StepKind::Wyckoff => prompts::WYCKOFF_TEMPLATE,
            StepKind::Smc => prompts::SMC_TEMPLATE,
            StepKind::Vsa => prompts::VSA_TEMPLATE,
            StepKind::Delta => prompts::DELTA_TEMPLATE,
            StepKind::Ict => prompts::ICT_TEMPLATE,
            StepKind::PriceAction => prompts::PRICE_ACTION_TEMPLATE,
            StepKind::Merge => prompts::MERGE_TEMPLATE,
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            StepKind::Merge => MERGE_MAX_TOKENS,
            _ => DEFAULT_MAX_TOKENS,
        }
    }

    /// 내장 기본값을 모두 채운 단계 설정.
    pub fn default_step_config(&self) -> StepConfig {
        let mut config = StepConfig::new(self.name())
            .with_model(DEFAULT_MODEL)
            .with_prompts(self.default_system_prompt(), self.default_user_template())
            .with_temperature(DEFAULT_TEMPERATURE)
            .with_max_tokens(self.default_max_tokens());
        config.step_type = Some("llm_analysis".to_string());
        config.data_sources = self.default_data_sources();
        config
    }

    /// 이 단계가 호출할 모델 ID.
    pub fn resolve_model(&self, config: Option<&StepConfig>) -> String {
        config
            .and_then(|c| c.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// 모델 요청과 입력 스냅샷을 만듭니다. 모델 호출 없음.
    pub fn prepare(&self, ctx: &PipelineContext, config: Option<&StepConfig>) -> PreparedStep {
        let model = self.resolve_model(config);
        let system_prompt = config
            .and_then(|c| c.system_prompt.clone())
            .unwrap_or_else(|| self.default_system_prompt().to_string());
        let template = config
            .and_then(|c| c.user_prompt_template.as_deref())
            .unwrap_or_else(|| self.default_user_template());
        let temperature = config
            .and_then(|c| c.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = config
            .and_then(|c| c.max_tokens)
            .unwrap_or_else(|| self.default_max_tokens());
        let data_sources = config
            .map(|c| c.data_sources.clone())
            .unwrap_or_else(|| self.default_data_sources());

        let summary = MarketSummary::from_candles(ctx.market_data().tail(self.candle_window()));
        let rendered = render(template, ctx, &summary.to_prompt_text());

        let mut user_prompt = rendered.text.clone();
        let (missing, previous) = if *self == StepKind::Merge {
            self.merge_sections(ctx, &rendered, &mut user_prompt)
        } else {
            (rendered.missing(), rendered.referenced.clone())
        };

        let previous: serde_json::Map<String, serde_json::Value> = previous
            .iter()
            .map(|(name, present)| (name.to_string(), serde_json::Value::Bool(*present)))
            .collect();

        let mut input = serde_json::json!({
            "step": self.name(),
            "instrument": ctx.instrument(),
            "timeframe": ctx.timeframe().code(),
            "model": model,
            "temperature": round_temperature(temperature),
            "max_tokens": max_tokens,
            "data_sources": data_sources,
            "system_prompt": system_prompt,
            "user_prompt": user_prompt,
            "previous_steps": previous,
        });
        if data_sources.iter().any(|s| s == "market_data") {
            input["market_data"] = serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null);
        }

        let request = ModelRequest::new(system_prompt, user_prompt)
            .with_model(model)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);

        PreparedStep {
            request,
            input,
            missing,
        }
    }

    /// Merge는 계획상 앞선 모든 단계를 대상으로 합니다. 템플릿이 참조하지 않은 완료 출력은
    /// 프롬프트 끝에 붙이고, 완료되지 않은 단계는 누락으로 명시합니다.
    fn merge_sections(
        &self,
        ctx: &PipelineContext,
        rendered: &RenderedPrompt,
        user_prompt: &mut String,
    ) -> (Vec<&'static str>, Vec<(&'static str, bool)>) {
        let unreferenced: Vec<(&str, &StepResult)> = ctx
            .completed()
            .filter(|(name, _)| !rendered.referenced.iter().any(|(r, _)| r == name))
            .collect();
        if !unreferenced.is_empty() {
            user_prompt.push_str(&outputs_section(&unreferenced));
        }

        let previous: Vec<(&'static str, bool)> = ctx
            .planned_before(*self)
            .into_iter()
            .map(|k| (k.name(), ctx.previous(k.name()).is_some()))
            .collect();

        let mut missing: Vec<&'static str> = previous
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect();
        missing.sort_unstable();
        if !missing.is_empty() {
            user_prompt.push_str(&format!(
                "\n\nMissing analyses (their steps failed): {}. State this gap explicitly in the post.",
                missing.join(", ")
            ));
        }

        (missing, previous)
    }

    /// 단계를 실행합니다.
    ///
    /// 모델 호출이 실패하면 부분 결과 없이 [`StepError`]를 반환합니다.
    pub async fn analyze(
        &self,
        ctx: &PipelineContext,
        caller: &dyn ModelCaller,
        config: Option<&StepConfig>,
    ) -> Result<StepResult, StepError> {
        let prepared = self.prepare(ctx, config);
        let response = caller.call(&prepared.request).await?;

        let mut output = response.content;
        if *self == StepKind::Merge && !prepared.missing.is_empty() {
            output.push_str(&format!(
                "\n\n⚠️ Missing analyses: {}",
                prepared.missing.join(", ")
            ));
        }

        Ok(StepResult {
            input: prepared.input,
            output,
            model: response.model,
            tokens_used: response.tokens_used,
            cost_estimate: response.cost_estimate.max(0.0),
        })
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("Unknown step: {}", s))
    }
}

/// 실행 준비가 끝난 단계.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStep {
    pub request: ModelRequest,
    pub input: serde_json::Value,
    /// 필요했지만 컨텍스트에 없는 이전 단계
    pub missing: Vec<&'static str>,
}

fn outputs_section(outputs: &[(&str, &StepResult)]) -> String {
    let mut section = String::from("\n\nPrevious analyses:");
    for (name, result) in outputs {
        section.push_str(&format!("\n\n[{}]\n{}", name, result.output));
    }
    section
}

// f32 0.7 -> 0.699999988 방지
fn round_temperature(t: f32) -> f64 {
    (t as f64 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use signal_core::{Candle, NormalizedMarketData, Timeframe};
    use signal_llm::{ModelError, ModelResponse};
    use std::sync::{Arc, Mutex};

    struct EchoCaller {
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl EchoCaller {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelCaller for EchoCaller {
        async fn call(&self, request: &ModelRequest) -> signal_llm::Result<ModelResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(ModelResponse {
                content: "analysis".to_string(),
                model: request.model.clone().unwrap_or_default(),
                tokens_used: 1000,
                cost_estimate: 0.01,
            })
        }
    }

    struct FailingCaller;

    #[async_trait]
    impl ModelCaller for FailingCaller {
        async fn call(&self, _request: &ModelRequest) -> signal_llm::Result<ModelResponse> {
            Err(ModelError::Network("connection reset".into()))
        }
    }

    fn context(candles: usize) -> PipelineContext {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = (0..candles)
            .map(|i| {
                Candle::new(
                    start + Duration::hours(i as i64),
                    dec!(100),
                    dec!(102),
                    dec!(99),
                    dec!(101),
                    dec!(5),
                )
            })
            .collect();
        let data =
            NormalizedMarketData::new("BTC/USDT", Timeframe::H1, "test", candles, start).unwrap();
        PipelineContext::new("BTC/USDT", Timeframe::H1, Arc::new(data))
    }

    #[test]
    fn test_names_round_trip() {
        for kind in StepKind::ALL {
            assert_eq!(StepKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!("price_action".parse::<StepKind>(), Ok(StepKind::PriceAction));
        assert!(StepKind::from_name("model_failures").is_none());
    }

    #[tokio::test]
    async fn test_defaults_without_config() {
        let caller = EchoCaller::new();
        let result = StepKind::Wyckoff.analyze(&context(100), &caller, None).await.unwrap();

        let request = caller.requests.lock().unwrap()[0].clone();
        assert_eq!(request.model.as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(request.max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert!(request.user_prompt.contains("BTC/USDT on H1"));
        assert_eq!(result.input["market_data"]["candle_count"], 20);
        assert_eq!(result.tokens_used, 1000);
    }

    #[tokio::test]
    async fn test_config_overrides_defaults() {
        let caller = EchoCaller::new();
        let config = StepConfig::new("smc")
            .with_model("anthropic/claude-3.5-sonnet")
            .with_prompts("sys", "{instrument}|{timeframe}")
            .with_temperature(0.2);

        StepKind::Smc
            .analyze(&context(10), &caller, Some(&config))
            .await
            .unwrap();

        let request = caller.requests.lock().unwrap()[0].clone();
        assert_eq!(request.model.as_deref(), Some("anthropic/claude-3.5-sonnet"));
        assert_eq!(request.system_prompt, "sys");
        assert_eq!(request.user_prompt, "BTC/USDT|H1");
        assert_eq!(request.temperature, 0.2);
    }

    #[tokio::test]
    async fn test_merge_notes_missing_steps() {
        let caller = EchoCaller::new();
        let mut ctx = context(5);
        ctx.insert(
            "wyckoff",
            StepResult {
                input: serde_json::Value::Null,
                output: "accumulation".into(),
                model: DEFAULT_MODEL.into(),
                tokens_used: 1,
                cost_estimate: 0.0,
            },
        );

        let result = StepKind::Merge.analyze(&ctx, &caller, None).await.unwrap();

        assert!(result.output.contains("Missing analyses: delta, ict, smc, vsa"));
        assert_eq!(result.input["previous_steps"]["wyckoff"], true);
        assert_eq!(result.input["previous_steps"]["smc"], false);
        assert!(result.input.get("market_data").is_none());
    }

    fn completed(output: &str) -> StepResult {
        StepResult {
            input: serde_json::Value::Null,
            output: output.into(),
            model: DEFAULT_MODEL.into(),
            tokens_used: 1,
            cost_estimate: 0.0,
        }
    }

    #[tokio::test]
    async fn test_merge_follows_custom_plan() {
        let caller = EchoCaller::new();
        let mut ctx = context(5).with_plan(&[StepKind::Wyckoff, StepKind::PriceAction, StepKind::Merge]);
        ctx.insert("wyckoff", completed("accumulation"));
        ctx.insert("price_action", completed("higher lows"));

        let result = StepKind::Merge.analyze(&ctx, &caller, None).await.unwrap();

        let request = caller.requests.lock().unwrap()[0].clone();
        assert!(request.user_prompt.contains("[price_action]\nhigher lows"));
        assert!(request.user_prompt.contains(&prompts::not_planned_marker("smc")));
        assert!(!request.user_prompt.contains("Missing analyses"));
        assert_eq!(result.output, "analysis");
        assert_eq!(result.input["previous_steps"]["price_action"], true);
        assert!(result.input["previous_steps"].get("smc").is_none());
    }

    #[tokio::test]
    async fn test_merge_custom_template_still_notes_gap() {
        let caller = EchoCaller::new();
        let mut ctx = context(5);
        for name in ["wyckoff", "vsa", "delta", "ict"] {
            ctx.insert(name, completed(&format!("{} view", name)));
        }
        let config = StepConfig::new("merge").with_prompts("sys", "Combine all analyses for {instrument}.");

        let result = StepKind::Merge
            .analyze(&ctx, &caller, Some(&config))
            .await
            .unwrap();

        let request = caller.requests.lock().unwrap()[0].clone();
        assert!(request.user_prompt.starts_with("Combine all analyses for BTC/USDT."));
        assert!(request.user_prompt.contains("[ict]\nict view"));
        assert!(request.user_prompt.contains("Missing analyses (their steps failed): smc."));
        assert!(result.output.ends_with("⚠️ Missing analyses: smc"));
    }

    #[tokio::test]
    async fn test_model_failure_is_typed() {
        let err = StepKind::Vsa
            .analyze(&context(5), &FailingCaller, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind_name(), "NetworkError");
    }

    #[test]
    fn test_default_step_config_is_complete() {
        let config = StepKind::Merge.default_step_config();
        assert_eq!(config.max_tokens, Some(MERGE_MAX_TOKENS));
        assert_eq!(config.data_sources, vec!["previous_steps".to_string()]);
        assert_eq!(config.step_type.as_deref(), Some("llm_analysis"));
    }
}
