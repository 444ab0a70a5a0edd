//! 파이프라인 설정과 분석 유형.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{CoreError, CoreResult};
use crate::types::Timeframe;

fn default_data_sources() -> Vec<String> {
    vec!["market_data".to_string()]
}

/// 단계 하나의 설정.
///
/// 오케스트레이터의 단계와 `step_name`으로 매칭됩니다. 비어 있는 필드는
/// 분석기 내장 기본값으로 대체됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub step_name: String,
    /// 단계 유형 (예: "llm_analysis")
    #[serde(default)]
    pub step_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// `{instrument}`, `{timeframe}`, `{market_data_summary}`, `{<단계>_output}` 치환자 지원
    #[serde(default)]
    pub user_prompt_template: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_data_sources")]
    pub data_sources: Vec<String>,
}

impl StepConfig {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            step_type: None,
            model: None,
            system_prompt: None,
            user_prompt_template: None,
            temperature: None,
            max_tokens: None,
            data_sources: default_data_sources(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_prompts(
        mut self,
        system_prompt: impl Into<String>,
        user_prompt_template: impl Into<String>,
    ) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self.user_prompt_template = Some(user_prompt_template.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn validate(&self) -> CoreResult<()> {
        if self.step_name.trim().is_empty() {
            return Err(CoreError::Validation("step_name이 비어 있습니다".to_string()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(CoreError::Validation(format!(
                    "{}: temperature {} 범위 초과 (0.0..=2.0)",
                    self.step_name, t
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(CoreError::Validation(format!(
                "{}: max_tokens는 0보다 커야 합니다",
                self.step_name
            )));
        }
        Ok(())
    }
}

/// 단계 설정의 순서 있는 목록과 실행 기본값.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub default_instrument: Option<String>,
    #[serde(default)]
    pub default_timeframe: Option<Timeframe>,
    /// 예상 비용 (표시용)
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    #[serde(default)]
    pub estimated_duration_seconds: Option<u64>,
}

impl PipelineConfig {
    pub fn new(steps: Vec<StepConfig>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 이름으로 단계 설정을 찾습니다.
    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.step_name == name)
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.step_name.as_str())
    }

    /// 단계 이름 중복과 값 범위를 검증합니다.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            step.validate()?;
            if !seen.insert(step.step_name.as_str()) {
                return Err(CoreError::Validation(format!(
                    "중복된 step_name: {}",
                    step.step_name
                )));
            }
        }
        Ok(())
    }
}

/// 이름이 붙은 파이프라인 프리셋.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisType {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    pub config: PipelineConfig,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_active() -> bool {
    true
}
