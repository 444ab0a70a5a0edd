//! 모델 호출 계약.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 단일 채팅 완성 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// 모델 ID (없으면 호출자 기본 모델)
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            model: None,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// 모델 응답과 사용량.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    /// 실제 사용된 모델 ID
    pub model: String,
    pub tokens_used: u32,
    /// 예상 비용 (음수 아님)
    pub cost_estimate: f64,
}

/// LLM 호출자.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse>;
}
