//! OpenRouter 채팅 완성 클라이언트.
//!
//! OpenAI 호환 `/chat/completions` 엔드포인트를 사용합니다.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use signal_core::LlmConfig;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::caller::{ModelCaller, ModelRequest, ModelResponse};
use crate::cost::CostModel;
use crate::error::{ModelError, Result};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    /// 일부 프로바이더는 200 응답에 에러를 담아 보냄
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

/// OpenRouter 클라이언트.
pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    default_model: String,
    cost_model: CostModel,
}

impl OpenRouterClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
            cost_model: CostModel::default(),
        })
    }

    /// 설정에서 생성합니다. API 키가 없으면 `ModelError::Config`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ModelError::Config("OpenRouter API key not configured (SIGNAL__LLM__API_KEY)".to_string())
        })?;

        let cost_model = CostModel::new(config.cost_per_1k_tokens).with_model_rates(&config.model_costs);

        Ok(Self::new(
            &config.base_url,
            api_key,
            &config.default_model,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_cost_model(cost_model))
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn map_status(status: u16, body: String) -> ModelError {
        match status {
            429 => ModelError::RateLimited(body),
            401 => ModelError::Unauthorized(body),
            _ => ModelError::Http {
                status,
                message: body,
            },
        }
    }

    fn map_api_error(err: ApiError) -> ModelError {
        let status = err.code.as_ref().and_then(|c| match c {
            serde_json::Value::Number(n) => n.as_u64().map(|v| v as u16),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        });
        match status {
            Some(status) => Self::map_status(status, err.message),
            None => ModelError::InvalidResponse(err.message),
        }
    }
}

#[async_trait]
impl ModelCaller for OpenRouterClient {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(model = %model, "LLM 호출");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header("X-Title", "signal-bot")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %model, error = %e, "LLM 요청 실패");
                ModelError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                warn!(model = %model, "LLM rate limited");
            } else {
                error!(model = %model, status = status.as_u16(), body = %text, "LLM 호출 실패");
            }
            return Err(Self::map_status(status.as_u16(), text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::InvalidResponse(format!("{}: {}", e, text)))?;

        if let Some(err) = parsed.error {
            warn!(model = %model, message = %err.message, "LLM 응답에 에러 포함");
            return Err(Self::map_api_error(err));
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelError::InvalidResponse("응답에 content 없음".to_string()))?;

        let tokens_used = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        let used_model = parsed.model.unwrap_or(model);
        let cost_estimate = self.cost_model.estimate(&used_model, tokens_used);

        info!(model = %used_model, tokens = tokens_used, cost = cost_estimate, "LLM 호출 완료");

        Ok(ModelResponse {
            content,
            model: used_model,
            tokens_used,
            cost_estimate,
        })
    }
}
