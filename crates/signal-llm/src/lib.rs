//! LLM 모델 호출.
//!
//! - [`ModelCaller`]: 요청 → 응답(토큰/비용) 또는 타입 있는 실패
//! - [`OpenRouterClient`]: OpenRouter HTTP 구현
//! - [`CostModel`]: 1,000 토큰당 비용 추정

pub mod caller;
pub mod cost;
pub mod error;
pub mod openrouter;

pub use caller::{ModelCaller, ModelRequest, ModelResponse};
pub use cost::CostModel;
pub use error::{ModelError, Result};
pub use openrouter::OpenRouterClient;
