//! 토큰 기반 비용 추정.

use std::collections::HashMap;

/// 1,000 토큰당 비용 표.
#[derive(Debug, Clone, PartialEq)]
pub struct CostModel {
    default_per_1k: f64,
    per_model: HashMap<String, f64>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl CostModel {
    pub fn new(default_per_1k: f64) -> Self {
        Self {
            default_per_1k: default_per_1k.max(0.0),
            per_model: HashMap::new(),
        }
    }

    pub fn with_model_rate(mut self, model: impl Into<String>, per_1k: f64) -> Self {
        self.per_model.insert(model.into(), per_1k.max(0.0));
        self
    }

    pub fn with_model_rates(mut self, rates: &HashMap<String, f64>) -> Self {
        for (model, rate) in rates {
            self.per_model.insert(model.clone(), rate.max(0.0));
        }
        self
    }

    pub fn rate_for(&self, model: &str) -> f64 {
        self.per_model
            .get(model)
            .copied()
            .unwrap_or(self.default_per_1k)
    }

    /// `tokens / 1000 × rate`
    pub fn estimate(&self, model: &str, tokens: u32) -> f64 {
        tokens as f64 / 1000.0 * self.rate_for(model)
    }
}
