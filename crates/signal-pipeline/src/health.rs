//! 모델 상태 레지스트리.
//!
//! 모델 실패로 분류된 모델을 기록합니다. 실패 플래그는 멱등이며 카운터가 아닙니다.
//! 오케스트레이터가 생성 시 주입받으므로 테스트마다 독립된 인스턴스를 사용할 수 있습니다.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, warn};

/// 모델 하나의 상태.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelHealth {
    pub model: String,
    pub failing: bool,
    pub last_error: Option<String>,
    pub last_failed_at: Option<DateTime<Utc>>,
}

/// 실패한 모델 레지스트리.
#[derive(Debug, Default)]
pub struct ModelHealthRegistry {
    entries: RwLock<HashMap<String, ModelHealth>>,
}

impl ModelHealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모델을 실패로 표시합니다. 이미 표시된 경우 마지막 에러만 갱신합니다.
    pub fn mark_failed(&self, model: &str, error: &str, at: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(model.to_string()).or_insert_with(|| ModelHealth {
            model: model.to_string(),
            failing: false,
            last_error: None,
            last_failed_at: None,
        });
        if !entry.failing {
            warn!(model = %model, error = %error, "모델 실패 표시");
        }
        entry.failing = true;
        entry.last_error = Some(error.to_string());
        entry.last_failed_at = Some(at);
    }

    pub fn is_failing(&self, model: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(model)
            .map(|h| h.failing)
            .unwrap_or(false)
    }

    /// 운영자가 모델 실패 표시를 해제합니다.
    pub fn clear(&self, model: &str) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(model)
            .is_some();
        if removed {
            info!(model = %model, "모델 실패 표시 해제");
        }
        removed
    }

    /// 실패 중인 모델 목록 (이름순).
    pub fn failing_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|h| h.failing)
            .map(|h| h.model.clone())
            .collect();
        models.sort();
        models
    }

    pub fn snapshot(&self) -> Vec<ModelHealth> {
        let mut all: Vec<ModelHealth> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.model.cmp(&b.model));
        all
    }
}
