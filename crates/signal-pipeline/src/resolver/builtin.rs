//! 내장 분석 유형.

use async_trait::async_trait;
use signal_core::{AnalysisType, PipelineConfig, Timeframe};

use super::AnalysisTypeSource;
use crate::analyzer::StepKind;
use crate::repository::RepositoryResult;

/// 데이스타트 프리셋: Wyckoff, SMC, VSA, Delta, ICT 분석 후 텔레그램 게시글로 병합.
pub fn daystart_analysis_type() -> AnalysisType {
    let steps = StepKind::DAYSTART
        .iter()
        .map(StepKind::default_step_config)
        .collect();

    AnalysisType {
        name: "daystart".to_string(),
        display_name: "Daystart Analysis".to_string(),
        description: Some(
            "Full market analysis using 5 methodologies: Wyckoff, SMC, VSA, Delta, and ICT. \
             Produces comprehensive Telegram-ready trading post."
                .to_string(),
        ),
        version: "1.0.0".to_string(),
        config: PipelineConfig {
            steps,
            default_instrument: Some("BTC/USDT".to_string()),
            default_timeframe: Some(Timeframe::H1),
            estimated_cost: Some(0.18),
            estimated_duration_seconds: Some(120),
        },
        is_active: true,
    }
}

/// 코드에 포함된 분석 유형.
#[derive(Debug, Clone)]
pub struct BuiltinAnalysisTypes {
    types: Vec<AnalysisType>,
}

impl Default for BuiltinAnalysisTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinAnalysisTypes {
    pub fn new() -> Self {
        Self {
            types: vec![daystart_analysis_type()],
        }
    }

    pub fn from_types(types: Vec<AnalysisType>) -> Self {
        Self { types }
    }
}

#[async_trait]
impl AnalysisTypeSource for BuiltinAnalysisTypes {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn find(&self, name: &str) -> RepositoryResult<Option<AnalysisType>> {
        Ok(self.types.iter().find(|t| t.name == name).cloned())
    }

    async fn list(&self) -> RepositoryResult<Vec<AnalysisType>> {
        Ok(self.types.clone())
    }
}
