//! 파이프라인 설정 해석.
//!
//! 우선순위: 명시적 오버라이드 > 이름 있는 분석 유형 (등록된 소스 순서대로) > 전제 조건 실패.
//! 기본 소스 순서는 DB, 파일, 내장 프리셋입니다.

pub mod builtin;
pub mod file;
pub mod postgres;

use async_trait::async_trait;
use signal_core::{AnalysisType, PipelineConfig};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::repository::RepositoryResult;

pub use builtin::{daystart_analysis_type, BuiltinAnalysisTypes};
pub use file::FileAnalysisTypes;
pub use postgres::PgAnalysisTypes;

/// 분석 유형 조회 소스.
#[async_trait]
pub trait AnalysisTypeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn find(&self, name: &str) -> RepositoryResult<Option<AnalysisType>>;

    async fn list(&self) -> RepositoryResult<Vec<AnalysisType>>;
}

/// 해석된 설정.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// 분석 유형 이름 (오버라이드면 None)
    pub analysis_type: Option<String>,
    pub config: PipelineConfig,
}

/// 설정 해석기.
#[derive(Clone, Default)]
pub struct PipelineConfigResolver {
    sources: Vec<Arc<dyn AnalysisTypeSource>>,
}

impl PipelineConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 소스를 추가합니다. 먼저 추가한 소스가 우선합니다.
    pub fn with_source(mut self, source: Arc<dyn AnalysisTypeSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// 설정을 해석합니다.
    ///
    /// 해석할 수 없거나 검증에 실패하면 [`PipelineError::Precondition`].
    pub async fn resolve(
        &self,
        analysis_type: Option<&str>,
        override_config: Option<PipelineConfig>,
    ) -> PipelineResult<ResolvedConfig> {
        if let Some(config) = override_config {
            validate(&config)?;
            debug!(steps = config.steps.len(), "오버라이드 설정 사용");
            return Ok(ResolvedConfig {
                analysis_type: None,
                config,
            });
        }

        let name = analysis_type.ok_or_else(|| {
            PipelineError::Precondition("분석 유형 또는 설정이 지정되지 않았습니다".to_string())
        })?;

        let found = self.find(name).await.ok_or_else(|| {
            PipelineError::Precondition(format!("알 수 없는 분석 유형: {}", name))
        })?;

        if !found.is_active {
            return Err(PipelineError::Precondition(format!(
                "비활성화된 분석 유형: {}",
                name
            )));
        }

        validate(&found.config)?;
        Ok(ResolvedConfig {
            analysis_type: Some(found.name),
            config: found.config,
        })
    }

    /// 모든 소스의 분석 유형 목록. 이름이 겹치면 먼저 등록된 소스가 우선합니다.
    pub async fn list(&self) -> Vec<AnalysisType> {
        let mut types: Vec<AnalysisType> = Vec::new();
        for source in &self.sources {
            match source.list().await {
                Ok(listed) => {
                    for t in listed {
                        if !types.iter().any(|existing| existing.name == t.name) {
                            types.push(t);
                        }
                    }
                }
                Err(e) => warn!(source = source.name(), error = %e, "분석 유형 목록 조회 실패"),
            }
        }
        types
    }

    async fn find(&self, name: &str) -> Option<AnalysisType> {
        for source in &self.sources {
            match source.find(name).await {
                Ok(Some(found)) => {
                    debug!(source = source.name(), analysis_type = %name, "분석 유형 해석");
                    return Some(found);
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(source = source.name(), analysis_type = %name, error = %e, "분석 유형 조회 실패, 다음 소스 시도");
                }
            }
        }
        None
    }
}

fn validate(config: &PipelineConfig) -> PipelineResult<()> {
    if config.is_empty() {
        return Err(PipelineError::Precondition(
            "파이프라인 설정에 단계가 없습니다".to_string(),
        ));
    }
    config
        .validate()
        .map_err(|e| PipelineError::Precondition(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryError;
    use signal_core::StepConfig;

    struct BrokenSource;

    #[async_trait]
    impl AnalysisTypeSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn find(&self, _name: &str) -> RepositoryResult<Option<AnalysisType>> {
            Err(RepositoryError::Database("connection refused".into()))
        }

        async fn list(&self) -> RepositoryResult<Vec<AnalysisType>> {
            Err(RepositoryError::Database("connection refused".into()))
        }
    }

    fn custom_type(active: bool) -> AnalysisType {
        AnalysisType {
            name: "daystart".into(),
            display_name: "Custom".into(),
            description: None,
            version: "2.0.0".into(),
            config: PipelineConfig::new(vec![StepConfig::new("wyckoff")]),
            is_active: active,
        }
    }

    fn resolver_with(first: AnalysisType) -> PipelineConfigResolver {
        PipelineConfigResolver::new()
            .with_source(Arc::new(BuiltinAnalysisTypes::from_types(vec![first])))
            .with_source(Arc::new(BuiltinAnalysisTypes::new()))
    }

    #[tokio::test]
    async fn test_override_wins() {
        let resolver = resolver_with(custom_type(true));
        let config = PipelineConfig::new(vec![StepConfig::new("smc")]);

        let resolved = resolver
            .resolve(Some("daystart"), Some(config.clone()))
            .await
            .unwrap();
        assert_eq!(resolved.config, config);
        assert!(resolved.analysis_type.is_none());
    }

    #[tokio::test]
    async fn test_first_source_wins() {
        let resolved = resolver_with(custom_type(true))
            .resolve(Some("daystart"), None)
            .await
            .unwrap();
        assert_eq!(resolved.config.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_type_not_resolvable() {
        let err = resolver_with(custom_type(false))
            .resolve(Some("daystart"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_nothing_resolvable() {
        let resolver = PipelineConfigResolver::new().with_source(Arc::new(BuiltinAnalysisTypes::new()));
        assert!(matches!(
            resolver.resolve(Some("weekly"), None).await,
            Err(PipelineError::Precondition(_))
        ));
        assert!(matches!(
            resolver.resolve(None, None).await,
            Err(PipelineError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_or_invalid_override_rejected() {
        let resolver = PipelineConfigResolver::new();
        assert!(matches!(
            resolver.resolve(None, Some(PipelineConfig::default())).await,
            Err(PipelineError::Precondition(_))
        ));

        let duplicated = PipelineConfig::new(vec![StepConfig::new("vsa"), StepConfig::new("vsa")]);
        assert!(matches!(
            resolver.resolve(None, Some(duplicated)).await,
            Err(PipelineError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_broken_source_falls_through() {
        let resolver = PipelineConfigResolver::new()
            .with_source(Arc::new(BrokenSource))
            .with_source(Arc::new(BuiltinAnalysisTypes::new()));

        let resolved = resolver.resolve(Some("daystart"), None).await.unwrap();
        assert_eq!(resolved.analysis_type.as_deref(), Some("daystart"));
        assert_eq!(resolver.list().await.len(), 1);
    }
}
