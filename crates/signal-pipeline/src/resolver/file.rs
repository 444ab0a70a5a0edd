//! TOML 파일 분석 유형 소스.
//!
//! ```toml
//! [[analysis_types]]
//! name = "scalp"
//! display_name = "Scalp"
//!
//! [analysis_types.config]
//! default_timeframe = "M15"
//!
//! [[analysis_types.config.steps]]
//! step_name = "price_action"
//! model = "openai/gpt-4o"
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use signal_core::AnalysisType;
use std::path::Path;
use tracing::info;

use super::AnalysisTypeSource;
use crate::error::RepositoryError;
use crate::repository::RepositoryResult;

#[derive(Debug, Deserialize)]
struct AnalysisTypesFile {
    #[serde(default)]
    analysis_types: Vec<AnalysisType>,
}

/// 시작 시 한 번 읽어 둔 파일 소스.
#[derive(Debug, Clone)]
pub struct FileAnalysisTypes {
    path: String,
    types: Vec<AnalysisType>,
}

impl FileAnalysisTypes {
    /// 파일을 읽습니다.
    pub fn load(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::InvalidData(format!("{} 읽기 실패: {}", path.display(), e))
        })?;
        let source = Self::from_toml_str(&content, path.display().to_string())?;
        info!(path = %path.display(), count = source.types.len(), "분석 유형 파일 로드");
        Ok(source)
    }

    pub fn from_toml_str(content: &str, origin: impl Into<String>) -> RepositoryResult<Self> {
        let origin = origin.into();
        let parsed: AnalysisTypesFile = toml::from_str(content)
            .map_err(|e| RepositoryError::InvalidData(format!("{}: {}", origin, e)))?;
        Ok(Self {
            path: origin,
            types: parsed.analysis_types,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl AnalysisTypeSource for FileAnalysisTypes {
    fn name(&self) -> &str {
        "file"
    }

    async fn find(&self, name: &str) -> RepositoryResult<Option<AnalysisType>> {
        Ok(self.types.iter().find(|t| t.name == name).cloned())
    }

    async fn list(&self) -> RepositoryResult<Vec<AnalysisType>> {
        Ok(self.types.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::Timeframe;

    const SAMPLE: &str = r#"
        [[analysis_types]]
        name = "scalp"
        display_name = "Scalp"
        is_active = false

        [analysis_types.config]
        default_timeframe = "M15"
        estimated_cost = 0.02

        [[analysis_types.config.steps]]
        step_name = "price_action"
        model = "openai/gpt-4o"
        temperature = 0.3
    "#;

    #[tokio::test]
    async fn test_parse_file() {
        let source = FileAnalysisTypes::from_toml_str(SAMPLE, "inline").unwrap();
        let scalp = source.find("scalp").await.unwrap().unwrap();

        assert!(!scalp.is_active);
        assert_eq!(scalp.version, "1.0.0");
        assert_eq!(scalp.config.default_timeframe, Some(Timeframe::M15));
        assert_eq!(
            scalp.config.step("price_action").and_then(|s| s.model.as_deref()),
            Some("openai/gpt-4o")
        );
        assert!(source.find("daystart").await.unwrap().is_none());
    }

    #[test]
    fn test_invalid_toml() {
        let err = FileAnalysisTypes::from_toml_str("[[analysis_types]]\nname = 1", "bad.toml")
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidData(msg) if msg.starts_with("bad.toml")));
    }
}
