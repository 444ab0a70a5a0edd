//! `analysis_types` 테이블 소스.

use async_trait::async_trait;
use signal_core::{AnalysisType, PipelineConfig};
use sqlx::{FromRow, PgPool};

use super::AnalysisTypeSource;
use crate::error::RepositoryError;
use crate::repository::RepositoryResult;

/// `analysis_types` 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisTypeRecord {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub version: String,
    pub config: serde_json::Value,
    pub is_active: bool,
}

impl TryFrom<AnalysisTypeRecord> for AnalysisType {
    type Error = RepositoryError;

    fn try_from(record: AnalysisTypeRecord) -> Result<Self, Self::Error> {
        let config: PipelineConfig = serde_json::from_value(record.config).map_err(|e| {
            RepositoryError::InvalidData(format!("analysis_types.{}: {}", record.name, e))
        })?;

        Ok(AnalysisType {
            name: record.name,
            display_name: record.display_name,
            description: record.description,
            version: record.version,
            config,
            is_active: record.is_active,
        })
    }
}

/// DB 분석 유형 소스.
#[derive(Clone)]
pub struct PgAnalysisTypes {
    pool: PgPool,
}

impl PgAnalysisTypes {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 분석 유형을 저장합니다 (이름 기준 upsert).
    pub async fn upsert(&self, analysis_type: &AnalysisType) -> RepositoryResult<()> {
        let config = serde_json::to_value(&analysis_type.config)?;

        sqlx::query(
            r#"
            INSERT INTO analysis_types (name, display_name, description, version, config, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                description = EXCLUDED.description,
                version = EXCLUDED.version,
                config = EXCLUDED.config,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(&analysis_type.name)
        .bind(&analysis_type.display_name)
        .bind(&analysis_type.description)
        .bind(&analysis_type.version)
        .bind(config)
        .bind(analysis_type.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AnalysisTypeSource for PgAnalysisTypes {
    fn name(&self) -> &str {
        "database"
    }

    async fn find(&self, name: &str) -> RepositoryResult<Option<AnalysisType>> {
        let record: Option<AnalysisTypeRecord> = sqlx::query_as(
            r#"
            SELECT name, display_name, description, version, config, is_active
            FROM analysis_types
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        record.map(AnalysisType::try_from).transpose()
    }

    async fn list(&self) -> RepositoryResult<Vec<AnalysisType>> {
        let records: Vec<AnalysisTypeRecord> = sqlx::query_as(
            r#"
            SELECT name, display_name, description, version, config, is_active
            FROM analysis_types
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(AnalysisType::try_from).collect()
    }
}
