//! 설정에서 파이프라인 구성 요소를 조립합니다.

use anyhow::{anyhow, Context};
use signal_core::{run_span, AnalysisRun, AppConfig, PipelineConfig, Timeframe, TriggerKind};
use signal_data::{
    AdapterRouter, BinanceAdapter, CacheStore, DataAdapter, InMemoryCacheStore, MarketDataCache,
    PgCacheStore, YahooAdapter,
};
use signal_llm::OpenRouterClient;
use signal_pipeline::{
    BuiltinAnalysisTypes, FileAnalysisTypes, InMemoryRunRepository, ModelHealthRegistry,
    PgAnalysisTypes, PgRunRepository, PipelineConfigResolver, PipelineOrchestrator, RunRepository,
    RunTelemetry,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Instrument};

/// 프로세스 단위 구성 요소.
///
/// 캐시와 모델 상태 레지스트리는 프로세스에서 하나만 만들어 모든 실행이 공유합니다.
pub struct App {
    pub config: AppConfig,
    pub pool: Option<PgPool>,
    pub cache: Arc<MarketDataCache>,
    pub repository: Arc<dyn RunRepository>,
    pub resolver: PipelineConfigResolver,
    pub health: Arc<ModelHealthRegistry>,
    orchestrator: Option<Arc<PipelineOrchestrator>>,
}

impl App {
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let pool = match &config.database.url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .acquire_timeout(Duration::from_secs(config.database.connection_timeout_secs))
                    .connect(url)
                    .await
                    .context("데이터베이스 연결 실패")?;
                sqlx::migrate!("../../migrations")
                    .run(&pool)
                    .await
                    .context("마이그레이션 실패")?;
                info!("데이터베이스 연결 성공");
                Some(pool)
            }
            None => {
                warn!("database.url 미설정, 메모리 저장소 사용");
                None
            }
        };

        let crypto: Arc<dyn DataAdapter> = Arc::new(BinanceAdapter::new(
            &config.cache.crypto_exchange_url,
            Duration::from_secs(config.cache.fetch_timeout_secs),
        )?);
        let equity: Arc<dyn DataAdapter> = Arc::new(YahooAdapter::new()?);
        let router = Arc::new(AdapterRouter::new(crypto, equity));

        let store: Arc<dyn CacheStore> = match &pool {
            Some(pool) => Arc::new(PgCacheStore::new(pool.clone())),
            None => Arc::new(InMemoryCacheStore::new()),
        };
        let cache = Arc::new(MarketDataCache::from_config(router, store, &config.cache));

        let repository: Arc<dyn RunRepository> = match &pool {
            Some(pool) => Arc::new(PgRunRepository::new(pool.clone())),
            None => Arc::new(InMemoryRunRepository::new()),
        };

        let mut resolver = PipelineConfigResolver::new();
        if let Some(pool) = &pool {
            resolver = resolver.with_source(Arc::new(PgAnalysisTypes::new(pool.clone())));
        }
        if let Some(path) = &config.pipeline.analysis_types_path {
            resolver = resolver.with_source(Arc::new(FileAnalysisTypes::load(path)?));
        }
        resolver = resolver.with_source(Arc::new(BuiltinAnalysisTypes::new()));

        let health = Arc::new(ModelHealthRegistry::new());

        let orchestrator = match OpenRouterClient::from_config(&config.llm) {
            Ok(client) => Some(Arc::new(
                PipelineOrchestrator::new(
                    cache.clone(),
                    Arc::new(client),
                    repository.clone(),
                    health.clone(),
                )
                .with_settings(&config.pipeline)
                .with_data_ttl(Duration::from_secs(config.cache.ttl_secs)),
            )),
            Err(e) => {
                warn!(error = %e, "LLM 클라이언트 미구성, 분석 실행 불가");
                None
            }
        };

        Ok(Self {
            config,
            pool,
            cache,
            repository,
            resolver,
            health,
            orchestrator,
        })
    }

    pub fn orchestrator(&self) -> anyhow::Result<&Arc<PipelineOrchestrator>> {
        self.orchestrator
            .as_ref()
            .ok_or_else(|| anyhow!("LLM API 키가 설정되지 않았습니다 (SIGNAL__LLM__API_KEY)"))
    }

    /// 실행을 생성하고 끝까지 진행합니다.
    pub async fn execute(
        &self,
        trigger: TriggerKind,
        instrument: &str,
        timeframe: Timeframe,
        analysis_type: Option<&str>,
        override_config: Option<PipelineConfig>,
    ) -> anyhow::Result<(AnalysisRun, RunTelemetry)> {
        let orchestrator = self.orchestrator()?;

        let analysis_type =
            analysis_type.or(Some(self.config.pipeline.default_analysis_type.as_str()));
        let resolved = self.resolver.resolve(analysis_type, override_config).await?;

        let mut run = AnalysisRun::new(trigger, instrument, timeframe, chrono::Utc::now());
        if let Some(name) = &resolved.analysis_type {
            run = run.with_analysis_type(name);
        }
        self.repository.create_run(&run).await?;

        let span = run_span!("pipeline", run.id, instrument, timeframe);
        let outcome = orchestrator
            .run_with_telemetry(run, &resolved.config)
            .instrument(span)
            .await?;
        Ok(outcome)
    }

    pub async fn shutdown(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}
