//! Market signal pipeline CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use signal_cli::{run_batch, App};
use signal_core::{init_logging, AppConfig, LogConfig, PipelineConfig, Timeframe, TriggerKind};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "signal")]
#[command(about = "LLM market analysis pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, default_value = "config/default.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 분석 1회 실행
    Run {
        /// 종목 (예: "BTC/USDT", "AAPL")
        #[arg(long)]
        instrument: String,

        /// 타임프레임 (M1, M5, M15, M30, H1, H4, D1)
        #[arg(long, default_value = "H1")]
        timeframe: Timeframe,

        /// 분석 유형 이름 (기본: pipeline.default_analysis_type)
        #[arg(long)]
        analysis_type: Option<String>,

        /// 파이프라인 설정 JSON 파일 (분석 유형보다 우선)
        #[arg(long)]
        config_file: Option<String>,
    },

    /// 시장 데이터 조회 (캐시 경유)
    Fetch {
        #[arg(long)]
        instrument: String,

        #[arg(long, default_value = "H1")]
        timeframe: Timeframe,

        /// 요청 TTL (초)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// 분석 유형 목록
    Types,

    /// 데몬 모드: 주기적으로 설정된 종목 분석
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config).context("설정 로드 실패")?;
    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Signal pipeline 시작");
    let app = App::build(config).await?;

    match cli.command {
        Commands::Run {
            instrument,
            timeframe,
            analysis_type,
            config_file,
        } => {
            let override_config = match config_file {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("{} 읽기 실패", path))?;
                    Some(
                        serde_json::from_str::<PipelineConfig>(&content)
                            .with_context(|| format!("{} 파싱 실패", path))?,
                    )
                }
                None => None,
            };

            let (run, telemetry) = app
                .execute(
                    TriggerKind::Manual,
                    &instrument,
                    timeframe,
                    analysis_type.as_deref(),
                    override_config,
                )
                .await?;

            let steps = app.repository.list_steps(run.id).await?;
            let report = serde_json::json!({
                "run": run,
                "telemetry": telemetry,
                "steps": steps,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Fetch {
            instrument,
            timeframe,
            ttl_secs,
        } => {
            let ttl = ttl_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| app.cache.default_ttl());
            let data = app.cache.get_or_fetch(&instrument, timeframe, ttl).await?;

            let report = serde_json::json!({
                "instrument": data.instrument(),
                "timeframe": data.timeframe(),
                "source": data.source(),
                "fetched_at": data.fetched_at(),
                "candles": data.len(),
                "last_close": data.last_close(),
                "price_range": data.price_range(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            app.cache.stats().log_summary();
        }
        Commands::Types => {
            for analysis_type in app.resolver.list().await {
                println!(
                    "{:<16} {:<24} v{:<8} steps={} active={}",
                    analysis_type.name,
                    analysis_type.display_name,
                    analysis_type.version,
                    analysis_type.config.steps.len(),
                    analysis_type.is_active
                );
            }
        }
        Commands::Daemon => {
            app.orchestrator()?;
            let timeframe: Timeframe = app
                .config
                .scheduler
                .timeframe
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let instruments = app.config.scheduler.instruments.clone();
            let interval_minutes = app.config.scheduler.interval_minutes.max(1);

            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분, 종목 {}개) ===",
                interval_minutes,
                instruments.len()
            );

            let app = Arc::new(app);
            let mut interval = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        let stats = run_batch(app.clone(), &instruments, timeframe).await;
                        stats.log_summary();
                        app.cache.stats().log_summary();

                        let failing = app.health.failing_models();
                        if !failing.is_empty() {
                            tracing::warn!(models = ?failing, "실패 표시된 모델 있음");
                        }
                        tracing::info!("=== 다음 실행: {}분 후 ===", interval_minutes);
                    }
                }
            }

            if let Ok(app) = Arc::try_unwrap(app) {
                app.shutdown().await;
            }
            tracing::info!("Signal pipeline 종료");
            return Ok(());
        }
    }

    app.shutdown().await;
    tracing::info!("Signal pipeline 종료");

    Ok(())
}
