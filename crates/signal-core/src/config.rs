//! 설정 관리.
//!
//! 설정 파일(선택)과 `SIGNAL__` 접두사 환경 변수에서 애플리케이션 설정을 로드합니다.
//! 예: `SIGNAL__CACHE__TTL_SECS=600`, `SIGNAL__LLM__API_KEY=sk-...`

use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 시장 데이터 캐시 설정
    pub cache: CacheConfig,
    /// LLM 설정
    pub llm: LlmConfig,
    /// 파이프라인 설정
    pub pipeline: PipelineSettings,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 인메모리 저장소 사용)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 30,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 시장 데이터 캐시 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 캐시 TTL (초)
    pub ttl_secs: u64,
    /// 요청당 캔들 수
    pub fetch_limit: usize,
    /// 어댑터 호출 타임아웃 (초)
    pub fetch_timeout_secs: u64,
    /// 암호화폐 거래소 REST 기본 URL
    pub crypto_exchange_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            fetch_limit: 500,
            fetch_timeout_secs: 30,
            crypto_exchange_url: "https://api.binance.com".to_string(),
        }
    }
}

/// LLM 프로바이더 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI 호환 API 기본 URL
    pub base_url: String,
    /// API 키
    pub api_key: Option<SecretString>,
    /// 단계 설정에 모델이 없을 때 사용할 모델
    pub default_model: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 1,000 토큰당 예상 비용
    pub cost_per_1k_tokens: f64,
    /// 모델별 1,000 토큰당 비용
    pub model_costs: HashMap<String, f64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            default_model: "openai/gpt-4o-mini".to_string(),
            timeout_secs: 120,
            cost_per_1k_tokens: 0.01,
            model_costs: HashMap::new(),
        }
    }
}

/// 파이프라인 실행 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// 분석 유형 정의 TOML 파일 경로
    pub analysis_types_path: Option<String>,
    /// 단계별 타임아웃 (초)
    pub step_timeout_secs: u64,
    /// 기본 분석 유형
    pub default_analysis_type: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            analysis_types_path: None,
            step_timeout_secs: 180,
            default_analysis_type: "daystart".to_string(),
        }
    }
}

/// 예약 실행 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 실행 주기 (분)
    pub interval_minutes: u64,
    /// 대상 종목
    pub instruments: Vec<String>,
    /// 대상 타임프레임 코드
    pub timeframe: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            instruments: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
            timeframe: "H1".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("SIGNAL")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scheduler.instruments")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}
