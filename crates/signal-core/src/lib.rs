//! # Signal Core
//!
//! 시장 분석 파이프라인의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 정규화된 OHLCV 시장 데이터
//! - 분석 실행(run)과 단계(step) 기록
//! - 파이프라인 단계 설정
//! - 타임프레임 및 종목 유형 정의
//! - 설정 관리
//! - 로깅 인프라

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
