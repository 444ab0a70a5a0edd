//! 시장 분석 파이프라인 실행기.
//!
//! 이 crate는 `signal` 바이너리가 사용하는 구성 요소를 제공합니다:
//! - 설정 기반 구성 요소 조립 (DB 유무에 따라 PostgreSQL/메모리 저장소)
//! - 수동 실행
//! - 주기적 예약 실행 (종목별 동시 실행)

pub mod app;
pub mod scheduler;

pub use app::App;
pub use scheduler::{run_batch, BatchStats};
