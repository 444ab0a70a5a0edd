//! 기본 타입 정의.

mod instrument;
mod timeframe;

pub use instrument::*;
pub use timeframe::*;
