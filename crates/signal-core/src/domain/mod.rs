//! 도메인 모델.

mod analysis;
mod market_data;
mod pipeline;

pub use analysis::*;
pub use market_data::*;
pub use pipeline::*;
