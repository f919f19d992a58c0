//! 수집 파이프라인 전반에서 사용되는 공통 타입.

mod asset;
mod bar;
mod category;
mod progress;
mod timeframe;

pub use asset::*;
pub use bar::*;
pub use category::*;
pub use progress::*;
pub use timeframe::*;
