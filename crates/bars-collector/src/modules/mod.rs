//! 수집 모듈.

pub mod acquire;
pub mod batch;
pub mod scratch;

pub use acquire::{normalize_span, AcquireOutcome, AcquireSettings, Acquirer};
pub use batch::run_all;
pub use scratch::ScratchArea;
