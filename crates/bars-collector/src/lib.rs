//! 재개 가능한 시장 바 수집기.
//!
//! 이 crate는 다음을 제공합니다:
//! - 심볼 단위 구간 수집 (페이지 루프 → 정규화 → 저장 → 체크포인트 갱신)
//! - 미완료 심볼 일괄 수집 (`run_all`)
//! - 환경변수 설정과 CLI 바이너리

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, DownloadError, Result};
pub use modules::{run_all, AcquireOutcome, AcquireSettings, Acquirer, ScratchArea};
pub use stats::CollectionStats;
