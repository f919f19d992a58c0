//! 시장 데이터 저장소 및 업스트림 접근.
//!
//! 이 crate는 다음을 제공합니다:
//! - PostgreSQL 저장소 (자산, 가격 바, 다운로드 진행 상태)
//! - 멱등 벌크 로더 (`(time, symbol)` 충돌 무시/덮어쓰기)
//! - 페이지 토큰 기반 시장 데이터 API 클라이언트
//! - 요청 속도 제한기 (공유 토큰 버킷)
//! - 테스트/드라이런용 인메모리 구현 (`simulated`)

pub mod error;
pub mod provider;
pub mod simulated;
pub mod storage;

pub use error::{DataError, Result};

pub use provider::{
    ApiKeyAuth, BarPage, BarPageSource, MarketDataClient, MarketDataConfig, PageRequest,
    RequestAuthenticator, RequestThrottle, ThrottleConfig,
};
pub use storage::{
    AssetDirectory, BarStore, ConflictPolicy, Database, DatabaseConfig, PgAssetRepository,
    PgBarStore, PgProgressStore, ProgressStore,
};
