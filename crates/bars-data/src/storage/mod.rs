//! PostgreSQL 저장소.
//!
//! - `database`: 연결 풀 / 마이그레이션
//! - `assets`: 자산 목록 (읽기 전용)
//! - `bars`: 가격 바 멱등 벌크 로더
//! - `progress`: 다운로드 진행 상태

pub mod assets;
pub mod bars;
pub mod database;
pub mod progress;

pub use assets::{AssetDirectory, PgAssetRepository};
pub use bars::{BarStore, ConflictPolicy, PgBarStore, DEFAULT_CHUNK_SIZE};
pub use database::{Database, DatabaseConfig};
pub use progress::{PgProgressStore, ProgressStore};
