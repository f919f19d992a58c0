//! 데이터베이스/네트워크 없이 동작하는 인메모리 구현.
//!
//! 수집기 테스트와 드라이런에서 Postgres 저장소와 HTTP 클라이언트 대신 사용합니다.
//! 저장소 구현은 실제 구현과 같은 계약(전부 커밋 또는 전부 롤백, 중복 무시)을 따르고,
//! 장애 주입 훅을 제공합니다.
//!
//! # 예제
//!
//! ```ignore
//! use bars_data::simulated::{MemoryBarStore, MemoryProgressStore, ScriptedPageSource};
//!
//! let source = ScriptedPageSource::new();
//! source.script_pages("AAPL", vec![page_one, page_two]).await;
//!
//! let bars = MemoryBarStore::new().with_chunk_size(2);
//! bars.fail_on_chunk(2).await;
//! ```

mod source;
mod stores;

pub use source::{RecordedRequest, ScriptedPageSource};
pub use stores::{MemoryAssetDirectory, MemoryBarStore, MemoryProgressStore};
