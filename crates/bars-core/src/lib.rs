//! # Bars Core
//!
//! 시장 데이터 수집 파이프라인의 핵심 도메인 타입을 제공합니다.
//!
//! - 가격 데이터 카테고리 / 타임프레임 정의
//! - 업스트림 원시 바(`RawBar`)와 정규화된 가격 바(`PriceBar`)
//! - 자산(심볼) 정보
//! - 다운로드 진행 상태(체크포인트)
//! - 로깅 인프라

pub mod logging;
pub mod types;

pub use logging::*;
pub use types::*;
