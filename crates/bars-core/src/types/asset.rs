//! 자산(심볼) 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 활성 자산 상태값.
pub const ASSET_STATUS_ACTIVE: &str = "active";

/// 업스트림 제공자가 부여한 자산 정보.
///
/// `id`는 제공자가 부여한 불변 식별자이고, `symbol`은 티커 문자열입니다.
/// 이 파이프라인에서는 읽기 전용입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// 자산 ID
    pub id: Uuid,
    /// 티커 (예: "AAPL")
    pub symbol: String,
    /// 상태 ("active" / "inactive")
    pub status: String,
}

impl Asset {
    /// 새 자산 정보 생성.
    pub fn new(id: Uuid, symbol: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            status: status.into(),
        }
    }

    /// 활성 자산 생성.
    pub fn active(id: Uuid, symbol: impl Into<String>) -> Self {
        Self::new(id, symbol, ASSET_STATUS_ACTIVE)
    }

    /// 활성 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        self.status == ASSET_STATUS_ACTIVE
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.id)
    }
}
