//! 가격 데이터 카테고리 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 업스트림에 요청하는 가격 데이터 종류.
///
/// 문자열 표현(`bars`, `quotes`, `trades`)은 API 경로, 응답 키,
/// `download_progress.category` 컬럼에 그대로 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// OHLCV 바
    #[serde(rename = "bars")]
    Bar,
    /// 호가
    #[serde(rename = "quotes")]
    Quote,
    /// 체결
    #[serde(rename = "trades")]
    Trade,
}

impl Category {
    /// 전체 카테고리 (진행 상태 초기화 순서).
    pub const ALL: [Category; 3] = [Category::Bar, Category::Quote, Category::Trade];

    /// API/DB 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bar => "bars",
            Category::Quote => "quotes",
            Category::Trade => "trades",
        }
    }

    /// `PriceBar`로 정규화할 수 있는 카테고리인지 확인합니다.
    pub fn is_bar(&self) -> bool {
        matches!(self, Category::Bar)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bars" | "bar" => Ok(Category::Bar),
            "quotes" | "quote" => Ok(Category::Quote),
            "trades" | "trade" => Ok(Category::Trade),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}
