//! 바 집계 단위(타임프레임) 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 바 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeFrame {
    /// 1분봉
    #[serde(rename = "1Min")]
    Min,
    /// 1시간봉
    #[serde(rename = "1Hour")]
    Hour,
    /// 일봉
    #[serde(rename = "1Day")]
    Day,
}

impl TimeFrame {
    /// 전체 타임프레임.
    pub const ALL: [TimeFrame; 3] = [TimeFrame::Min, TimeFrame::Hour, TimeFrame::Day];

    /// API 쿼리 파라미터 / DB 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::Min => "1Min",
            TimeFrame::Hour => "1Hour",
            TimeFrame::Day => "1Day",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1min" | "min" | "1m" => Ok(TimeFrame::Min),
            "1hour" | "hour" | "1h" => Ok(TimeFrame::Hour),
            "1day" | "day" | "1d" => Ok(TimeFrame::Day),
            _ => Err(format!("Invalid timeframe: {}", s)),
        }
    }
}
