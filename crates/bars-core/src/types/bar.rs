//! 가격 바 데이터 구조체.
//!
//! - [`RawBar`]: 업스트림 응답 그대로의 바 (`t`, `o`, `h`, `l`, `c`, `v`)
//! - [`PriceBar`]: 정규화된 바 (UTC 시각 + 심볼), 저장소의 한 행

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 원시 바 정규화 에러.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    /// RFC3339 타임스탬프 파싱 실패
    #[error("잘못된 타임스탬프 '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// 음수 거래량
    #[error("음수 거래량 {volume} (t={time})")]
    NegativeVolume { time: String, volume: i64 },
}

/// 업스트림 API가 반환하는 원시 바.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    /// RFC3339 타임스탬프 (예: "2021-06-01T13:30:00Z")
    pub t: String,
    /// 시가
    pub o: f64,
    /// 고가
    pub h: f64,
    /// 저가
    pub l: f64,
    /// 종가
    pub c: f64,
    /// 거래량
    pub v: i64,
    /// 체결 건수 (제공자에 따라 존재)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<i64>,
    /// 거래량 가중 평균가 (제공자에 따라 존재)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vw: Option<f64>,
}

impl RawBar {
    /// 심볼을 붙여 [`PriceBar`]로 정규화합니다.
    pub fn normalize(&self, symbol: &str) -> Result<PriceBar, NormalizeError> {
        let time = DateTime::parse_from_rfc3339(&self.t)
            .map_err(|e| NormalizeError::InvalidTimestamp {
                value: self.t.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        if self.v < 0 {
            return Err(NormalizeError::NegativeVolume {
                time: self.t.clone(),
                volume: self.v,
            });
        }

        Ok(PriceBar {
            time,
            symbol: symbol.to_string(),
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            volume: self.v,
        })
    }
}

/// 정규화된 OHLCV 바.
///
/// 자연키는 `(time, symbol)`이며 저장소에서 유일해야 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// 바 시작 시각 (UTC)
    pub time: DateTime<Utc>,
    /// 티커
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// 거래량 (0 이상)
    pub volume: i64,
}

impl PriceBar {
    /// 자연키 `(time, symbol)`.
    pub fn key(&self) -> (DateTime<Utc>, &str) {
        (self.time, self.symbol.as_str())
    }
}

/// 바를 시간 오름차순으로 정렬하고 같은 키의 중복은 마지막 값만 남깁니다.
pub fn sort_and_dedup(bars: &mut Vec<PriceBar>) {
    // stable sort: 같은 키 안에서 원래 순서 유지
    bars.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.symbol.cmp(&b.symbol)));

    let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars.drain(..) {
        match deduped.last_mut() {
            Some(last) if last.key() == bar.key() => *last = bar,
            _ => deduped.push(bar),
        }
    }
    *bars = deduped;
}
