//! 다운로드 진행 상태(체크포인트).
//!
//! `(asset_id, category, time_frame)` 조합마다 하나의 레코드가 존재하며,
//! `downloaded_until`은 그 날짜까지의 모든 바가 저장소에 영구 저장되었음을 뜻합니다.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, TimeFrame};

/// 진행 상태 레코드 키.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgressKey {
    pub asset_id: Uuid,
    pub category: Category,
    pub timeframe: TimeFrame,
}

impl ProgressKey {
    pub fn new(asset_id: Uuid, category: Category, timeframe: TimeFrame) -> Self {
        Self {
            asset_id,
            category,
            timeframe,
        }
    }
}

/// 다운로드 진행 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub key: ProgressKey,
    /// 영구 저장이 완료된 마지막 날짜 (`None`: 한 번도 받지 않음)
    pub downloaded_until: Option<NaiveDate>,
    /// 마지막 진단 메시지 (에러 등)
    pub message: Option<String>,
}

impl DownloadProgress {
    /// 초기 상태 (체크포인트 없음).
    pub fn empty(key: ProgressKey) -> Self {
        Self {
            key,
            downloaded_until: None,
            message: None,
        }
    }

    /// `as_of` 기준으로 아직 받아야 할 데이터가 있는지 확인합니다.
    pub fn is_pending(&self, as_of: NaiveDate) -> bool {
        self.downloaded_until.map_or(true, |until| until < as_of)
    }
}

/// 다음 수집 시작일 계산.
///
/// 체크포인트가 있으면 그 다음 날, 없으면 `floor`(과거 하한일).
pub fn next_start_date(checkpoint: Option<NaiveDate>, floor: NaiveDate) -> NaiveDate {
    match checkpoint {
        Some(until) => until + Duration::days(1),
        None => floor,
    }
}

/// 체크포인트가 목표 종료일 이상이면 수집할 구간이 없습니다.
pub fn is_up_to_date(checkpoint: Option<NaiveDate>, target_end: NaiveDate) -> bool {
    checkpoint.is_some_and(|until| until >= target_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_start_date_after_checkpoint() {
        let floor = date(2016, 1, 1);
        assert_eq!(next_start_date(Some(date(2021, 6, 1)), floor), date(2021, 6, 2));
        assert_eq!(next_start_date(Some(date(2021, 12, 31)), floor), date(2022, 1, 1));
    }

    #[test]
    fn test_next_start_date_without_checkpoint() {
        assert_eq!(next_start_date(None, date(2016, 1, 1)), date(2016, 1, 1));
    }

    #[test]
    fn test_is_up_to_date() {
        let target = date(2021, 6, 5);
        assert!(!is_up_to_date(None, target));
        assert!(!is_up_to_date(Some(date(2021, 6, 4)), target));
        assert!(is_up_to_date(Some(target), target));
        assert!(is_up_to_date(Some(date(2021, 6, 6)), target));
    }

    #[test]
    fn test_is_pending() {
        let key = ProgressKey::new(Uuid::new_v4(), Category::Bar, TimeFrame::Min);
        let mut progress = DownloadProgress::empty(key);
        assert!(progress.is_pending(date(2021, 6, 5)));

        progress.downloaded_until = Some(date(2021, 6, 4));
        assert!(progress.is_pending(date(2021, 6, 5)));

        progress.downloaded_until = Some(date(2021, 6, 5));
        assert!(!progress.is_pending(date(2021, 6, 5)));
    }
}
