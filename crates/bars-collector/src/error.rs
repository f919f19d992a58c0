//! 에러 타입 정의.

use bars_core::{Category, NormalizeError};
use bars_data::DataError;
use thiserror::Error;

/// 한 구간 다운로드가 중단된 원인.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 업스트림 요청 실패
    #[error(transparent)]
    Fetch(#[from] DataError),

    /// 원시 바 정규화 실패
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// 페이지 수 상한 초과
    #[error("page limit exceeded ({0} pages)")]
    PageLimit(usize),

    /// 종료 신호로 중단
    #[error("cancelled")]
    Cancelled,

    /// 스크래치 파일 쓰기 실패
    #[error("scratch output error: {0}")]
    Scratch(#[from] std::io::Error),
}

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 업스트림 요청 한도 초과
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// 구간 다운로드 실패 (스크래치 정리 완료, 체크포인트 그대로)
    #[error("Download failed for {symbol}: {source}")]
    DownloadFailed {
        symbol: String,
        #[source]
        source: DownloadError,
    },

    /// 활성 자산 목록에 없는 심볼
    #[error("Symbol not found in active assets: {0}")]
    SymbolNotFound(String),

    /// 저장 또는 체크포인트 갱신 실패 (부분 커밋 없음)
    #[error("Persistence failed for {symbol}: {source}")]
    PersistenceFailed {
        symbol: String,
        #[source]
        source: DataError,
    },

    /// 정규화할 수 없는 카테고리
    #[error("Unsupported category: {0}")]
    UnsupportedCategory(Category),

    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(DataError),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CollectorError {
    /// 업스트림 429가 원인인지 확인.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_) => true,
            Self::DownloadFailed {
                source: DownloadError::Fetch(e),
                ..
            } => e.is_rate_limited(),
            _ => false,
        }
    }

    /// 종료 신호로 중단되었는지 확인.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::DownloadFailed {
                source: DownloadError::Cancelled,
                ..
            }
        )
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::RateLimitExceeded(msg) => Self::RateLimitExceeded(msg),
            other => Self::Database(other),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
