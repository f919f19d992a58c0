//! 페이지 원본 스크래치 출력.
//!
//! 구간마다 `<root>/<category>/<timeframe>/<symbol>/<start>_<end>/` 디렉토리에
//! 페이지 응답을 `page_NNNNN.json`으로 기록합니다. 진행 상황 확인용이며
//! 영구 저장소가 아닙니다.

use bars_core::{Category, TimeFrame};
use bars_data::BarPage;
use chrono::NaiveDate;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 스크래치 디렉토리 루트.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 심볼 + 구간 전용 디렉토리 경로.
    pub fn span_dir(
        &self,
        category: Category,
        timeframe: TimeFrame,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PathBuf {
        self.root
            .join(category.as_str())
            .join(timeframe.as_str())
            .join(symbol)
            .join(format!("{}_{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")))
    }

    /// 이전 실행이 남긴 출력을 지우고 빈 디렉토리를 만듭니다.
    pub async fn prepare(&self, dir: &Path) -> io::Result<()> {
        remove_if_exists(dir).await?;
        tokio::fs::create_dir_all(dir).await
    }

    /// 페이지 하나를 기록합니다. `index`는 1부터.
    pub async fn write_page(&self, dir: &Path, index: usize, page: &BarPage) -> io::Result<PathBuf> {
        let path = dir.join(format!("page_{:05}.json", index));
        let body = serde_json::to_vec(page)?;
        tokio::fs::write(&path, body).await?;
        debug!(path = %path.display(), "Scratch page written");
        Ok(path)
    }

    /// 구간 출력을 모두 삭제합니다. 실패는 경고만 남깁니다.
    pub async fn discard(&self, dir: &Path) {
        match remove_if_exists(dir).await {
            Ok(()) => debug!(path = %dir.display(), "Scratch output discarded"),
            Err(e) => warn!(path = %dir.display(), error = %e, "Failed to discard scratch output"),
        }
    }
}

async fn remove_if_exists(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
