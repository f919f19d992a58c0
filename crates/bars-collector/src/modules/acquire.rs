//! 심볼 단위 구간 수집.
//!
//! 심볼 하나에 대해 다음 상태를 거칩니다.
//!
//! ```text
//! NeedsDownload ─┬─> Skipped            (checkpoint >= target_end)
//!                └─> Fetching ─┬─> Persisting ─> Advanced
//!                              └─> Failed        (스크래치 삭제, 체크포인트 그대로)
//! ```
//!
//! 구간의 모든 페이지를 메모리에 모은 뒤 한 번에 저장하고,
//! 저장이 끝난 다음에만 체크포인트를 `target_end`로 옮깁니다.
//! 중간에 실패하거나 종료 신호를 받으면 아무것도 저장하지 않습니다.

use crate::error::{CollectorError, DownloadError, Result};
use crate::modules::scratch::ScratchArea;
use bars_core::{
    is_up_to_date, next_start_date, sort_and_dedup, Asset, Category, NormalizeError, PriceBar,
    RawBar, TimeFrame,
};
use bars_data::{AssetDirectory, BarPage, BarPageSource, BarStore, PageRequest, ProgressStore};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 구간 수집 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireSettings {
    pub category: Category,
    pub timeframe: TimeFrame,
    /// 체크포인트가 없을 때 시작일
    pub floor_date: NaiveDate,
    /// 이번 실행의 목표 종료일
    pub target_end: NaiveDate,
    /// 심볼당 최대 페이지 수 (`None`이면 무제한)
    pub max_pages: Option<usize>,
    /// 성공 후에도 스크래치 출력을 남길지 여부
    pub keep_scratch: bool,
}

impl AcquireSettings {
    pub fn new(
        category: Category,
        timeframe: TimeFrame,
        floor_date: NaiveDate,
        target_end: NaiveDate,
    ) -> Self {
        Self {
            category,
            timeframe,
            floor_date,
            target_end,
            max_pages: None,
            keep_scratch: false,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }
}

/// 수집 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// 이미 최신이거나 받을 구간이 없음
    Skipped { checkpoint: Option<NaiveDate> },
    /// 구간 저장 후 체크포인트 갱신
    Advanced {
        start: NaiveDate,
        until: NaiveDate,
        pages: usize,
        bars: usize,
        written: u64,
    },
}

impl AcquireOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, AcquireOutcome::Skipped { .. })
    }
}

/// 메모리에 모은 구간 원본.
#[derive(Debug, Default)]
struct FetchedSpan {
    pages: usize,
    bars: Vec<RawBar>,
}

/// 구간 수집기.
#[derive(Clone)]
pub struct Acquirer {
    source: Arc<dyn BarPageSource>,
    progress: Arc<dyn ProgressStore>,
    store: Arc<dyn BarStore>,
    assets: Arc<dyn AssetDirectory>,
    scratch: ScratchArea,
    settings: AcquireSettings,
}

impl Acquirer {
    pub fn new(
        source: Arc<dyn BarPageSource>,
        progress: Arc<dyn ProgressStore>,
        store: Arc<dyn BarStore>,
        assets: Arc<dyn AssetDirectory>,
        scratch: ScratchArea,
        settings: AcquireSettings,
    ) -> Self {
        Self {
            source,
            progress,
            store,
            assets,
            scratch,
            settings,
        }
    }

    pub fn settings(&self) -> &AcquireSettings {
        &self.settings
    }

    pub fn progress(&self) -> &Arc<dyn ProgressStore> {
        &self.progress
    }

    /// 같은 협력자로 다른 카테고리/타임프레임을 수집하는 수집기.
    pub fn for_pair(&self, category: Category, timeframe: TimeFrame) -> Self {
        let mut acquirer = self.clone();
        acquirer.settings.category = category;
        acquirer.settings.timeframe = timeframe;
        acquirer
    }

    /// 활성 자산 목록에서 심볼을 찾습니다.
    pub async fn resolve(&self, symbol: &str) -> Result<Asset> {
        self.assets
            .find_active(symbol)
            .await?
            .ok_or_else(|| CollectorError::SymbolNotFound(symbol.to_string()))
    }

    /// 심볼 하나를 목표 종료일까지 수집합니다.
    pub async fn acquire(&self, symbol: &str) -> Result<AcquireOutcome> {
        let asset = self.resolve(symbol).await?;
        self.acquire_asset(&asset, &CancellationToken::new()).await
    }

    /// 수집 후 심볼의 전체 바를 시간 순으로 반환합니다.
    pub async fn load_bars(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        self.acquire(symbol).await?;
        Ok(self.store.select_bars(symbol).await?)
    }

    #[instrument(
        skip(self, asset, cancel),
        fields(symbol = %asset.symbol, category = %self.settings.category, timeframe = %self.settings.timeframe)
    )]
    pub async fn acquire_asset(
        &self,
        asset: &Asset,
        cancel: &CancellationToken,
    ) -> Result<AcquireOutcome> {
        let settings = &self.settings;
        if !settings.category.is_bar() {
            return Err(CollectorError::UnsupportedCategory(settings.category));
        }

        let checkpoint = self
            .progress
            .checkpoint(settings.category, settings.timeframe, asset)
            .await?;

        if is_up_to_date(checkpoint, settings.target_end) {
            info!(checkpoint = ?checkpoint, "Already up to date, skipping");
            return Ok(AcquireOutcome::Skipped { checkpoint });
        }

        let start = next_start_date(checkpoint, settings.floor_date);
        let until = settings.target_end;
        if start > until {
            debug!(start = %start, until = %until, "Floor date is after target end, nothing to fetch");
            return Ok(AcquireOutcome::Skipped { checkpoint });
        }

        let span = self.scratch.span_dir(
            settings.category,
            settings.timeframe,
            &asset.symbol,
            start,
            until,
        );

        // Fetching
        let fetched = match self.fetch_span(asset, start, until, &span, cancel).await {
            Ok(fetched) => fetched,
            Err(e) => return Err(self.abort_download(asset, &span, e).await),
        };

        let rows = match normalize_span(&asset.symbol, &fetched.bars) {
            Ok(rows) => rows,
            Err(e) => return Err(self.abort_download(asset, &span, e.into()).await),
        };

        // Persisting
        let written = match self.store.insert(&rows).await {
            Ok(written) => written,
            Err(e) => return Err(self.abort_persist(asset, &span, e).await),
        };

        if let Err(e) = self
            .progress
            .advance(settings.category, settings.timeframe, asset, until, None)
            .await
        {
            return Err(self.abort_persist(asset, &span, e).await);
        }

        // Advanced
        if !settings.keep_scratch {
            self.scratch.discard(&span).await;
        }

        info!(
            start = %start,
            until = %until,
            pages = fetched.pages,
            bars = rows.len(),
            written,
            "Span stored, checkpoint advanced"
        );

        Ok(AcquireOutcome::Advanced {
            start,
            until,
            pages: fetched.pages,
            bars: rows.len(),
            written,
        })
    }

    async fn fetch_span(
        &self,
        asset: &Asset,
        start: NaiveDate,
        end: NaiveDate,
        span: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedSpan, DownloadError> {
        self.scratch.prepare(span).await?;

        let mut fetched = FetchedSpan::default();
        let mut page_token: Option<String> = None;

        loop {
            if let Some(max_pages) = self.settings.max_pages {
                if fetched.pages >= max_pages {
                    return Err(DownloadError::PageLimit(max_pages));
                }
            }

            let request = PageRequest::new(
                &asset.symbol,
                self.settings.category,
                self.settings.timeframe,
                start,
                end,
            )
            .with_page_token(page_token.as_deref());

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                page = self.source.fetch_page(&request) => page?,
            };

            fetched.pages += 1;
            self.scratch.write_page(span, fetched.pages, &page).await?;

            let BarPage {
                bars,
                next_page_token,
            } = page;
            debug!(page = fetched.pages, bars = bars.len(), "Page fetched");
            fetched.bars.extend(bars);

            match next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(fetched)
    }

    async fn abort_download(&self, asset: &Asset, span: &Path, source: DownloadError) -> CollectorError {
        self.scratch.discard(span).await;
        warn!(symbol = %asset.symbol, error = %source, "Download aborted, span discarded");
        CollectorError::DownloadFailed {
            symbol: asset.symbol.clone(),
            source,
        }
    }

    async fn abort_persist(
        &self,
        asset: &Asset,
        span: &Path,
        source: bars_data::DataError,
    ) -> CollectorError {
        self.scratch.discard(span).await;
        warn!(symbol = %asset.symbol, error = %source, "Persistence failed, checkpoint unchanged");
        CollectorError::PersistenceFailed {
            symbol: asset.symbol.clone(),
            source,
        }
    }
}

/// 원시 바를 정규화하고 시간 오름차순으로 정렬합니다.
///
/// 같은 시각이 여러 번 나오면 마지막 값이 남습니다.
pub fn normalize_span(symbol: &str, raw: &[RawBar]) -> std::result::Result<Vec<PriceBar>, NormalizeError> {
    let mut rows = raw
        .iter()
        .map(|bar| bar.normalize(symbol))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    sort_and_dedup(&mut rows);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(t: &str, c: f64) -> RawBar {
        RawBar {
            t: t.to_string(),
            o: c,
            h: c,
            l: c,
            c,
            v: 1,
            n: None,
            vw: None,
        }
    }

    #[test]
    fn test_normalize_span_sorts_ascending() {
        let rows = normalize_span(
            "AAPL",
            &[
                raw("2021-06-01T13:32:00Z", 3.0),
                raw("2021-06-01T13:30:00Z", 1.0),
                raw("2021-06-01T13:31:00Z", 2.0),
            ],
        )
        .unwrap();

        let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
        assert!(rows.iter().all(|r| r.symbol == "AAPL"));
    }

    #[test]
    fn test_normalize_span_keeps_last_duplicate() {
        let rows = normalize_span(
            "AAPL",
            &[raw("2021-06-01T13:30:00Z", 1.0), raw("2021-06-01T13:30:00Z", 1.5)],
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 1.5);
    }

    #[test]
    fn test_normalize_span_rejects_bad_timestamp() {
        assert!(normalize_span("AAPL", &[raw("yesterday", 1.0)]).is_err());
    }

    #[test]
    fn test_settings_builder() {
        let day = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let settings = AcquireSettings::new(Category::Bar, TimeFrame::Min, day, day)
            .with_max_pages(Some(3))
            .with_keep_scratch(true);
        assert_eq!(settings.max_pages, Some(3));
        assert!(settings.keep_scratch);
    }
}
