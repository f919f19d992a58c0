//! 수집기 통합 테스트 공용 하네스.

#![allow(dead_code)]

use bars_collector::{AcquireSettings, Acquirer, ScratchArea};
use bars_core::{Asset, Category, RawBar, TimeFrame};
use bars_data::simulated::{
    MemoryAssetDirectory, MemoryBarStore, MemoryProgressStore, ScriptedPageSource,
};
use bars_data::{AssetDirectory, BarPageSource, BarStore, ProgressStore};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn floor() -> NaiveDate {
    date(2021, 1, 1)
}

pub fn target_end() -> NaiveDate {
    date(2021, 6, 30)
}

/// `2021-06-01T13:{minute}:00Z` 분봉.
pub fn raw(minute: u32, close: f64) -> RawBar {
    RawBar {
        t: format!("2021-06-01T13:{:02}:00Z", minute),
        o: close,
        h: close + 0.5,
        l: close - 0.5,
        c: close,
        v: 100 + minute as i64,
        n: None,
        vw: None,
    }
}

/// `pages`개 페이지, 페이지당 `per_page`개 바 (분이 겹치지 않음).
pub fn pages(pages: usize, per_page: usize) -> Vec<Vec<RawBar>> {
    (0..pages)
        .map(|p| {
            (0..per_page)
                .map(|i| raw((p * per_page + i) as u32, 100.0 + i as f64))
                .collect()
        })
        .collect()
}

pub struct Harness {
    pub assets: Vec<Asset>,
    pub source: Arc<ScriptedPageSource>,
    pub progress: Arc<MemoryProgressStore>,
    pub store: Arc<MemoryBarStore>,
    pub scratch: TempDir,
    pub acquirer: Acquirer,
}

impl Harness {
    pub fn new(symbols: &[&str]) -> Self {
        Self::build(symbols, ScriptedPageSource::new(), MemoryBarStore::new(), |s| s)
    }

    pub fn build(
        symbols: &[&str],
        source: ScriptedPageSource,
        store: MemoryBarStore,
        configure: impl FnOnce(AcquireSettings) -> AcquireSettings,
    ) -> Self {
        let assets: Vec<Asset> = symbols
            .iter()
            .map(|s| Asset::active(Uuid::new_v4(), *s))
            .collect();

        let source = Arc::new(source);
        let progress = Arc::new(MemoryProgressStore::new(assets.clone()));
        let store = Arc::new(store);
        let directory: Arc<dyn AssetDirectory> = Arc::new(MemoryAssetDirectory::new(assets.clone()));
        let scratch = tempfile::tempdir().unwrap();

        let settings = configure(AcquireSettings::new(
            Category::Bar,
            TimeFrame::Min,
            floor(),
            target_end(),
        ));

        let acquirer = Acquirer::new(
            Arc::clone(&source) as Arc<dyn BarPageSource>,
            Arc::clone(&progress) as Arc<dyn ProgressStore>,
            Arc::clone(&store) as Arc<dyn BarStore>,
            directory,
            ScratchArea::new(scratch.path()),
            settings,
        );

        Self {
            assets,
            source,
            progress,
            store,
            scratch,
            acquirer,
        }
    }

    pub fn asset(&self, symbol: &str) -> &Asset {
        self.assets
            .iter()
            .find(|a| a.symbol == symbol)
            .expect("unknown symbol in harness")
    }

    pub async fn checkpoint(&self, symbol: &str) -> Option<NaiveDate> {
        self.progress
            .checkpoint(Category::Bar, TimeFrame::Min, self.asset(symbol))
            .await
            .unwrap()
    }

    /// 스크래치 루트 아래의 파일 수.
    pub fn scratch_files(&self) -> usize {
        count_files(self.scratch.path())
    }
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}
