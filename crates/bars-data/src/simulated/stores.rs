//! 인메모리 자산/진행 상태/가격 바 저장소.

use crate::error::{DataError, Result};
use crate::storage::bars::unique_rows;
use crate::storage::{AssetDirectory, BarStore, ConflictPolicy, ProgressStore, DEFAULT_CHUNK_SIZE};
use async_trait::async_trait;
use bars_core::{Asset, Category, DownloadProgress, PriceBar, ProgressKey, TimeFrame};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// 고정 자산 목록.
#[derive(Debug, Default)]
pub struct MemoryAssetDirectory {
    assets: Vec<Asset>,
}

impl MemoryAssetDirectory {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self { assets }
    }
}

#[async_trait]
impl AssetDirectory for MemoryAssetDirectory {
    async fn active_assets(&self) -> Result<Vec<Asset>> {
        let mut active: Vec<Asset> = self.assets.iter().filter(|a| a.is_active()).cloned().collect();
        active.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(active)
    }

    async fn find_active(&self, symbol: &str) -> Result<Option<Asset>> {
        Ok(self
            .assets
            .iter()
            .find(|a| a.symbol == symbol && a.is_active())
            .cloned())
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    records: HashMap<ProgressKey, DownloadProgress>,
    /// 남은 `advance` 실패 주입 횟수
    failing_advances: usize,
    /// `advance` 성공 기록 (심볼, 날짜)
    advances: Vec<(String, NaiveDate)>,
}

/// 인메모리 진행 상태 저장소.
///
/// `symbols_pending`은 생성 시 받은 자산 목록을 기준으로 합니다
/// (레코드가 없는 자산은 "받은 적 없음").
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    assets: Vec<Asset>,
    state: RwLock<ProgressState>,
}

impl MemoryProgressStore {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            state: RwLock::new(ProgressState::default()),
        }
    }

    /// 다음 `count`번의 `advance` 호출을 실패시킵니다.
    pub async fn fail_next_advances(&self, count: usize) {
        self.state.write().await.failing_advances = count;
    }

    /// 체크포인트를 직접 설정합니다.
    pub async fn set_checkpoint(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
        until: Option<NaiveDate>,
    ) {
        let key = ProgressKey::new(asset.id, category, timeframe);
        let mut state = self.state.write().await;
        state
            .records
            .entry(key)
            .or_insert_with(|| DownloadProgress::empty(key))
            .downloaded_until = until;
    }

    /// 레코드 하나 조회.
    pub async fn get(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
    ) -> Option<DownloadProgress> {
        let key = ProgressKey::new(asset.id, category, timeframe);
        self.state.read().await.records.get(&key).cloned()
    }

    /// 성공한 `advance` 호출 기록.
    pub async fn advances(&self) -> Vec<(String, NaiveDate)> {
        self.state.read().await.advances.clone()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn initialize(&self, assets: &[Asset]) -> Result<u64> {
        let mut state = self.state.write().await;
        if !state.records.is_empty() {
            return Ok(0);
        }

        let mut created = 0u64;
        for asset in assets {
            for category in Category::ALL {
                for timeframe in TimeFrame::ALL {
                    let key = ProgressKey::new(asset.id, category, timeframe);
                    if state.records.insert(key, DownloadProgress::empty(key)).is_none() {
                        created += 1;
                    }
                }
            }
        }
        Ok(created)
    }

    async fn symbols_pending(
        &self,
        category: Category,
        timeframe: TimeFrame,
        as_of: NaiveDate,
    ) -> Result<Vec<Asset>> {
        let state = self.state.read().await;
        let mut pending: Vec<Asset> = self
            .assets
            .iter()
            .filter(|a| a.is_active())
            .filter(|a| {
                let key = ProgressKey::new(a.id, category, timeframe);
                state
                    .records
                    .get(&key)
                    .map_or(true, |p| p.is_pending(as_of))
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        pending.dedup_by(|a, b| a.id == b.id);
        Ok(pending)
    }

    async fn checkpoint(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
    ) -> Result<Option<NaiveDate>> {
        let key = ProgressKey::new(asset.id, category, timeframe);
        Ok(self
            .state
            .read()
            .await
            .records
            .get(&key)
            .and_then(|p| p.downloaded_until))
    }

    async fn advance(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
        until: NaiveDate,
        message: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.failing_advances > 0 {
            state.failing_advances -= 1;
            return Err(DataError::QueryError(format!(
                "injected advance failure for {}",
                asset.symbol
            )));
        }

        let key = ProgressKey::new(asset.id, category, timeframe);
        let record = state
            .records
            .entry(key)
            .or_insert_with(|| DownloadProgress::empty(key));
        record.downloaded_until = Some(until);
        record.message = message.map(str::to_string);
        state.advances.push((asset.symbol.clone(), until));
        Ok(())
    }

    async fn record_message(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
        message: &str,
    ) -> Result<()> {
        let key = ProgressKey::new(asset.id, category, timeframe);
        let mut state = self.state.write().await;
        state
            .records
            .entry(key)
            .or_insert_with(|| DownloadProgress::empty(key))
            .message = Some(message.to_string());
        Ok(())
    }

    async fn list(
        &self,
        category: Category,
        timeframe: TimeFrame,
    ) -> Result<Vec<DownloadProgress>> {
        let state = self.state.read().await;
        let mut records: Vec<DownloadProgress> = state
            .records
            .values()
            .filter(|p| p.key.category == category && p.key.timeframe == timeframe)
            .cloned()
            .collect();
        records.sort_by_key(|p| p.key.asset_id);
        Ok(records)
    }
}

#[derive(Debug, Default)]
struct BarState {
    rows: BTreeMap<(DateTime<Utc>, String), PriceBar>,
    /// 실패시킬 청크 번호 (1부터)
    fail_on_chunk: Option<usize>,
    insert_calls: usize,
}

/// 인메모리 가격 바 저장소.
///
/// 청크 단위로 스테이징한 뒤 마지막에 한 번에 반영하므로,
/// 중간 청크가 실패하면 아무것도 남지 않습니다.
#[derive(Debug)]
pub struct MemoryBarStore {
    chunk_size: usize,
    policy: ConflictPolicy,
    state: RwLock<BarState>,
}

impl Default for MemoryBarStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBarStore {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy: ConflictPolicy::default(),
            state: RwLock::new(BarState::default()),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `chunk`번째(1부터) 청크 실행을 실패시킵니다. `None`이면 해제.
    pub async fn fail_on_chunk(&self, chunk: impl Into<Option<usize>>) {
        self.state.write().await.fail_on_chunk = chunk.into();
    }

    /// 저장된 전체 행 수.
    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// `insert` 호출 횟수 (빈 입력 포함).
    pub async fn insert_calls(&self) -> usize {
        self.state.read().await.insert_calls
    }
}

#[async_trait]
impl BarStore for MemoryBarStore {
    async fn insert(&self, rows: &[PriceBar]) -> Result<u64> {
        let mut state = self.state.write().await;
        state.insert_calls += 1;
        if rows.is_empty() {
            return Ok(0);
        }

        let rows = unique_rows(rows);
        let mut staged = state.rows.clone();
        let mut written = 0u64;

        for (idx, chunk) in rows.chunks(self.chunk_size).enumerate() {
            if state.fail_on_chunk == Some(idx + 1) {
                return Err(DataError::InsertError(format!(
                    "injected failure on chunk {}",
                    idx + 1
                )));
            }

            for bar in chunk {
                let key = (bar.time, bar.symbol.clone());
                match self.policy {
                    ConflictPolicy::Ignore => {
                        if !staged.contains_key(&key) {
                            staged.insert(key, bar.clone());
                            written += 1;
                        }
                    }
                    ConflictPolicy::Overwrite => {
                        staged.insert(key, bar.clone());
                        written += 1;
                    }
                }
            }
        }

        state.rows = staged;
        Ok(written)
    }

    async fn count_bars(&self, symbol: &str) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.rows.values().filter(|b| b.symbol == symbol).count() as i64)
    }

    async fn select_bars(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        let state = self.state.read().await;
        Ok(state
            .rows
            .values()
            .filter(|b| b.symbol == symbol)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use uuid::Uuid;

    fn bar(symbol: &str, minute: u32, close: f64) -> PriceBar {
        PriceBar {
            time: Utc.with_ymd_and_hms(2021, 6, 1, 13, minute, 0).unwrap(),
            symbol: symbol.to_string(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close,
            volume: 10,
        }
    }

    #[tokio::test]
    async fn test_insert_ignores_duplicates() {
        let store = MemoryBarStore::new();
        let rows = vec![bar("AAPL", 0, 1.0), bar("AAPL", 1, 1.1)];

        assert_eq!(store.insert(&rows).await.unwrap(), 2);
        assert_eq!(store.insert(&rows).await.unwrap(), 0);
        assert_eq!(store.count_bars("AAPL").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_overwrite_policy_replaces_values() {
        let store = MemoryBarStore::new().with_conflict_policy(ConflictPolicy::Overwrite);
        store.insert(&[bar("AAPL", 0, 1.0)]).await.unwrap();
        store.insert(&[bar("AAPL", 0, 9.0)]).await.unwrap();

        let bars = store.select_bars("AAPL").await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 9.0);
    }

    #[tokio::test]
    async fn test_duplicate_keys_in_one_call_keep_last() {
        let store = MemoryBarStore::new().with_conflict_policy(ConflictPolicy::Overwrite);
        let rows = vec![bar("AAPL", 0, 1.0), bar("AAPL", 1, 2.0), bar("AAPL", 0, 3.0)];

        assert_eq!(store.insert(&rows).await.unwrap(), 2);

        let bars = store.select_bars("AAPL").await.unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_failed_chunk_rolls_back_everything() {
        let store = MemoryBarStore::new().with_chunk_size(2);
        store.fail_on_chunk(2).await;

        let rows: Vec<PriceBar> = (0..5).map(|m| bar("AAPL", m, 1.0)).collect();
        assert!(store.insert(&rows).await.is_err());
        assert!(store.is_empty().await);

        store.fail_on_chunk(None).await;
        assert_eq!(store.insert(&rows).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_select_bars_in_time_order() {
        let store = MemoryBarStore::new();
        store
            .insert(&[bar("AAPL", 3, 1.0), bar("MSFT", 2, 1.0), bar("AAPL", 1, 1.0)])
            .await
            .unwrap();

        let bars = store.select_bars("AAPL").await.unwrap();
        let minutes: Vec<u32> = bars.iter().map(|b| b.time.minute()).collect();
        assert_eq!(minutes, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_progress_initialize_once() {
        let assets = vec![Asset::active(Uuid::new_v4(), "AAPL")];
        let store = MemoryProgressStore::new(assets.clone());

        let created = store.initialize(&assets).await.unwrap();
        assert_eq!(created as usize, Category::ALL.len() * TimeFrame::ALL.len());
        assert_eq!(store.initialize(&assets).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_progress_pending_and_advance() {
        let aapl = Asset::active(Uuid::new_v4(), "AAPL");
        let msft = Asset::active(Uuid::new_v4(), "MSFT");
        let gone = Asset::new(Uuid::new_v4(), "GONE", "inactive");
        let store = MemoryProgressStore::new(vec![msft.clone(), aapl.clone(), gone]);
        let as_of = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();

        let pending = store
            .symbols_pending(Category::Bar, TimeFrame::Min, as_of)
            .await
            .unwrap();
        let symbols: Vec<&str> = pending.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);

        store
            .advance(Category::Bar, TimeFrame::Min, &aapl, as_of, None)
            .await
            .unwrap();
        let pending = store
            .symbols_pending(Category::Bar, TimeFrame::Min, as_of)
            .await
            .unwrap();
        assert_eq!(pending, vec![msft]);

        // 다른 타임프레임에는 영향 없음
        assert_eq!(
            store
                .checkpoint(Category::Bar, TimeFrame::Day, &aapl)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_record_message_keeps_checkpoint() {
        let aapl = Asset::active(Uuid::new_v4(), "AAPL");
        let store = MemoryProgressStore::new(vec![aapl.clone()]);
        let day = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();

        store
            .advance(Category::Bar, TimeFrame::Min, &aapl, day, None)
            .await
            .unwrap();
        store
            .record_message(Category::Bar, TimeFrame::Min, &aapl, "boom")
            .await
            .unwrap();

        let record = store.get(Category::Bar, TimeFrame::Min, &aapl).await.unwrap();
        assert_eq!(record.downloaded_until, Some(day));
        assert_eq!(record.message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_injected_advance_failure() {
        let aapl = Asset::active(Uuid::new_v4(), "AAPL");
        let store = MemoryProgressStore::new(vec![aapl.clone()]);
        let day = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        store.fail_next_advances(1).await;

        assert!(store
            .advance(Category::Bar, TimeFrame::Min, &aapl, day, None)
            .await
            .is_err());
        assert_eq!(
            store.checkpoint(Category::Bar, TimeFrame::Min, &aapl).await.unwrap(),
            None
        );
        assert!(store
            .advance(Category::Bar, TimeFrame::Min, &aapl, day, None)
            .await
            .is_ok());
    }
}
