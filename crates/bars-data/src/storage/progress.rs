//! 다운로드 진행 상태 저장소.
//!
//! `(asset_id, category, time_frame)` 단위의 평면 테이블 하나로 관리합니다.
//! `downloaded_until`은 해당 날짜까지의 바가 모두 영구 저장된 뒤에만
//! 갱신되어야 합니다 (저장 → 갱신 순서, 반대 순서 금지).

use crate::error::{DataError, Result};
use async_trait::async_trait;
use bars_core::{Asset, Category, DownloadProgress, ProgressKey, TimeFrame, ASSET_STATUS_ACTIVE};
use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// 다운로드 진행 상태 저장소 인터페이스.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// 자산 × 카테고리 × 타임프레임 조합마다 빈 레코드를 생성합니다.
    ///
    /// 이미 레코드가 하나라도 있으면 아무것도 하지 않고 0을 반환합니다.
    async fn initialize(&self, assets: &[Asset]) -> Result<u64>;

    /// `as_of` 기준으로 수집이 남은 활성 자산 목록 (심볼 순, 중복 없음).
    ///
    /// 체크포인트가 없거나 `as_of`보다 이전인 자산이 포함됩니다.
    async fn symbols_pending(
        &self,
        category: Category,
        timeframe: TimeFrame,
        as_of: NaiveDate,
    ) -> Result<Vec<Asset>>;

    /// 자산의 체크포인트 (`downloaded_until`).
    async fn checkpoint(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
    ) -> Result<Option<NaiveDate>>;

    /// 체크포인트를 `until`로 갱신합니다.
    ///
    /// 구간의 모든 바가 영구 저장된 뒤에만 호출해야 합니다.
    async fn advance(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
        until: NaiveDate,
        message: Option<&str>,
    ) -> Result<()>;

    /// 체크포인트는 그대로 두고 진단 메시지만 기록합니다.
    async fn record_message(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
        message: &str,
    ) -> Result<()>;

    /// 카테고리/타임프레임의 전체 진행 상태.
    async fn list(&self, category: Category, timeframe: TimeFrame)
        -> Result<Vec<DownloadProgress>>;
}

/// `download_progress` 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
struct ProgressRecord {
    asset_id: Uuid,
    category: String,
    time_frame: String,
    downloaded_until: Option<NaiveDate>,
    message: Option<String>,
}

impl ProgressRecord {
    fn into_progress(self) -> Result<DownloadProgress> {
        let category: Category = self.category.parse().map_err(DataError::ParseError)?;
        let timeframe: TimeFrame = self.time_frame.parse().map_err(DataError::ParseError)?;

        Ok(DownloadProgress {
            key: ProgressKey::new(self.asset_id, category, timeframe),
            downloaded_until: self.downloaded_until,
            message: self.message,
        })
    }
}

/// PostgreSQL 진행 상태 저장소.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM download_progress")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    #[instrument(skip(self, assets), fields(assets = assets.len()))]
    async fn initialize(&self, assets: &[Asset]) -> Result<u64> {
        let existing = self.count().await?;
        if existing > 0 {
            debug!(existing, "Progress table already initialized");
            return Ok(0);
        }

        let mut asset_ids = Vec::new();
        let mut categories = Vec::new();
        let mut time_frames = Vec::new();
        for asset in assets {
            for category in Category::ALL {
                for timeframe in TimeFrame::ALL {
                    asset_ids.push(asset.id);
                    categories.push(category.as_str());
                    time_frames.push(timeframe.as_str());
                }
            }
        }

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO download_progress (asset_id, category, time_frame)
            SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[])
            ON CONFLICT (asset_id, category, time_frame) DO NOTHING
            "#,
        )
        .bind(&asset_ids)
        .bind(&categories)
        .bind(&time_frames)
        .execute(&mut *tx)
        .await
        .map_err(|e| DataError::InsertError(e.to_string()))?;
        tx.commit().await?;

        let created = result.rows_affected();
        info!(created, "Progress table initialized");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn symbols_pending(
        &self,
        category: Category,
        timeframe: TimeFrame,
        as_of: NaiveDate,
    ) -> Result<Vec<Asset>> {
        // 진행 레코드가 없는 자산(초기화 이후 상장)도 "받은 적 없음"으로 취급
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            r#"
            SELECT a.id, a.symbol, a.status
            FROM assets a
            LEFT JOIN download_progress p
                ON p.asset_id = a.id AND p.category = $1 AND p.time_frame = $2
            WHERE a.status = $3
              AND (p.downloaded_until IS NULL OR p.downloaded_until < $4)
            ORDER BY a.symbol
            "#,
        )
        .bind(category.as_str())
        .bind(timeframe.as_str())
        .bind(ASSET_STATUS_ACTIVE)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, symbol, status)| Asset::new(id, symbol, status))
            .collect())
    }

    #[instrument(skip(self, asset), fields(symbol = %asset.symbol))]
    async fn checkpoint(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
    ) -> Result<Option<NaiveDate>> {
        let row: Option<(Option<NaiveDate>,)> = sqlx::query_as(
            r#"
            SELECT downloaded_until FROM download_progress
            WHERE asset_id = $1 AND category = $2 AND time_frame = $3
            "#,
        )
        .bind(asset.id)
        .bind(category.as_str())
        .bind(timeframe.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(until,)| until))
    }

    #[instrument(skip(self, asset), fields(symbol = %asset.symbol))]
    async fn advance(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
        until: NaiveDate,
        message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO download_progress
                (asset_id, category, time_frame, downloaded_until, message, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (asset_id, category, time_frame) DO UPDATE SET
                downloaded_until = EXCLUDED.downloaded_until,
                message = EXCLUDED.message,
                updated_at = NOW()
            "#,
        )
        .bind(asset.id)
        .bind(category.as_str())
        .bind(timeframe.as_str())
        .bind(until)
        .bind(message)
        .execute(&self.pool)
        .await?;

        debug!(until = %until, "Checkpoint advanced");
        Ok(())
    }

    #[instrument(skip(self, asset, message), fields(symbol = %asset.symbol))]
    async fn record_message(
        &self,
        category: Category,
        timeframe: TimeFrame,
        asset: &Asset,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO download_progress (asset_id, category, time_frame, message, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (asset_id, category, time_frame) DO UPDATE SET
                message = EXCLUDED.message,
                updated_at = NOW()
            "#,
        )
        .bind(asset.id)
        .bind(category.as_str())
        .bind(timeframe.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        category: Category,
        timeframe: TimeFrame,
    ) -> Result<Vec<DownloadProgress>> {
        let records: Vec<ProgressRecord> = sqlx::query_as(
            r#"
            SELECT asset_id, category, time_frame, downloaded_until, message
            FROM download_progress
            WHERE category = $1 AND time_frame = $2
            ORDER BY asset_id
            "#,
        )
        .bind(category.as_str())
        .bind(timeframe.as_str())
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(ProgressRecord::into_progress).collect()
    }
}
