//! 자산 목록 조회.

use crate::error::Result;
use async_trait::async_trait;
use bars_core::{Asset, ASSET_STATUS_ACTIVE};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

/// 활성 자산 집합 조회 인터페이스.
#[async_trait]
pub trait AssetDirectory: Send + Sync {
    /// 활성 자산 전체 (심볼 순).
    async fn active_assets(&self) -> Result<Vec<Asset>>;

    /// 활성 자산 중 심볼로 조회. 없거나 비활성이면 `None`.
    async fn find_active(&self, symbol: &str) -> Result<Option<Asset>>;
}

#[derive(Debug, FromRow)]
struct AssetRecord {
    id: Uuid,
    symbol: String,
    status: String,
}

impl From<AssetRecord> for Asset {
    fn from(r: AssetRecord) -> Self {
        Asset::new(r.id, r.symbol, r.status)
    }
}

/// `assets` 테이블 repository.
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetDirectory for PgAssetRepository {
    #[instrument(skip(self))]
    async fn active_assets(&self) -> Result<Vec<Asset>> {
        let records: Vec<AssetRecord> = sqlx::query_as(
            "SELECT id, symbol, status FROM assets WHERE status = $1 ORDER BY symbol",
        )
        .bind(ASSET_STATUS_ACTIVE)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Asset::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_active(&self, symbol: &str) -> Result<Option<Asset>> {
        let record: Option<AssetRecord> = sqlx::query_as(
            "SELECT id, symbol, status FROM assets WHERE symbol = $1 AND status = $2 LIMIT 1",
        )
        .bind(symbol)
        .bind(ASSET_STATUS_ACTIVE)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Asset::from))
    }
}
