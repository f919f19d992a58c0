//! 가격 바 멱등 벌크 로더.
//!
//! # 동작 방식
//!
//! 1. 행을 `chunk_size` 단위로 나눔 (메모리/트랜잭션 크기 제한)
//! 2. 청크마다 `UNNEST` 배열 삽입을 순차 실행
//! 3. 전체를 하나의 트랜잭션으로 커밋 (청크 하나라도 실패하면 전부 롤백)
//!
//! 같은 `(time, symbol)` 재삽입은 에러 없이 무시(기본)하거나 덮어씁니다.
//! 한 번의 호출 안에서 키가 겹치면 마지막 행만 보냅니다
//! (`DO UPDATE`는 한 명령에서 같은 행을 두 번 갱신할 수 없음).

use crate::error::{DataError, Result};
use async_trait::async_trait;
use bars_core::{sort_and_dedup, PriceBar};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// 기본 청크 크기.
pub const DEFAULT_CHUNK_SIZE: usize = 500_000;

/// 같은 키의 바가 이미 있을 때의 처리 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// 기존 행 유지 (`ON CONFLICT DO NOTHING`)
    #[default]
    Ignore,
    /// 제공자 정정값으로 OHLCV 덮어쓰기
    Overwrite,
}

impl ConflictPolicy {
    fn on_conflict_clause(&self) -> &'static str {
        match self {
            ConflictPolicy::Ignore => "ON CONFLICT (time, symbol) DO NOTHING",
            ConflictPolicy::Overwrite => {
                "ON CONFLICT (time, symbol) DO UPDATE SET \
                 open = EXCLUDED.open, high = EXCLUDED.high, low = EXCLUDED.low, \
                 close = EXCLUDED.close, volume = EXCLUDED.volume"
            }
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Ignore => f.write_str("ignore"),
            ConflictPolicy::Overwrite => f.write_str("overwrite"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(ConflictPolicy::Ignore),
            "overwrite" | "update" => Ok(ConflictPolicy::Overwrite),
            _ => Err(format!("Unknown conflict policy: {}", s)),
        }
    }
}

/// 가격 바 저장소 인터페이스.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// 바를 저장합니다. 전부 커밋되거나 아무것도 커밋되지 않습니다.
    ///
    /// 입력 안의 중복 키는 마지막 행으로 합쳐집니다.
    /// 반환값은 실제로 쓰인 행 수 (무시된 중복 제외).
    async fn insert(&self, rows: &[PriceBar]) -> Result<u64>;

    /// 심볼의 저장된 바 수.
    async fn count_bars(&self, symbol: &str) -> Result<i64>;

    /// 심볼의 전체 바 (시간 오름차순).
    async fn select_bars(&self, symbol: &str) -> Result<Vec<PriceBar>>;
}

/// 한 번의 삽입에 들어갈 행을 키 중복 없이 정리합니다.
///
/// 이미 키 오름차순이고 중복이 없으면 복사하지 않습니다.
pub(crate) fn unique_rows(rows: &[PriceBar]) -> Cow<'_, [PriceBar]> {
    if rows.windows(2).all(|w| w[0].key() < w[1].key()) {
        Cow::Borrowed(rows)
    } else {
        let mut owned = rows.to_vec();
        sort_and_dedup(&mut owned);
        Cow::Owned(owned)
    }
}

/// `price_bars` 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
struct PriceBarRecord {
    time: DateTime<Utc>,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl From<PriceBarRecord> for PriceBar {
    fn from(r: PriceBarRecord) -> Self {
        PriceBar {
            time: r.time,
            symbol: r.symbol,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        }
    }
}

/// PostgreSQL 가격 바 저장소.
#[derive(Clone)]
pub struct PgBarStore {
    pool: PgPool,
    chunk_size: usize,
    policy: ConflictPolicy,
}

impl PgBarStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy: ConflictPolicy::default(),
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

    fn insert_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO price_bars (time, symbol, open, high, low, close, volume)
            SELECT * FROM UNNEST(
                $1::timestamptz[], $2::text[],
                $3::float8[], $4::float8[], $5::float8[], $6::float8[],
                $7::int8[]
            )
            {}
            "#,
            self.policy.on_conflict_clause()
        )
    }
}

#[async_trait]
impl BarStore for PgBarStore {
    #[instrument(skip(self, rows), fields(rows = rows.len(), policy = %self.policy))]
    async fn insert(&self, rows: &[PriceBar]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let rows = unique_rows(rows);
        let sql = self.insert_sql();
        let chunk_count = rows.len().div_ceil(self.chunk_size);
        let mut written = 0u64;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

        for (idx, chunk) in rows.chunks(self.chunk_size).enumerate() {
            let times: Vec<DateTime<Utc>> = chunk.iter().map(|b| b.time).collect();
            let symbols: Vec<&str> = chunk.iter().map(|b| b.symbol.as_str()).collect();
            let opens: Vec<f64> = chunk.iter().map(|b| b.open).collect();
            let highs: Vec<f64> = chunk.iter().map(|b| b.high).collect();
            let lows: Vec<f64> = chunk.iter().map(|b| b.low).collect();
            let closes: Vec<f64> = chunk.iter().map(|b| b.close).collect();
            let volumes: Vec<i64> = chunk.iter().map(|b| b.volume).collect();

            let result = sqlx::query(&sql)
                .bind(&times)
                .bind(&symbols)
                .bind(&opens)
                .bind(&highs)
                .bind(&lows)
                .bind(&closes)
                .bind(&volumes)
                .execute(&mut *tx)
                .await
                .map_err(|e| DataError::InsertError(e.to_string()))?;

            written += result.rows_affected();
            debug!(
                progress = format!("{}/{}", idx + 1, chunk_count),
                rows = chunk.len(),
                "Chunk executed"
            );
        }

        tx.commit()
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

        info!(rows = rows.len(), written, chunks = chunk_count, "Bars stored");
        Ok(written)
    }

    async fn count_bars(&self, symbol: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM price_bars WHERE symbol = $1")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn select_bars(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        let records: Vec<PriceBarRecord> = sqlx::query_as(
            r#"
            SELECT time, symbol, open, high, low, close, volume
            FROM price_bars
            WHERE symbol = $1
            ORDER BY time
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(PriceBar::from).collect())
    }
}
