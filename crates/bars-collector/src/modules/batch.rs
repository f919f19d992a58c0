//! 미완료 심볼 일괄 수집.
//!
//! 시작 시점에 `symbols_pending` 스냅샷을 한 번 가져와 심볼마다 수집기를 실행합니다.
//! 심볼 하나의 실패는 기록만 하고 다음 심볼로 넘어갑니다.

use crate::modules::acquire::{AcquireOutcome, Acquirer};
use crate::{CollectionStats, Result};
use bars_core::{Asset, Category, TimeFrame};
use chrono::NaiveDate;
use futures::{future, stream, StreamExt};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 미완료 심볼 전체를 수집합니다.
///
/// `concurrency`가 1보다 크면 여러 심볼을 동시에 처리합니다. 요청 예산은
/// 수집기가 공유하는 스로틀 하나로 유지되고, 스냅샷에 심볼이 한 번씩만 있으므로
/// 같은 진행 레코드를 동시에 갱신하는 일은 없습니다.
pub async fn run_all(
    acquirer: &Acquirer,
    category: Category,
    timeframe: TimeFrame,
    as_of: NaiveDate,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<CollectionStats> {
    let start_time = Instant::now();
    let acquirer = acquirer.for_pair(category, timeframe);

    let pending = acquirer
        .progress()
        .symbols_pending(category, timeframe, as_of)
        .await?;

    let mut stats = CollectionStats::new();
    stats.total = pending.len();

    info!(
        category = %category,
        timeframe = %timeframe,
        as_of = %as_of,
        symbols = pending.len(),
        concurrency,
        "일괄 수집 시작"
    );

    let acquirer_ref = &acquirer;
    let mut results = stream::iter(pending)
        .take_while(|_| future::ready(!cancel.is_cancelled()))
        .map(|asset| async move {
            let result = acquirer_ref.acquire_asset(&asset, cancel).await;
            (asset, result)
        })
        .buffer_unordered(concurrency.max(1));

    let mut processed = 0usize;
    while let Some((asset, result)) = results.next().await {
        processed += 1;
        match result {
            Ok(AcquireOutcome::Skipped { .. }) => stats.skipped += 1,
            Ok(AcquireOutcome::Advanced { written, .. }) => {
                stats.success += 1;
                stats.total_bars += written;
            }
            Err(e) if e.is_cancelled() => {
                warn!(symbol = %asset.symbol, "중단됨");
                stats.cancelled += 1;
            }
            Err(e) => {
                error!(symbol = %asset.symbol, error = %e, "심볼 수집 실패");
                stats.record_failure(&asset.symbol);
                record_failure_message(&acquirer, category, timeframe, &asset, &e.to_string()).await;
            }
        }
    }

    stats.cancelled += stats.total - processed;
    stats.elapsed = start_time.elapsed();

    if cancel.is_cancelled() {
        warn!(remaining = stats.total - processed, "종료 신호로 일괄 수집 중단");
    }

    Ok(stats)
}

async fn record_failure_message(
    acquirer: &Acquirer,
    category: Category,
    timeframe: TimeFrame,
    asset: &Asset,
    message: &str,
) {
    if let Err(e) = acquirer
        .progress()
        .record_message(category, timeframe, asset, message)
        .await
    {
        warn!(symbol = %asset.symbol, error = %e, "실패 메시지 기록 실패");
    }
}
