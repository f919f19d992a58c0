//! Bars collector CLI.

use anyhow::Context;
use bars_collector::{modules, AcquireOutcome, AcquireSettings, Acquirer, CollectorConfig, ScratchArea};
use bars_core::{init_logging, Category, LogConfig, TimeFrame};
use bars_data::{
    AssetDirectory, Database, MarketDataClient, PgAssetRepository, PgBarStore, PgProgressStore,
    ProgressStore, RequestThrottle,
};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "bars-collector")]
#[command(about = "Resumable market bar collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 스키마 마이그레이션 실행
    Migrate,

    /// 활성 자산마다 진행 상태 레코드 생성 (이미 있으면 무시)
    InitProgress,

    /// 미완료 심볼 전체 수집
    DownloadAll {
        /// 카테고리 (bars)
        #[arg(long)]
        category: Option<Category>,
        /// 타임프레임 (1Min, 1Hour, 1Day)
        #[arg(long)]
        timeframe: Option<TimeFrame>,
        /// 기준일 (YYYY-MM-DD, 기본: 목표 종료일)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// 지정한 심볼만 수집
    StoreBars {
        /// 쉼표로 구분한 심볼 (예: "AAPL,JNJ")
        #[arg(long)]
        symbols: String,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        timeframe: Option<TimeFrame>,
    },

    /// 진행 상태 요약 출력
    Progress {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        timeframe: Option<TimeFrame>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig::new(cli.log_level.clone()).with_env_format())
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("Bars Collector 시작");

    let config = CollectorConfig::from_env()?;
    let db = Database::connect(&config.database)
        .await
        .context("데이터베이스 연결 실패")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("종료 신호 수신, 진행 중인 구간 정리 중...");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
        }
        Commands::InitProgress => {
            let assets = PgAssetRepository::new(db.pool().clone())
                .active_assets()
                .await?;
            let created = PgProgressStore::new(db.pool().clone())
                .initialize(&assets)
                .await?;
            tracing::info!(assets = assets.len(), created, "진행 상태 초기화 완료");
        }
        Commands::DownloadAll {
            category,
            timeframe,
            as_of,
        } => {
            let acquirer = build_acquirer(&config, &db)?;
            let category = category.unwrap_or(config.acquire.category);
            let timeframe = timeframe.unwrap_or(config.acquire.timeframe);
            let as_of = as_of.unwrap_or(acquirer.settings().target_end);

            let stats = modules::run_all(
                &acquirer,
                category,
                timeframe,
                as_of,
                config.batch.concurrency,
                &cancel,
            )
            .await?;
            stats.log_summary("일괄 수집");
        }
        Commands::StoreBars {
            symbols,
            category,
            timeframe,
        } => {
            let acquirer = build_acquirer(&config, &db)?.for_pair(
                category.unwrap_or(config.acquire.category),
                timeframe.unwrap_or(config.acquire.timeframe),
            );

            for symbol in symbols.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let asset = acquirer.resolve(symbol).await?;
                match acquirer
                    .acquire_asset(&asset, &cancel)
                    .await
                    .with_context(|| format!("{} 수집 실패", symbol))?
                {
                    AcquireOutcome::Skipped { checkpoint } => {
                        tracing::info!(symbol, checkpoint = ?checkpoint, "이미 최신");
                    }
                    AcquireOutcome::Advanced { until, bars, .. } => {
                        tracing::info!(symbol, until = %until, bars, "저장 완료");
                    }
                }
            }
        }
        Commands::Progress {
            category,
            timeframe,
        } => {
            let category = category.unwrap_or(config.acquire.category);
            let timeframe = timeframe.unwrap_or(config.acquire.timeframe);
            print_progress(&db, category, timeframe).await?;
        }
    }

    db.close().await;
    tracing::info!("Bars Collector 종료");

    Ok(())
}

fn build_acquirer(config: &CollectorConfig, db: &Database) -> bars_collector::Result<Acquirer> {
    let pool = db.pool().clone();

    let throttle = Arc::new(RequestThrottle::new(config.market_data.throttle_config()));
    let auth = Arc::new(config.market_data.authenticator()?);
    let client = MarketDataClient::new(config.market_data.client_config(), auth, throttle)?;

    let store = PgBarStore::new(pool.clone())
        .with_chunk_size(config.loader.chunk_size)
        .with_conflict_policy(config.loader.conflict);

    let today = Utc::now().date_naive();
    let settings = AcquireSettings::new(
        config.acquire.category,
        config.acquire.timeframe,
        config.acquire.floor_date,
        config.acquire.target_end(today),
    )
    .with_max_pages(config.acquire.max_pages)
    .with_keep_scratch(config.acquire.keep_scratch);

    Ok(Acquirer::new(
        Arc::new(client),
        Arc::new(PgProgressStore::new(pool.clone())),
        Arc::new(store),
        Arc::new(PgAssetRepository::new(pool)),
        ScratchArea::new(config.acquire.scratch_dir.clone()),
        settings,
    ))
}

async fn print_progress(db: &Database, category: Category, timeframe: TimeFrame) -> anyhow::Result<()> {
    let symbols: HashMap<_, _> = PgAssetRepository::new(db.pool().clone())
        .active_assets()
        .await?
        .into_iter()
        .map(|a| (a.id, a.symbol))
        .collect();
    let records = PgProgressStore::new(db.pool().clone())
        .list(category, timeframe)
        .await?;

    let done = records.iter().filter(|r| r.downloaded_until.is_some()).count();
    println!("{} / {}: {} of {} started", category, timeframe, done, records.len());

    for record in &records {
        let symbol = symbols
            .get(&record.key.asset_id)
            .map(String::as_str)
            .unwrap_or("-");
        let until = record
            .downloaded_until
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<8} {:<12} {}",
            symbol,
            until,
            record.message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
