//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use bars_core::{Category, TimeFrame};
use bars_data::{ApiKeyAuth, ConflictPolicy, DatabaseConfig, MarketDataConfig, ThrottleConfig};
use chrono::{Days, NaiveDate};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 기본 시장 데이터 엔드포인트.
pub const DEFAULT_MARKET_DATA_ENDPOINT: &str = "https://data.alpaca.markets/v2";
/// 체크포인트가 없을 때의 과거 하한일.
pub const DEFAULT_FLOOR_DATE: &str = "2016-01-01";

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 업스트림 API 설정
    pub market_data: MarketDataSettings,
    /// 구간 수집 설정
    pub acquire: AcquireConfig,
    /// 벌크 로더 설정
    pub loader: LoaderConfig,
    /// 배치 설정
    pub batch: BatchConfig,
}

/// 업스트림 API 설정
#[derive(Debug, Clone)]
pub struct MarketDataSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub secret_key: Option<SecretString>,
    /// 페이지당 최대 바 수
    pub page_limit: u32,
    /// 분당 요청 한도
    pub rate_limit_per_minute: u32,
    /// 한도에서 빼 둘 여유분
    pub rate_margin: u32,
    /// 요청 타임아웃 (초, 미설정 시 무제한)
    pub timeout_secs: Option<u64>,
}

/// 구간 수집 설정
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub category: Category,
    pub timeframe: TimeFrame,
    /// 체크포인트가 없을 때 시작일
    pub floor_date: NaiveDate,
    /// 목표 종료일 (미설정 시 오늘 - `end_lag_days`)
    pub end_date: Option<NaiveDate>,
    pub end_lag_days: u64,
    /// 심볼당 최대 페이지 수 (미설정 시 무제한)
    pub max_pages: Option<usize>,
    /// 페이지 원본을 쓰는 스크래치 디렉토리
    pub scratch_dir: PathBuf,
    /// 성공 후에도 스크래치 출력을 남길지 여부
    pub keep_scratch: bool,
}

/// 벌크 로더 설정
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub chunk_size: usize,
    pub conflict: ConflictPolicy,
}

/// 배치 설정
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// 동시에 처리할 심볼 수 (1 = 순차)
    pub concurrency: usize,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로부터 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = env.get("DATABASE_URL").ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;
        let mut database = DatabaseConfig::new(database_url);
        database.max_connections = env.parse_or("DB_MAX_CONNECTIONS", database.max_connections);

        let default_floor = NaiveDate::from_str(DEFAULT_FLOOR_DATE)
            .map_err(|e| CollectorError::Config(e.to_string()))?;

        Ok(Self {
            database,
            market_data: MarketDataSettings {
                endpoint: env
                    .get("ALPACA_ENDPOINT_MARKET_DATA")
                    .unwrap_or_else(|| DEFAULT_MARKET_DATA_ENDPOINT.to_string()),
                api_key: env.get("ALPACA_API_KEY"),
                secret_key: env.get("ALPACA_SECRET_KEY").map(SecretString::from),
                page_limit: env.parse_or("MARKET_DATA_PAGE_LIMIT", 10_000),
                rate_limit_per_minute: env.parse_or("MARKET_DATA_RATE_LIMIT", 200),
                rate_margin: env.parse_or("MARKET_DATA_RATE_MARGIN", 10),
                timeout_secs: env.parse_opt("MARKET_DATA_TIMEOUT_SECS"),
            },
            acquire: AcquireConfig {
                category: env.parse_strict("ACQUIRE_CATEGORY", Category::Bar)?,
                timeframe: env.parse_strict("ACQUIRE_TIMEFRAME", TimeFrame::Min)?,
                floor_date: env.parse_strict("ACQUIRE_FLOOR_DATE", default_floor)?,
                end_date: env.parse_strict_opt("ACQUIRE_END_DATE")?,
                end_lag_days: env.parse_or("ACQUIRE_END_LAG_DAYS", 2),
                max_pages: env.parse_opt("ACQUIRE_MAX_PAGES"),
                scratch_dir: env
                    .get("SCRATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data/downloads")),
                keep_scratch: env.bool_or("SCRATCH_KEEP", false),
            },
            loader: LoaderConfig {
                chunk_size: env.parse_or("LOADER_CHUNK_SIZE", bars_data::storage::DEFAULT_CHUNK_SIZE),
                conflict: env.parse_strict("LOADER_CONFLICT", ConflictPolicy::Ignore)?,
            },
            batch: BatchConfig {
                concurrency: env.parse_or("BATCH_CONCURRENCY", 1usize).max(1),
            },
        })
    }
}

impl MarketDataSettings {
    /// API 키 인증 정보 (키가 없으면 설정 에러)
    pub fn authenticator(&self) -> Result<ApiKeyAuth> {
        match (&self.api_key, &self.secret_key) {
            (Some(key), Some(secret)) => Ok(ApiKeyAuth::new(key.clone(), secret.expose_secret())),
            _ => Err(CollectorError::Config(
                "ALPACA_API_KEY / ALPACA_SECRET_KEY 환경변수가 설정되지 않았습니다".to_string(),
            )),
        }
    }

    pub fn client_config(&self) -> MarketDataConfig {
        MarketDataConfig::new(self.endpoint.clone())
            .with_page_limit(self.page_limit)
            .with_request_timeout(self.timeout_secs.map(Duration::from_secs))
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig::new(self.rate_limit_per_minute, self.rate_margin)
    }
}

impl AcquireConfig {
    /// 목표 종료일 계산
    pub fn target_end(&self, today: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or_else(|| {
            today
                .checked_sub_days(Days::new(self.end_lag_days))
                .unwrap_or(today)
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.parse_opt(key).unwrap_or(default)
    }

    fn parse_opt<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// 잘못된 값은 기본값으로 덮지 않고 설정 에러로 처리
    fn parse_strict<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_strict_opt(key)?.unwrap_or(default))
    }

    fn parse_strict_opt<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|e| CollectorError::Config(format!("{}={}: {}", key, v, e)))
            })
            .transpose()
    }

    /// 환경변수에서 bool 값 파싱
    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(default)
    }
}
