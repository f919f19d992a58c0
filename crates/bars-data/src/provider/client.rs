//! 페이지 토큰 기반 시장 데이터 API 클라이언트.
//!
//! `GET {base_url}/stocks/{symbol}/{category}` 한 번이 한 페이지입니다.
//! 응답의 `next_page_token`이 없을 때까지 호출자가 토큰을 이어 붙여
//! 반복 호출해야 합니다. 호출 간격은 공유 [`RequestThrottle`]이 맞춥니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! let throttle = Arc::new(RequestThrottle::new(ThrottleConfig::new(200, 10)));
//! let auth = Arc::new(ApiKeyAuth::new(key_id, secret));
//! let client = MarketDataClient::new(MarketDataConfig::new(base_url), auth, throttle)?;
//!
//! let page = client.fetch_page(&PageRequest::new("AAPL", Category::Bar, TimeFrame::Min, start, end)).await?;
//! ```

use crate::error::{DataError, Result};
use crate::provider::auth::RequestAuthenticator;
use crate::provider::throttle::RequestThrottle;
use async_trait::async_trait;
use bars_core::{Category, RawBar, TimeFrame};
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// 한 번에 요청하는 최대 바 수 (업스트림 상한).
pub const DEFAULT_PAGE_LIMIT: u32 = 10_000;

/// 한 페이지 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub symbol: &'a str,
    pub category: Category,
    pub timeframe: TimeFrame,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub page_token: Option<&'a str>,
}

impl<'a> PageRequest<'a> {
    /// 첫 페이지 요청.
    pub fn new(
        symbol: &'a str,
        category: Category,
        timeframe: TimeFrame,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            symbol,
            category,
            timeframe,
            start,
            end,
            page_token: None,
        }
    }

    /// 다음 페이지 토큰을 붙인 요청.
    pub fn with_page_token(mut self, token: Option<&'a str>) -> Self {
        self.page_token = token;
        self
    }
}

/// 한 페이지 응답.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarPage {
    pub bars: Vec<RawBar>,
    pub next_page_token: Option<String>,
}

impl BarPage {
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }
}

/// 페이지 단위 바 공급자.
#[async_trait]
pub trait BarPageSource: Send + Sync {
    /// 요청 하나를 보내고 한 페이지를 반환합니다. 재시도하지 않습니다.
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<BarPage>;
}

/// 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    /// API 기본 URL (예: "https://data.alpaca.markets/v2")
    pub base_url: String,
    /// 페이지당 최대 바 수
    pub page_limit: u32,
    /// 요청 타임아웃 (`None`이면 제한 없음)
    pub request_timeout: Option<Duration>,
}

impl MarketDataConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            page_limit: DEFAULT_PAGE_LIMIT,
            request_timeout: None,
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP 시장 데이터 클라이언트.
#[derive(Clone)]
pub struct MarketDataClient {
    http: reqwest::Client,
    config: MarketDataConfig,
    auth: Arc<dyn RequestAuthenticator>,
    throttle: Arc<RequestThrottle>,
}

impl MarketDataClient {
    pub fn new(
        config: MarketDataConfig,
        auth: Arc<dyn RequestAuthenticator>,
        throttle: Arc<RequestThrottle>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            config,
            auth,
            throttle,
        })
    }

    fn endpoint(&self, symbol: &str, category: Category) -> String {
        format!(
            "{}/stocks/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol,
            category.as_str()
        )
    }

    fn query(&self, request: &PageRequest<'_>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("start", request.start.format("%Y-%m-%d").to_string()),
            ("end", request.end.format("%Y-%m-%d").to_string()),
            ("timeframe", request.timeframe.as_str().to_string()),
            ("limit", self.config.page_limit.to_string()),
        ];
        if let Some(token) = request.page_token {
            query.push(("page_token", token.to_string()));
        }
        query
    }
}

#[async_trait]
impl BarPageSource for MarketDataClient {
    #[instrument(
        skip(self, request),
        fields(symbol = request.symbol, category = %request.category, has_token = request.page_token.is_some())
    )]
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<BarPage> {
        self.throttle.acquire().await;

        let url = self.endpoint(request.symbol, request.category);
        let query = self.query(request);

        let started = Instant::now();
        let response = self
            .auth
            .authenticate(self.http.get(&url).query(&query))
            .send()
            .await?;
        let status = response.status();

        debug!(
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Page requested"
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(symbol = request.symbol, "Upstream rate limit exceeded");
            return Err(DataError::RateLimitExceeded(format!(
                "upstream rejected request for {}",
                request.symbol
            )));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(DataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        parse_page(&body, request.category)
    }
}

/// 응답 본문을 [`BarPage`]로 파싱합니다.
///
/// 카테고리 키(`bars` 등)가 없거나 `null`이면 빈 페이지,
/// `next_page_token`이 없거나 `null`/빈 문자열이면 마지막 페이지입니다.
pub fn parse_page(body: &str, category: Category) -> Result<BarPage> {
    let mut root: Value =
        serde_json::from_str(body).map_err(|e| DataError::ParseError(e.to_string()))?;

    let object = root
        .as_object_mut()
        .ok_or_else(|| DataError::ParseError("response is not a JSON object".to_string()))?;

    let bars = match object.remove(category.as_str()) {
        None | Some(Value::Null) => Vec::new(),
        Some(items) => serde_json::from_value::<Vec<RawBar>>(items)
            .map_err(|e| DataError::ParseError(format!("{}: {}", category, e)))?,
    };

    let next_page_token = match object.remove("next_page_token") {
        Some(Value::String(token)) if !token.is_empty() => Some(token),
        None | Some(Value::Null) | Some(Value::String(_)) => None,
        Some(other) => {
            return Err(DataError::ParseError(format!(
                "unexpected next_page_token: {}",
                other
            )))
        }
    };

    Ok(BarPage {
        bars,
        next_page_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_with_token() {
        let body = r#"{
            "bars": [
                {"t":"2021-06-01T13:30:00Z","o":1.0,"h":1.5,"l":0.9,"c":1.2,"v":100},
                {"t":"2021-06-01T13:31:00Z","o":1.2,"h":1.3,"l":1.1,"c":1.25,"v":50}
            ],
            "symbol": "AAPL",
            "next_page_token": "QUFQTHxNfDIwMjEtMDYtMDE="
        }"#;

        let page = parse_page(body, Category::Bar).unwrap();
        assert_eq!(page.bars.len(), 2);
        assert_eq!(page.bars[1].v, 50);
        assert_eq!(page.next_page_token.as_deref(), Some("QUFQTHxNfDIwMjEtMDYtMDE="));
        assert!(!page.is_last());
    }

    #[test]
    fn test_parse_page_empty_and_last() {
        let page = parse_page(r#"{"bars":null,"symbol":"AAPL","next_page_token":null}"#, Category::Bar)
            .unwrap();
        assert!(page.bars.is_empty());
        assert!(page.is_last());

        let page = parse_page(r#"{"symbol":"AAPL","next_page_token":""}"#, Category::Bar).unwrap();
        assert!(page.is_last());
    }

    #[test]
    fn test_parse_page_rejects_garbage() {
        assert!(matches!(
            parse_page("not json", Category::Bar),
            Err(DataError::ParseError(_))
        ));
        assert!(matches!(
            parse_page("[1,2,3]", Category::Bar),
            Err(DataError::ParseError(_))
        ));
        assert!(matches!(
            parse_page(r#"{"bars":[{"t":"x"}]}"#, Category::Bar),
            Err(DataError::ParseError(_))
        ));
    }
}
