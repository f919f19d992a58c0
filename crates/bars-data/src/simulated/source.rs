//! 스크립트로 응답하는 페이지 공급자.

use crate::error::{DataError, Result};
use crate::provider::{BarPage, BarPageSource, PageRequest, RequestThrottle};
use async_trait::async_trait;
use bars_core::{Category, RawBar, TimeFrame};
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// 공급자가 받은 요청 기록.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub symbol: String,
    pub category: Category,
    pub timeframe: TimeFrame,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub page_token: Option<String>,
}

enum Step {
    Page(BarPage),
    Fail(DataError),
}

#[derive(Default)]
struct SourceState {
    scripts: HashMap<String, VecDeque<Step>>,
    requests: Vec<RecordedRequest>,
}

/// 심볼별로 미리 정한 페이지/오류를 순서대로 돌려주는 공급자.
///
/// 스크립트가 바닥난 심볼은 빈 마지막 페이지를 받습니다.
#[derive(Default)]
pub struct ScriptedPageSource {
    state: RwLock<SourceState>,
    throttle: Option<Arc<RequestThrottle>>,
    delay: Option<Duration>,
}

impl ScriptedPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 요청마다 스로틀을 거치게 합니다.
    pub fn with_throttle(mut self, throttle: Arc<RequestThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// 응답마다 고정 지연을 둡니다.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 페이지 목록을 스크립트로 등록합니다.
    ///
    /// 마지막 페이지를 제외하고 `"{symbol}-page-{n}"` 형태의 토큰이 붙습니다.
    pub async fn script_pages(&self, symbol: &str, pages: Vec<Vec<RawBar>>) {
        let count = pages.len();
        let mut state = self.state.write().await;
        let queue = state.scripts.entry(symbol.to_string()).or_default();
        for (idx, bars) in pages.into_iter().enumerate() {
            let next_page_token = if idx + 1 < count {
                Some(format!("{}-page-{}", symbol, idx + 2))
            } else {
                None
            };
            queue.push_back(Step::Page(BarPage {
                bars,
                next_page_token,
            }));
        }
    }

    /// 페이지 하나를 그대로 등록합니다.
    pub async fn push_page(&self, symbol: &str, page: BarPage) {
        self.state
            .write()
            .await
            .scripts
            .entry(symbol.to_string())
            .or_default()
            .push_back(Step::Page(page));
    }

    /// 다음 응답으로 오류를 등록합니다.
    pub async fn push_error(&self, symbol: &str, error: DataError) {
        self.state
            .write()
            .await
            .scripts
            .entry(symbol.to_string())
            .or_default()
            .push_back(Step::Fail(error));
    }

    /// 지금까지 받은 요청.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.read().await.requests.clone()
    }

    /// 심볼별 요청 수.
    pub async fn request_count(&self, symbol: &str) -> usize {
        self.state
            .read()
            .await
            .requests
            .iter()
            .filter(|r| r.symbol == symbol)
            .count()
    }
}

#[async_trait]
impl BarPageSource for ScriptedPageSource {
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<BarPage> {
        if let Some(throttle) = &self.throttle {
            throttle.acquire().await;
        }

        let step = {
            let mut state = self.state.write().await;
            state.requests.push(RecordedRequest {
                symbol: request.symbol.to_string(),
                category: request.category,
                timeframe: request.timeframe,
                start: request.start,
                end: request.end,
                page_token: request.page_token.map(str::to_string),
            });
            state
                .scripts
                .get_mut(request.symbol)
                .and_then(VecDeque::pop_front)
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match step {
            Some(Step::Page(page)) => Ok(page),
            Some(Step::Fail(error)) => Err(error),
            None => Ok(BarPage::default()),
        }
    }
}
