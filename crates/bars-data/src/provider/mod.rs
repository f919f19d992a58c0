//! 업스트림 시장 데이터 접근.

pub mod auth;
pub mod client;
pub mod throttle;

pub use auth::{ApiKeyAuth, RequestAuthenticator};
pub use client::{parse_page, BarPage, BarPageSource, MarketDataClient, MarketDataConfig, PageRequest};
pub use throttle::{RequestThrottle, ThrottleConfig};
