//! 업스트림 요청 속도 제한기.
//!
//! 토큰 버킷 기반의 예방적 스로틀입니다. 요청마다 토큰 하나를 예약하고,
//! 토큰이 모자라면 다음 토큰이 채워질 때까지 기다린 뒤 요청을 보냅니다.
//! 따라서 연속 요청 간격은 `60 / (requests_per_minute - safety_margin)`초
//! 이상으로 유지됩니다. 429 응답에 대한 재시도는 하지 않습니다.
//!
//! `Arc<RequestThrottle>`로 공유하면 여러 워커가 하나의 예산을 나눠 씁니다.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// 스로틀 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// 업스트림의 분당 요청 한도
    pub requests_per_minute: u32,
    /// 한도에서 빼 둘 여유분 (분당 요청 수)
    pub safety_margin: u32,
    /// 순간적으로 허용할 추가 요청 수
    pub burst_size: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 200,
            safety_margin: 10,
            burst_size: 0,
        }
    }
}

impl ThrottleConfig {
    pub fn new(requests_per_minute: u32, safety_margin: u32) -> Self {
        Self {
            requests_per_minute,
            safety_margin,
            burst_size: 0,
        }
    }

    /// 실제 사용할 분당 요청 수 (최소 1).
    pub fn effective_per_minute(&self) -> u32 {
        self.requests_per_minute
            .saturating_sub(self.safety_margin)
            .max(1)
    }

    /// 요청당 시간 예산.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.effective_per_minute() as f64)
    }
}

#[derive(Debug)]
struct TokenBucket {
    /// 현재 토큰 수 (예약으로 음수가 될 수 있음)
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    /// 초당 리필 토큰 수
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &ThrottleConfig) -> Self {
        let max_tokens = 1.0 + config.burst_size as f64;
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate: config.effective_per_minute() as f64 / 60.0,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// 토큰 하나를 예약하고, 그 토큰이 유효해질 때까지의 대기 시간을 반환.
    fn reserve(&mut self) -> Duration {
        self.refill();
        self.tokens -= 1.0;

        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.refill_rate)
        }
    }
}

/// 공유 요청 스로틀.
#[derive(Debug)]
pub struct RequestThrottle {
    config: ThrottleConfig,
    bucket: Mutex<TokenBucket>,
}

impl RequestThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(&config)),
            config,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// 요청 슬롯을 확보합니다. 필요하면 대기하며, 실제 대기 시간을 반환합니다.
    pub async fn acquire(&self) -> Duration {
        // 락은 예약까지만 잡고, 대기는 락 밖에서
        let wait = self.bucket.lock().await.reserve();

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Request too early, waiting");
            tokio::time::sleep(wait).await;
        }
        wait
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_interval_from_ceiling_and_margin() {
        let config = ThrottleConfig::new(200, 10);
        assert_eq!(config.effective_per_minute(), 190);
        let expected = 60.0 / 190.0;
        assert!((config.interval().as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_margin_never_reaches_zero_rate() {
        let config = ThrottleConfig::new(5, 10);
        assert_eq!(config.effective_per_minute(), 1);
        assert_eq!(config.interval(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let throttle = RequestThrottle::new(ThrottleConfig::new(60, 0));
        assert_eq!(throttle.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_requests_are_spaced() {
        let config = ThrottleConfig::new(200, 10);
        let throttle = RequestThrottle::new(config);
        let n = 10;

        let start = Instant::now();
        for _ in 0..n {
            throttle.acquire().await;
        }
        let elapsed = start.elapsed();

        let min = config.interval().as_secs_f64() * (n - 1) as f64;
        // 슬립 반올림(밀리초) 허용
        assert!(elapsed.as_secs_f64() >= min - 0.001, "elapsed {:?}", elapsed);
        assert!(elapsed.as_secs_f64() < min + 0.1, "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_refills_only_up_to_capacity() {
        let throttle = RequestThrottle::new(ThrottleConfig::new(60, 0));
        throttle.acquire().await;

        // 오래 쉬어도 버스트 없이 토큰 1개까지만 충전
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(throttle.acquire().await, Duration::ZERO);
        assert!(throttle.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_budget_across_workers() {
        let config = ThrottleConfig::new(120, 0);
        let throttle = Arc::new(RequestThrottle::new(config));

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move {
                for _ in 0..2 {
                    throttle.acquire().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 6 requests at 0.5s spacing = at least 2.5s regardless of worker count
        assert!(start.elapsed() >= Duration::from_millis(2499));
    }
}
