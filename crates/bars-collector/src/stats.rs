//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 작업 대상 심볼 수
    pub total: usize,
    /// 성공 횟수 (체크포인트 갱신)
    pub success: usize,
    /// 에러 횟수
    pub errors: usize,
    /// 건너뛴 횟수 (이미 최신 데이터)
    pub skipped: usize,
    /// 종료 신호로 중단되었거나 시작하지 못한 심볼 수
    pub cancelled: usize,
    /// 저장된 총 바 수
    pub total_bars: u64,
    /// 실패한 심볼
    pub failed_symbols: Vec<String>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    pub fn record_failure(&mut self, symbol: &str) {
        self.errors += 1;
        self.failed_symbols.push(symbol.to_string());
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            cancelled = self.cancelled,
            total_bars = self.total_bars,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
        if !self.failed_symbols.is_empty() {
            tracing::warn!(failed = ?self.failed_symbols, "실패한 심볼");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut stats = CollectionStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.total = 4;
        stats.success = 3;
        stats.record_failure("JNJ");
        assert_eq!(stats.success_rate(), 75.0);
        assert_eq!(stats.failed_symbols, vec!["JNJ".to_string()]);
    }
}
