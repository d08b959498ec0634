//! 滑动窗口限流器
//!
//! 记录窗口内每次放行请求的时间戳，只做放行/拒绝判断，不排队也不等待。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// 默认窗口长度
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// 滑动窗口限流器
///
/// 同一个实例由所有并发调用方共享（通过 `Arc`），锁只在计数期间持有，不跨 await。
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// 创建每分钟最多放行 `max_per_minute` 次的限流器
    pub fn new(max_per_minute: usize) -> Self {
        Self::with_window(max_per_minute, DEFAULT_WINDOW)
    }

    pub fn with_window(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 当前是否还有余量，不修改状态
    pub fn can_admit(&self) -> bool {
        self.remaining() > 0
    }

    /// 记录一次放行
    ///
    /// 每次对外调用只记录一次，重试不重复计数。
    pub fn record_admission(&self) {
        let now = Instant::now();
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);
        timestamps.push_back(now);
    }

    /// 检查并记录，在同一把锁内完成，避免两个调用方同时抢到最后一个名额
    pub fn try_admit(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);
        if timestamps.len() >= self.max_requests {
            debug!(
                "限流拒绝: 窗口内已有 {} 次请求 (上限 {})",
                timestamps.len(),
                self.max_requests
            );
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// 窗口内剩余可用次数
    pub fn remaining(&self) -> usize {
        let now = Instant::now();
        let timestamps = self.lock();
        let active = timestamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count();
        self.max_requests.saturating_sub(active)
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        // 时间戳按插入顺序单调递增，只需从队头弹出
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        self.timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rejects_61st_request_in_window() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            assert!(limiter.can_admit());
            limiter.record_admission();
        }
        assert!(!limiter.can_admit());
        assert!(!limiter.try_admit());
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_again_after_window_rolls() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            limiter.record_admission();
        }
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!limiter.can_admit());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.can_admit());
        assert!(limiter.try_admit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_per_timestamp() {
        let limiter = RateLimiter::new(4);
        limiter.record_admission();
        limiter.record_admission();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.record_admission();
        limiter.record_admission();
        assert_eq!(limiter.remaining(), 0);

        // 前两次过期，后两次仍在窗口内
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(limiter.remaining(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_admit_does_not_consume() {
        let limiter = RateLimiter::new(1);
        for _ in 0..10 {
            assert!(limiter.can_admit());
        }
        assert!(limiter.try_admit());
        assert!(!limiter.try_admit());
    }
}
