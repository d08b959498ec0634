//! 指数退避重试

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::AppResult;

/// 重试策略
///
/// 无状态，可在多次调用之间复用。第 `n` 次重试前等待 `base_delay * 2^n`，不加抖动。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// 第 `attempt_index` 次失败后的等待时间（从 0 开始）
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }

    /// 执行 `operation`，遇到可重试错误时退避重试
    ///
    /// `operation` 每次只做一次调用尝试，参数为当前尝试序号（从 0 开始）。
    /// 不可重试的错误立即返回；重试次数用尽后返回最后一次的错误。
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> AppResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "⚠️ 调用失败 (尝试 {}/{})，{:?} 后重试: {}",
                        attempt + 1,
                        max_attempts,
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 使用默认退避间隔执行重试
pub async fn with_retry<T, F, Fut>(operation: F, max_attempts: u32) -> AppResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    RetryPolicy {
        max_attempts,
        ..Default::default()
    }
    .run(operation)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, LlmError};
    use std::sync::Mutex;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    fn transient() -> AppError {
        AppError::provider("openai", "HTTP 503: service unavailable")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_error_exhausts_attempts_with_doubling_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let start = Instant::now();
        let attempt_times = Mutex::new(Vec::new());

        let result: AppResult<()> = policy
            .run(|_| {
                attempt_times.lock().unwrap().push(start.elapsed());
                async { Err(transient()) }
            })
            .await;

        let err = assert_err!(result);
        assert!(matches!(err, AppError::Llm(LlmError::Provider { .. })));

        let times = attempt_times.into_inner().unwrap();
        // 1 次首次调用 + 2 次重试
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], Duration::ZERO);
        assert_eq!(times[1] - times[0], Duration::from_millis(100));
        assert_eq!(times[2] - times[1], Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_short_circuits() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let calls = Mutex::new(0u32);
        let start = Instant::now();

        let result: AppResult<()> = policy
            .run(|_| {
                *calls.lock().unwrap() += 1;
                async { Err(AppError::provider("openai", "HTTP 401: invalid api key")) }
            })
            .await;

        assert_err!(result);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let result = policy
            .run(|attempt| async move {
                if attempt == 0 {
                    Err(AppError::provider("anthropic", "HTTP 429: rate_limit_error"))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(assert_ok!(result), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_zero_attempts_still_calls_once() {
        let calls = Mutex::new(0u32);
        let result: AppResult<()> = with_retry(
            |_| {
                *calls.lock().unwrap() += 1;
                async { Err(transient()) }
            },
            0,
        )
        .await;
        assert_err!(result);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(4, Duration::from_millis(500));
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    }
}
