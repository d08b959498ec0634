//! 基础设施层：与业务无关的调用控制能力

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::RateLimiter;
pub use retry::{with_retry, RetryPolicy};
