//! LLM 调用服务 - 业务能力层
//!
//! 所有 LLM 请求的唯一入口，按顺序完成：
//! 1. 合并默认配置与本次调用的覆盖项
//! 2. 校验密钥（缺失直接失败，不重试）
//! 3. 限流放行（超限直接失败，不排队）
//! 4. 在超时和重试保护下调用后端
//!
//! 调用方感知不到具体是哪个后端在处理请求。

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::clients::{build_backend, CompletionBackend, Prompt, TokenSink};
use crate::config::Config;
use crate::error::{AppResult, ConfigError, LlmError};
use crate::infrastructure::{RateLimiter, RetryPolicy};
use crate::models::{ProviderConfig, ProviderConfigOverride};

/// LLM 调用服务
///
/// 克隆开销很小，克隆出的实例共享同一个限流器和后端。
#[derive(Clone)]
pub struct LlmService {
    backend: Arc<dyn CompletionBackend>,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    defaults: ProviderConfig,
    request_timeout: Duration,
}

impl LlmService {
    /// 按配置创建服务
    pub fn new(config: &Config) -> Self {
        Self::with_backend(config, build_backend(config))
    }

    /// 使用指定后端创建服务，其余参数取自配置
    pub fn with_backend(config: &Config, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit_per_minute)),
            retry: config.retry_policy(),
            defaults: config.provider_config(),
            request_timeout: config.request_timeout(),
        }
    }

    /// 替换限流器，例如让多个服务共享同一份额度
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn defaults(&self) -> &ProviderConfig {
        &self.defaults
    }

    /// 发起一次补全
    ///
    /// # 参数
    /// - `system_prompt`: 系统消息
    /// - `user_prompt`: 用户消息
    /// - `overrides`: 本次调用的配置覆盖项（可选）
    /// - `sink`: 流式输出通道（可选），提供时以流式方式调用
    ///
    /// # 错误
    /// - 缺少密钥：`ConfigError::MissingCredential`
    /// - 超出限流：`LlmError::RateLimited`
    /// - 服务商瞬时故障在重试用尽后返回最后一次的错误
    pub async fn create_completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        overrides: Option<&ProviderConfigOverride>,
        sink: Option<&TokenSink>,
    ) -> AppResult<String> {
        let config = self.defaults.merged(overrides);

        if !config.has_credential() {
            return Err(ConfigError::MissingCredential {
                backend: config.backend.to_string(),
            }
            .into());
        }

        if !self.rate_limiter.try_admit() {
            warn!(
                "⚠️ 已达到限流上限 ({} 次/{:?})，拒绝请求",
                self.rate_limiter.max_requests(),
                self.rate_limiter.window()
            );
            return Err(LlmError::RateLimited {
                limit: self.rate_limiter.max_requests(),
                window_secs: self.rate_limiter.window().as_secs(),
            }
            .into());
        }

        debug!(
            "调用 LLM，后端: {}，模型: {}，流式: {}，用户消息长度: {} 字符",
            self.backend.name(),
            config.model,
            sink.is_some(),
            user_prompt.len()
        );

        let prompt = Prompt {
            system: system_prompt,
            user: user_prompt,
        };
        let config = &config;
        let text = self
            .retry
            .run(move |_| self.attempt(prompt, config, sink))
            .await?;

        if let Some(sink) = sink {
            sink.finish(&text).await;
        }
        Ok(text)
    }

    /// 通用的非流式调用
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        self.create_completion(system_message.unwrap_or_default(), user_message, None, None)
            .await
    }

    /// 单次调用尝试，带超时
    async fn attempt(
        &self,
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        sink: Option<&TokenSink>,
    ) -> AppResult<String> {
        let forwarded_before = sink.map(|s| s.forwarded()).unwrap_or(0);

        let call = async {
            match sink {
                Some(sink) => self.backend.complete_stream(prompt, config, sink).await,
                None => self.backend.complete(prompt, config).await,
            }
        };

        let result = match timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                backend: self.backend.name().to_string(),
                secs: self.request_timeout.as_secs(),
            }
            .into()),
        };

        // 已经有片段送到调用方时不能重试，否则调用方会收到重复内容
        match (result, sink) {
            (Err(e), Some(sink)) if sink.forwarded() > forwarded_before => {
                Err(LlmError::StreamInterrupted {
                    forwarded: sink.forwarded() - forwarded_before,
                    message: e.to_string(),
                }
                .into())
            }
            (result, _) => result,
        }
    }
}
