//! LLM 后端适配层
//!
//! 两种后端（chat-completion 风格、message 风格）实现同一个 `CompletionBackend`，
//! 启动时按配置选定一个，上层只依赖这个 trait。

pub mod anthropic_client;
pub mod document_source;
pub mod mock_client;
pub mod openai_client;
pub mod stream;
#[cfg(test)]
mod test_server;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{ProviderConfig, ProviderKind};

pub use anthropic_client::AnthropicBackend;
pub use document_source::{DocumentSource, InMemoryDocumentSource};
pub use mock_client::{MockBackend, MockCall};
pub use openai_client::OpenAiBackend;
pub use stream::{collect_stream, StreamEvent, TokenSink};

/// 一次补全调用的提示词
#[derive(Debug, Clone, Copy)]
pub struct Prompt<'a> {
    pub system: &'a str,
    pub user: &'a str,
}

/// LLM 后端
///
/// 每次调用只做一次请求，重试、限流、超时由上层负责。
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// 后端名称，用于日志和错误信息
    fn name(&self) -> &str;

    /// 非流式调用，返回完整文本
    async fn complete(&self, prompt: Prompt<'_>, config: &ProviderConfig) -> AppResult<String>;

    /// 流式调用，片段按到达顺序发送到 `sink`，返回拼接后的完整文本
    async fn complete_stream(
        &self,
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        sink: &TokenSink,
    ) -> AppResult<String>;
}

/// 按配置创建后端
pub fn build_backend(config: &Config) -> Arc<dyn CompletionBackend> {
    match config.llm_provider {
        ProviderKind::OpenAi => Arc::new(OpenAiBackend::new(
            &config.openai_api_base_url,
            &config.openai_api_key,
        )),
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::new(
            &config.anthropic_api_base_url,
            config.request_timeout(),
        )),
    }
}
