//! chat-completion 风格后端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）均可通过 `api_base` 接入
//! - 关闭客户端自带的退避重试，每次调用只发一次请求，重试由 `RetryPolicy` 统一负责

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionBackend, Prompt, TokenSink};
use crate::error::{AppError, AppResult, LlmError};
use crate::models::ProviderConfig;

const BACKEND_NAME: &str = "openai";

/// chat-completion 风格后端
pub struct OpenAiBackend {
    api_base: String,
    default_api_key: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiBackend {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        Self {
            api_base: api_base.to_string(),
            default_api_key: api_key.to_string(),
            client: Self::build_client(api_base, api_key),
        }
    }

    fn build_client(api_base: &str, api_key: &str) -> Client<OpenAIConfig> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        // 最长重试时间为 0：第一次失败就返回
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Client::with_config(openai_config).with_backoff(no_retry)
    }

    /// 调用方覆盖了密钥时临时创建客户端，否则复用默认客户端
    fn client_for(&self, api_key: &str) -> Client<OpenAIConfig> {
        if api_key == self.default_api_key {
            self.client.clone()
        } else {
            Self::build_client(&self.api_base, api_key)
        }
    }

    fn build_request(
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        stream: bool,
    ) -> AppResult<CreateChatCompletionRequest> {
        let mut messages = Vec::new();

        if !prompt.system.is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system)
                .build()
                .map_err(provider_error)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.user)
            .build()
            .map_err(provider_error)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&config.model)
            .messages(messages)
            .temperature(config.temperature)
            .max_tokens(config.max_tokens);
        if stream {
            args.stream(true);
        }
        args.build().map_err(provider_error)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn complete(&self, prompt: Prompt<'_>, config: &ProviderConfig) -> AppResult<String> {
        debug!("调用 chat-completion API，模型: {}", config.model);
        let request = Self::build_request(prompt, config, false)?;

        let response = self
            .client_for(&config.api_key)
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                api_error(e)
            })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: config.model.clone(),
            })?;

        debug!("LLM API 调用成功，响应长度: {} 字符", content.len());
        Ok(content.trim().to_string())
    }

    async fn complete_stream(
        &self,
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        sink: &TokenSink,
    ) -> AppResult<String> {
        debug!("调用 chat-completion 流式 API，模型: {}", config.model);
        let request = Self::build_request(prompt, config, true)?;

        let mut stream = self
            .client_for(&config.api_key)
            .chat()
            .create_stream(request)
            .await
            .map_err(api_error)?;

        let mut full_text = String::new();
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| {
                warn!("流式响应出错: {}", e);
                api_error(e)
            })?;
            for choice in chunk.choices {
                if let Some(fragment) = choice.delta.content {
                    sink.send_token(&fragment).await;
                    full_text.push_str(&fragment);
                }
            }
        }

        if full_text.trim().is_empty() {
            return Err(LlmError::EmptyContent {
                model: config.model.clone(),
            }
            .into());
        }
        Ok(full_text)
    }
}

fn provider_error(err: impl Display) -> AppError {
    AppError::provider(BACKEND_NAME, err.to_string())
}

/// 转换 API 调用错误
///
/// 5xx 响应体不保证是 JSON，客户端只保留原始文本，类型和错误码都为空，
/// 状态码也不再可见，这里统一标记为服务不可用。429 等带错误类型的响应原样保留。
fn api_error(err: OpenAIError) -> AppError {
    match err {
        OpenAIError::ApiError(api) if api.r#type.is_none() && api.code.is_none() => {
            provider_error(format!("Service Unavailable (HTTP 5xx): {}", api.message))
        }
        other => provider_error(other),
    }
}
