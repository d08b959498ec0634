//! message 风格后端（Anthropic Messages API）
//!
//! 非流式调用直接解析 JSON 响应；流式调用解析 SSE，
//! 只转发 `content_block_delta` 事件里的文本片段。

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionBackend, Prompt, TokenSink};
use crate::error::{AppError, AppResult, LlmError};
use crate::models::ProviderConfig;

const BACKEND_NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

/// message 风格后端
pub struct AnthropicBackend {
    http: reqwest::Client,
    endpoint: String,
}

impl AnthropicBackend {
    pub fn new(api_base: &str, connect_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("创建 HTTP 客户端失败，使用默认配置: {}", e);
                reqwest::Client::new()
            });
        Self {
            http,
            endpoint: format!("{}/v1/messages", api_base.trim_end_matches('/')),
        }
    }

    async fn send(
        &self,
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        stream: bool,
    ) -> AppResult<reqwest::Response> {
        let body = MessagesRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system: prompt.system,
            messages: vec![Message {
                role: "user",
                content: prompt.user,
            }],
            stream,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::provider(BACKEND_NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Messages API 返回错误状态 {}", status);
            return Err(status_error(status, &text));
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn complete(&self, prompt: Prompt<'_>, config: &ProviderConfig) -> AppResult<String> {
        debug!("调用 Messages API，模型: {}", config.model);
        let response = self.send(prompt, config, false).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider(BACKEND_NAME, format!("响应解析失败: {}", e)))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent {
                model: config.model.clone(),
            }
            .into());
        }
        Ok(text.trim().to_string())
    }

    async fn complete_stream(
        &self,
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        sink: &TokenSink,
    ) -> AppResult<String> {
        debug!("调用 Messages 流式 API，模型: {}", config.model);
        let response = self.send(prompt, config, true).await?;

        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut full_text = String::new();

        'receive: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| AppError::provider(BACKEND_NAME, e.to_string()))?;
            for event in decoder.push(&chunk) {
                match event? {
                    SseText::Fragment(fragment) => {
                        sink.send_token(&fragment).await;
                        full_text.push_str(&fragment);
                    }
                    SseText::Stop => break 'receive,
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

/// 非 2xx 响应转换为服务商错误，消息里保留状态码以便重试分类
fn status_error(status: StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| format!("{}: {}", e.error.kind, e.error.message))
        .unwrap_or_else(|_| body.to_string());
    AppError::provider(BACKEND_NAME, format!("HTTP {}: {}", status.as_u16(), detail))
}

// ========== 请求/响应结构 ==========

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "is_blank")]
    system: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

fn is_blank(text: &&str) -> bool {
    text.is_empty()
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<SseDelta>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct SseDelta {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

// ========== SSE 解码 ==========

/// 解码后的流式事件
#[derive(Debug, PartialEq, Eq)]
enum SseText {
    Fragment(String),
    Stop,
}

/// 按行缓冲的 SSE 解码器
///
/// 网络分块可能把一行甚至一个 UTF-8 字符切开，所以按字节缓冲，遇到换行才解码。
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<AppResult<SseText>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            if let Some(event) = Self::decode(data.trim()) {
                events.push(event);
            }
        }
        events
    }

    fn decode(data: &str) -> Option<AppResult<SseText>> {
        let event: SseEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                debug!("跳过无法解析的 SSE 数据: {}", e);
                return None;
            }
        };

        match event.kind.as_str() {
            "content_block_delta" => event
                .delta
                .filter(|d| d.kind == "text_delta")
                .and_then(|d| d.text)
                .map(|text| Ok(SseText::Fragment(text))),
            "message_stop" => Some(Ok(SseText::Stop)),
            "error" => {
                let error = event.error.unwrap_or(ErrorBody {
                    kind: "error".to_string(),
                    message: "unknown stream error".to_string(),
                });
                Some(Err(AppError::provider(
                    BACKEND_NAME,
                    format!("{}: {}", error.kind, error.message),
                )))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::collect_stream;
    use crate::clients::test_server::TestServer;
    use crate::models::ProviderKind;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_decoder_extracts_text_deltas() {
        let mut decoder = SseDecoder::default();
        let payload = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"你好\"}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"，同学\"}}\n\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let events: Vec<SseText> = decoder
            .push(payload.as_bytes())
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                SseText::Fragment("你好".to_string()),
                SseText::Fragment("，同学".to_string()),
                SseText::Stop,
            ]
        );
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        let line = "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"光合作用\"}}\n";
        let bytes = line.as_bytes();
        // 在多字节字符中间切开
        let split = line.find('光').unwrap() + 1;
        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events.into_iter().next().unwrap().unwrap(),
            SseText::Fragment("光合作用".to_string())
        );
    }

    #[test]
    fn test_decoder_surfaces_stream_errors() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(
            b"data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n",
        );
        let err = events.into_iter().next().unwrap().unwrap_err();
        assert!(err.to_string().contains("overloaded_error"));
    }

    #[test]
    fn test_status_error_keeps_status_code() {
        let err = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("429"));

        let err = status_error(StatusCode::UNAUTHORIZED, "invalid x-api-key");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_request_omits_empty_system_and_stream_flag() {
        let body = MessagesRequest {
            model: "claude-3-5-sonnet-latest",
            max_tokens: 100,
            temperature: 0.2,
            system: "",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("stream").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    // ========== 请求级测试 ==========

    const PROMPT: Prompt<'static> = Prompt {
        system: "你是阅卷老师",
        user: "请打分",
    };

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            backend: ProviderKind::Anthropic,
            model: "claude-3-5-sonnet-latest".to_string(),
            api_key: "sk-ant-test".to_string(),
            max_tokens: 256,
            temperature: 0.2,
        }
    }

    fn backend_for(server: &TestServer) -> AnthropicBackend {
        AnthropicBackend::new(server.base_url(), Duration::from_secs(5))
    }

    fn delta_line(text: &str) -> String {
        let event = serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text}
        });
        format!("event: content_block_delta\ndata: {}\n\n", event)
    }

    const MESSAGE_START: &str =
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n";
    const MESSAGE_STOP: &str = "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n";

    #[tokio::test]
    async fn test_complete_joins_text_blocks() {
        let body = r#"{"content":[{"type":"text","text":"8"},{"type":"text","text":" 分"}]}"#;
        let server = TestServer::json(200, body).await;
        let text = assert_ok!(backend_for(&server).complete(PROMPT, &provider_config()).await);
        assert_eq!(text, "8 分");

        let request = &server.requests()[0];
        assert!(request.contains("/v1/messages"));
        assert!(request.contains("x-api-key: sk-ant-test"));
        assert!(request.contains("anthropic-version: 2023-06-01"));
    }

    #[tokio::test]
    async fn test_complete_empty_content_is_error() {
        let server = TestServer::json(200, r#"{"content":[]}"#).await;
        let err = assert_err!(backend_for(&server).complete(PROMPT, &provider_config()).await);
        assert!(matches!(err, AppError::Llm(LlmError::EmptyContent { .. })));
    }

    #[tokio::test]
    async fn test_overloaded_and_throttled_are_retryable() {
        for status in [503, 429] {
            let body = r#"{"type":"error","error":{"type":"api_error","message":"try later"}}"#;
            let server = TestServer::json(status, body).await;
            let err =
                assert_err!(backend_for(&server).complete(PROMPT, &provider_config()).await);
            assert!(err.is_retryable(), "HTTP {} 应当可重试", status);
            assert_eq!(server.hits(), 1);
        }
    }

    #[tokio::test]
    async fn test_rejected_key_is_fatal() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"bad key"}}"#;
        let server = TestServer::json(401, body).await;
        let err = assert_err!(backend_for(&server).complete(PROMPT, &provider_config()).await);
        assert!(!err.is_retryable());
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_stream_forwards_deltas_in_order() {
        let body = format!(
            "{}{}{}{}",
            MESSAGE_START,
            delta_line("论点 "),
            delta_line("清晰"),
            MESSAGE_STOP
        );
        let server = TestServer::sse(body).await;
        let (sink, rx) = TokenSink::channel(16);

        let text = assert_ok!(
            backend_for(&server)
                .complete_stream(PROMPT, &provider_config(), &sink)
                .await
        );
        drop(sink);
        let (tokens, _) = collect_stream(rx).await;

        assert_eq!(text, "论点 清晰");
        assert_eq!(tokens, vec!["论点 ", "清晰"]);
        assert!(server.requests()[0].contains("\"stream\":true"));
    }

    #[tokio::test]
    async fn test_stream_without_text_is_error() {
        let server = TestServer::sse(format!("{}{}", MESSAGE_START, MESSAGE_STOP)).await;
        let (sink, _rx) = TokenSink::channel(16);
        let err = assert_err!(
            backend_for(&server)
                .complete_stream(PROMPT, &provider_config(), &sink)
                .await
        );
        assert!(matches!(err, AppError::Llm(LlmError::EmptyContent { .. })));
        assert_eq!(sink.forwarded(), 0);
    }
}
