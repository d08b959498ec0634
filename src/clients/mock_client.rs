//! 测试用后端，不发起任何网络请求
//!
//! 通过闭包决定每次调用的返回内容，可选地模拟延迟，
//! 并记录调用次数、最大并发数等信息供测试断言。

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{CompletionBackend, Prompt, TokenSink};
use crate::error::AppResult;
use crate::models::ProviderConfig;

type Handler = dyn Fn(&MockCall) -> AppResult<String> + Send + Sync;
type Latency = dyn Fn(&MockCall) -> Duration + Send + Sync;

/// 一次调用的记录
#[derive(Debug, Clone)]
pub struct MockCall {
    /// 调用序号（从 0 开始，按开始时间排序）
    pub index: usize,
    pub system: String,
    pub user: String,
    pub model: String,
    /// 本次调用开始时已经完成的调用数
    pub completed_before: usize,
    pub streaming: bool,
}

/// 测试用后端
pub struct MockBackend {
    handler: Box<Handler>,
    latency: Option<Box<Latency>>,
    started: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: Mutex<Vec<MockCall>>,
}

impl MockBackend {
    pub fn new(handler: impl Fn(&MockCall) -> AppResult<String> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            latency: None,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 每次都返回同样的文本
    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// 按调用内容模拟响应延迟
    pub fn with_latency(
        mut self,
        latency: impl Fn(&MockCall) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.latency = Some(Box::new(latency));
        self
    }

    pub fn call_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    async fn invoke(
        &self,
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        streaming: bool,
    ) -> AppResult<String> {
        let call = MockCall {
            index: self.started.fetch_add(1, Ordering::SeqCst),
            system: prompt.system.to_string(),
            user: prompt.user.to_string(),
            model: config.model.clone(),
            completed_before: self.completed.load(Ordering::SeqCst),
            streaming,
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(&call)).await;
        }
        let result = (self.handler)(&call);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, prompt: Prompt<'_>, config: &ProviderConfig) -> AppResult<String> {
        self.invoke(prompt, config, false).await
    }

    async fn complete_stream(
        &self,
        prompt: Prompt<'_>,
        config: &ProviderConfig,
        sink: &TokenSink,
    ) -> AppResult<String> {
        let text = self.invoke(prompt, config, true).await?;
        // 按空白切分成片段，保留分隔符，拼接后与原文一致
        for fragment in text.split_inclusive(char::is_whitespace) {
            sink.send_token(fragment).await;
        }
        Ok(text)
    }
}
