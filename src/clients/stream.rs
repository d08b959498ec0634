//! 流式输出通道
//!
//! 后端每收到一个文本片段就通过 `TokenSink` 按顺序发送给调用方，
//! 调用完成后再发送一次 `Done`，携带完整文本。

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// 流式事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// 一个文本片段
    Token(String),
    /// 输出结束，携带完整文本
    Done(String),
}

/// 流式输出的发送端
///
/// 每次发送都会等待通道有空位，因此片段的送达顺序与接收顺序一致，
/// 前一个片段被放入通道之前不会处理下一个。
#[derive(Debug)]
pub struct TokenSink {
    tx: mpsc::Sender<StreamEvent>,
    forwarded: AtomicUsize,
}

impl TokenSink {
    /// 创建一对发送端和接收端
    pub fn channel(buffer: usize) -> (TokenSink, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            TokenSink {
                tx,
                forwarded: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// 发送一个片段；接收端已关闭时静默丢弃
    pub async fn send_token(&self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.forwarded.fetch_add(1, Ordering::SeqCst);
        if self
            .tx
            .send(StreamEvent::Token(fragment.to_string()))
            .await
            .is_err()
        {
            debug!("流式接收端已关闭，丢弃片段");
        }
    }

    /// 发送结束信号
    pub async fn finish(&self, full_text: &str) {
        if self
            .tx
            .send(StreamEvent::Done(full_text.to_string()))
            .await
            .is_err()
        {
            debug!("流式接收端已关闭，丢弃结束信号");
        }
    }

    /// 已经送出的片段数量
    pub fn forwarded(&self) -> usize {
        self.forwarded.load(Ordering::SeqCst)
    }
}

/// 收集接收端的所有片段，直到 `Done` 或通道关闭
pub async fn collect_stream(mut rx: mpsc::Receiver<StreamEvent>) -> (Vec<String>, Option<String>) {
    let mut tokens = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Token(t) => tokens.push(t),
            StreamEvent::Done(full) => return (tokens, Some(full)),
        }
    }
    (tokens, None)
}
