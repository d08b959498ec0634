//! 测试用本地 HTTP 服务
//!
//! 每个请求都按预设的状态码和响应体应答，并记录请求次数和请求原文，
//! 用于验证后端在真实 HTTP 交互下的行为。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

struct Reply {
    status: u16,
    content_type: &'static str,
    body: String,
}

#[derive(Default)]
struct Recorded {
    hits: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

pub struct TestServer {
    base_url: String,
    recorded: Arc<Recorded>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("绑定本地端口失败");
        let addr = listener.local_addr().expect("读取本地地址失败");

        let reply = Arc::new(Reply {
            status,
            content_type,
            body: body.into(),
        });
        let recorded = Arc::new(Recorded::default());

        let shared = recorded.clone();
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let reply = reply.clone();
                let recorded = shared.clone();
                tokio::spawn(async move {
                    let _ = respond(socket, &reply, &recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            recorded,
            handle,
        }
    }

    /// 返回 JSON 的服务
    pub async fn json(status: u16, body: impl Into<String>) -> Self {
        Self::start(status, "application/json", body).await
    }

    /// 返回 SSE 的服务
    pub async fn sse(body: impl Into<String>) -> Self {
        Self::start(200, "text/event-stream", body).await
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 已收到的完整请求数
    pub fn hits(&self) -> usize {
        self.recorded.hits.load(Ordering::SeqCst)
    }

    /// 已收到请求的原文（请求头 + 请求体）
    pub fn requests(&self) -> Vec<String> {
        self.recorded
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(
    mut socket: TcpStream,
    reply: &Reply,
    recorded: &Recorded,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while request.len() < header_end + content_length {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }

    if let Ok(mut requests) = recorded.requests.lock() {
        requests.push(String::from_utf8_lossy(&request).into_owned());
    }
    recorded.hits.fetch_add(1, Ordering::SeqCst);

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reason_phrase(reply.status),
        reply.content_type,
        reply.body.len(),
        reply.body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
