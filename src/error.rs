use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 调用错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 批改业务错误
    #[error("批改错误: {0}")]
    Grading(#[from] GradingError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 文档来源错误
    #[error("文档读取失败 ({document_id}): {message}")]
    Document {
        document_id: String,
        message: String,
    },
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 本地限流：窗口内请求数已达上限（不重试）
    #[error("rate limit exceeded: 已达到每 {window_secs} 秒 {limit} 次的请求上限")]
    RateLimited { limit: usize, window_secs: u64 },
    /// 服务商返回的错误（是否可重试由消息内容决定）
    #[error("{backend} 调用失败: {message}")]
    Provider { backend: String, message: String },
    /// 单次调用超时（可重试）
    #[error("{backend} 请求超时 (timeout after {secs}s)")]
    Timeout { backend: String, secs: u64 },
    /// 返回内容为空
    #[error("LLM 返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 流式输出中途失败，已经有片段送达调用方（不重试）
    #[error("流式输出在发送 {forwarded} 个片段后中断: {message}")]
    StreamInterrupted { forwarded: usize, message: String },
    /// 模型输出无法解析为预期结构（不重试）
    #[error("无法解析模型输出: {reason} (响应片段: {excerpt})")]
    MalformedModelOutput { reason: String, excerpt: String },
}

/// 批改业务错误
#[derive(Debug, Error)]
pub enum GradingError {
    /// 满分必须大于 0
    #[error("题目 {question_id} 的满分无效: {max_points}")]
    InvalidMaxPoints { question_id: String, max_points: f64 },
    /// 校准样本为空
    #[error("校准样本不能为空")]
    EmptyCalibrationSamples,
    /// 批量任务异常退出
    #[error("批改任务异常退出: {reason}")]
    TaskPanicked { reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少 API 密钥
    #[error("{backend} 缺少 API 密钥")]
    MissingCredential { backend: String },
    /// 无法识别的服务商
    #[error("无法识别的 LLM 服务商: {value}")]
    UnknownProvider { value: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 错误分类 ==========

/// 判断服务商错误消息是否属于可重试的瞬时故障
///
/// 限流、超时、HTTP 503（含 "service unavailable" 描述）、HTTP 429 视为可重试，
/// 其余一律视为致命错误。
pub fn is_retryable_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("rate limit")
        || message.contains("service unavailable")
        || message.contains("rate_limit")
        || message.contains("timeout")
        || message.contains("timed out")
        || message.contains("503")
        || message.contains("429")
}

impl AppError {
    /// 是否可以安全地自动重试
    ///
    /// 只有服务商错误和超时按消息分类；本地限流、配置错误、输出解析错误永不重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Llm(err @ LlmError::Provider { .. })
            | AppError::Llm(err @ LlmError::Timeout { .. }) => {
                is_retryable_message(&err.to_string())
            }
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::RateLimited { .. }))
    }

    pub fn is_config_invalid(&self) -> bool {
        matches!(self, AppError::Config(_))
    }

    pub fn is_malformed_output(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::MalformedModelOutput { .. }))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建服务商调用错误
    pub fn provider(backend: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Llm(LlmError::Provider {
            backend: backend.into(),
            message: message.into(),
        })
    }

    /// 创建模型输出解析错误，响应内容截断后放入错误信息
    pub fn malformed_output(reason: impl Into<String>, response: &str) -> Self {
        AppError::Llm(LlmError::MalformedModelOutput {
            reason: reason.into(),
            excerpt: crate::utils::logging::truncate_text(response, 120),
        })
    }

    /// 创建文档读取错误
    pub fn document(document_id: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Document {
            document_id: document_id.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON处理失败: {}", err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
