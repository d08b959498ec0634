use std::time::Duration;

use crate::infrastructure::RetryPolicy;
use crate::models::{ProviderConfig, ProviderKind};
use crate::orchestrator::DEFAULT_CHUNK_SIZE;

/// 程序配置，启动时从环境变量读取一次，之后只读
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    /// 使用的后端（openai / anthropic）
    pub llm_provider: ProviderKind,
    pub openai_api_key: String,
    pub openai_api_base_url: String,
    pub anthropic_api_key: String,
    pub anthropic_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    // --- 调用控制 ---
    /// 每分钟允许发出的请求数
    pub rate_limit_per_minute: usize,
    /// 单次调用的最大尝试次数（含首次）
    pub max_retries: u32,
    /// 重试基础延迟（毫秒），第 n 次重试等待 base * 2^n
    pub retry_base_delay_ms: u64,
    /// 单次调用超时（秒）
    pub request_timeout_secs: u64,
    /// 批量批改时每批并发数
    pub batch_chunk_size: usize,
    // --- 运行 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 默认批量批改文件
    pub batch_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: ProviderKind::OpenAi,
            openai_api_key: String::new(),
            openai_api_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_api_key: String::new(),
            anthropic_api_base_url: "https://api.anthropic.com".to_string(),
            llm_model_name: ProviderKind::OpenAi.default_model().to_string(),
            llm_max_tokens: 2048,
            llm_temperature: 0.3,
            rate_limit_per_minute: 60,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 120,
            batch_chunk_size: DEFAULT_CHUNK_SIZE,
            verbose_logging: false,
            batch_file: "batch.toml".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let llm_provider = std::env::var("LLM_PROVIDER").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_provider);
        Self {
            llm_provider,
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(default.openai_api_key),
            openai_api_base_url: std::env::var("OPENAI_API_BASE_URL").unwrap_or(default.openai_api_base_url),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or(default.anthropic_api_key),
            anthropic_api_base_url: std::env::var("ANTHROPIC_API_BASE_URL").unwrap_or(default.anthropic_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or_else(|_| llm_provider.default_model().to_string()),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_tokens),
            llm_temperature: std::env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_temperature),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_per_minute),
            max_retries: std::env::var("LLM_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            retry_base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_base_delay_ms),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            batch_chunk_size: std::env::var("BATCH_CHUNK_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.batch_chunk_size),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            batch_file: std::env::var("BATCH_FILE").unwrap_or(default.batch_file),
        }
    }

    /// 进程级默认请求配置
    pub fn provider_config(&self) -> ProviderConfig {
        let api_key = match self.llm_provider {
            ProviderKind::OpenAi => self.openai_api_key.clone(),
            ProviderKind::Anthropic => self.anthropic_api_key.clone(),
        };
        ProviderConfig {
            backend: self.llm_provider,
            model: self.llm_model_name.clone(),
            api_key,
            max_tokens: self.llm_max_tokens,
            temperature: self.llm_temperature,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_picks_matching_key() {
        let config = Config {
            llm_provider: ProviderKind::Anthropic,
            openai_api_key: "sk-openai".to_string(),
            anthropic_api_key: "sk-ant".to_string(),
            llm_model_name: "claude-3-5-haiku-latest".to_string(),
            ..Default::default()
        };
        let provider = config.provider_config();
        assert_eq!(provider.backend, ProviderKind::Anthropic);
        assert_eq!(provider.api_key, "sk-ant");
        assert_eq!(provider.model, "claude-3-5-haiku-latest");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rate_limit_per_minute, 60);
        assert_eq!(config.batch_chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(DEFAULT_CHUNK_SIZE, 5);
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert!(!config.provider_config().has_credential());
    }
}
