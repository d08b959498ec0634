//! LLM 服务商配置

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, ConfigError};

/// 后端类型
///
/// - `OpenAi`: chat-completion 风格（兼容 OpenAI API 的服务）
/// - `Anthropic`: message 风格（Anthropic Messages API）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// 未显式配置模型时使用的默认模型
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "chat" | "chat-completion" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" | "message" => Ok(ProviderKind::Anthropic),
            other => Err(ConfigError::UnknownProvider {
                value: other.to_string(),
            }
            .into()),
        }
    }
}

/// 单次请求的生效配置
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub backend: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 单次调用的配置覆盖项，未设置的字段沿用进程级默认值
///
/// 后端在启动时确定，不能按调用覆盖。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfigOverride {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ProviderConfigOverride {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }
}

impl ProviderConfig {
    /// 将覆盖项合并到默认配置上，得到本次调用的生效配置
    pub fn merged(&self, overrides: Option<&ProviderConfigOverride>) -> ProviderConfig {
        let mut effective = self.clone();
        if let Some(o) = overrides {
            if let Some(model) = &o.model {
                effective.model = model.clone();
            }
            if let Some(api_key) = &o.api_key {
                effective.api_key = api_key.clone();
            }
            if let Some(max_tokens) = o.max_tokens {
                effective.max_tokens = max_tokens;
            }
            if let Some(temperature) = o.temperature {
                effective.temperature = temperature;
            }
        }
        effective
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ProviderConfig {
        ProviderConfig {
            backend: ProviderKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key: "sk-test".to_string(),
            max_tokens: 2048,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_merge_keeps_defaults_without_override() {
        assert_eq!(base().merged(None), base());
    }

    #[test]
    fn test_merge_applies_only_set_fields() {
        let overrides = ProviderConfigOverride {
            model: Some("gpt-4o".to_string()),
            temperature: Some(0.0),
            ..Default::default()
        };
        let merged = base().merged(Some(&overrides));
        assert_eq!(merged.model, "gpt-4o");
        assert_eq!(merged.temperature, 0.0);
        assert_eq!(merged.api_key, "sk-test");
        assert_eq!(merged.max_tokens, 2048);
    }

    #[test]
    fn test_blank_credential_is_missing() {
        let overrides = ProviderConfigOverride {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!base().merged(Some(&overrides)).has_credential());
    }

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("gemini".parse::<ProviderKind>().is_err());
    }
}
