//! 从模型的自由文本响应中提取 JSON
//!
//! 模型经常在 JSON 前后附加说明文字或 Markdown 代码块，
//! 这里先找代码块，再退回到第一个开括号和最后一个闭括号之间的内容。
//! 提取或反序列化失败统一返回 `MalformedModelOutput`。

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("静态正则表达式合法")
    })
}

/// 提取 JSON 对象文本
pub fn extract_json_object(response: &str) -> AppResult<&str> {
    extract_delimited(response, '{', '}')
        .ok_or_else(|| AppError::malformed_output("响应中没有 JSON 对象", response))
}

/// 提取 JSON 数组文本
pub fn extract_json_array(response: &str) -> AppResult<&str> {
    extract_delimited(response, '[', ']')
        .ok_or_else(|| AppError::malformed_output("响应中没有 JSON 数组", response))
}

/// 提取并反序列化 JSON 对象
pub fn parse_json_object<T: DeserializeOwned>(response: &str) -> AppResult<T> {
    let json = extract_json_object(response)?;
    serde_json::from_str(json)
        .map_err(|e| AppError::malformed_output(format!("JSON 结构不符合预期: {}", e), response))
}

/// 提取并反序列化 JSON 数组
pub fn parse_json_array<T: DeserializeOwned>(response: &str) -> AppResult<Vec<T>> {
    let json = extract_json_array(response)?;
    serde_json::from_str(json)
        .map_err(|e| AppError::malformed_output(format!("JSON 结构不符合预期: {}", e), response))
}

fn extract_delimited(response: &str, open: char, close: char) -> Option<&str> {
    let body = fenced_block()
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|inner| inner.contains(open))
        .unwrap_or(response);

    let start = body.find(open)?;
    let end = body.rfind(close)?;
    (end > start).then(|| body[start..=end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Score {
        score: f64,
    }

    #[test]
    fn test_plain_object() {
        let parsed: Score = parse_json_object(r#"{"score": 7.5}"#).unwrap();
        assert_eq!(parsed, Score { score: 7.5 });
    }

    #[test]
    fn test_object_with_surrounding_text() {
        let response = "好的，以下是批改结果：\n{\"score\": 6}\n希望对你有帮助。";
        let parsed: Score = parse_json_object(response).unwrap();
        assert_eq!(parsed.score, 6.0);
    }

    #[test]
    fn test_fenced_block_wins() {
        let response = "说明 {不是json}\n```json\n{\"score\": 9}\n```\n";
        let parsed: Score = parse_json_object(response).unwrap();
        assert_eq!(parsed.score, 9.0);
    }

    #[test]
    fn test_array_extraction() {
        let parsed: Vec<Score> =
            parse_json_array("```\n[{\"score\": 1}, {\"score\": 2}]\n```").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_missing_json_is_malformed() {
        let err = parse_json_object::<Score>("抱歉，我无法批改这篇作答。").unwrap_err();
        assert!(err.is_malformed_output());
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = parse_json_object::<Score>(r#"{"grade": "A"}"#).unwrap_err();
        assert!(err.is_malformed_output());
        assert!(!err.is_retryable());
    }
}
