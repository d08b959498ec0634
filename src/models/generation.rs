use serde::{Deserialize, Serialize};
use std::fmt;

/// 生成题目的题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "选择题",
            QuestionType::ShortAnswer => "简答题",
            QuestionType::Essay => "论述题",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Essay => "essay",
        };
        f.write_str(key)
    }
}

/// 出题参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub count: usize,
    pub question_types: Vec<QuestionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// 送入模型的文档内容字符上限
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
}

fn default_max_document_chars() -> usize {
    12_000
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            count: 5,
            question_types: vec![QuestionType::MultipleChoice, QuestionType::ShortAnswer],
            difficulty: None,
            subject: None,
            max_document_chars: default_max_document_chars(),
        }
    }
}

/// 模型生成的一道题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default = "default_points")]
    pub points: f64,
}

fn default_points() -> f64 {
    1.0
}
