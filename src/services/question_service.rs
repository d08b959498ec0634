//! 出题服务 - 业务能力层
//!
//! 从文档来源读取文本，按出题参数让模型生成练习题。

use tracing::{info, warn};

use crate::clients::{DocumentSource, TokenSink};
use crate::error::AppResult;
use crate::models::{GeneratedQuestion, GenerationParams};
use crate::services::output_parser::parse_json_array;
use crate::services::LlmService;
use crate::utils::logging::truncate_text;

/// 出题服务
#[derive(Clone)]
pub struct QuestionService {
    llm: LlmService,
}

impl QuestionService {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// 根据文档内容生成题目
    ///
    /// 提供 `sink` 时以流式方式调用，调用方可以边生成边展示。
    /// 返回的题目数量不超过 `params.count`。
    pub async fn generate_questions(
        &self,
        source: &dyn DocumentSource,
        document_id: &str,
        document_type: &str,
        params: &GenerationParams,
        sink: Option<&TokenSink>,
    ) -> AppResult<Vec<GeneratedQuestion>> {
        let text = source.fetch_text(document_id, document_type).await?;
        info!(
            "📄 读取文档 {} 成功，共 {} 字符",
            document_id,
            text.chars().count()
        );

        let (user_message, system_message) = build_generation_messages(&text, params);
        let response = self
            .llm
            .create_completion(&system_message, &user_message, None, sink)
            .await?;

        let mut questions: Vec<GeneratedQuestion> = parse_json_array(&response)?;
        if questions.len() > params.count {
            warn!(
                "模型生成了 {} 道题，超过要求的 {} 道，截断",
                questions.len(),
                params.count
            );
            questions.truncate(params.count);
        }

        info!("✓ 生成 {} 道题目", questions.len());
        Ok(questions)
    }
}

/// 构建出题消息
///
/// 返回 (user_message, system_message)
fn build_generation_messages(document: &str, params: &GenerationParams) -> (String, String) {
    let subject = params.subject.as_deref().unwrap_or("学科");
    let system_message = format!(
        "你是一位{}命题老师，擅长根据教学材料编写考查理解程度的题目。只输出 JSON 数组，不要输出任何其他内容。",
        subject
    );

    let types = params
        .question_types
        .iter()
        .map(|t| format!("{}({})", t.label(), t))
        .collect::<Vec<_>>()
        .join("、");
    let difficulty = params.difficulty.as_deref().unwrap_or("中等");
    let material = truncate_text(document, params.max_document_chars);

    let user_message = format!(
        r#"请根据下面的教学材料出 {} 道题。

题型：{}
难度：{}

教学材料：
{}

请按以下 JSON 数组格式返回，type 只能取括号中的英文值：
[
  {{
    "type": "multiple_choice",
    "question": "题干",
    "options": ["A. ...", "B. ...", "C. ...", "D. ..."],
    "answer": "正确答案",
    "explanation": "解析",
    "points": 分值
  }}
]
非选择题的 options 为空数组。"#,
        params.count, types, difficulty, material
    );

    (user_message, system_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;

    #[test]
    fn test_prompt_truncates_long_documents() {
        let params = GenerationParams {
            max_document_chars: 10,
            ..Default::default()
        };
        let document = "光".repeat(50);
        let (user, _) = build_generation_messages(&document, &params);
        assert!(user.contains(&format!("{}...", "光".repeat(10))));
        assert!(!user.contains(&"光".repeat(11)));
    }

    #[test]
    fn test_prompt_lists_question_types() {
        let params = GenerationParams {
            count: 3,
            question_types: vec![QuestionType::Essay],
            difficulty: Some("困难".to_string()),
            subject: Some("历史".to_string()),
            ..Default::default()
        };
        let (user, system) = build_generation_messages("材料", &params);
        assert!(user.contains("论述题(essay)"));
        assert!(user.contains("出 3 道题"));
        assert!(user.contains("难度：困难"));
        assert!(system.contains("历史"));
    }
}
