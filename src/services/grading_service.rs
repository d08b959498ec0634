//! 主观题批改服务 - 业务能力层
//!
//! 只负责"批改一篇作答"，不关心批量和并发。
//! 模型给出的分数一律不直接信任：总分夹到 `[0, 满分]`，
//! 每条评分标准的得分夹到 `[0, 该条满分]`，置信度夹到 `[0, 1]`。

use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AppResult, GradingError};
use crate::models::{
    EssayGradingRequest, EssayGradingResult, GradingFeedback, ProviderConfigOverride, RubricScore,
};
use crate::services::output_parser::parse_json_object;
use crate::services::LlmService;
use crate::utils::logging::truncate_text;

/// 批改时使用较低温度，减少同一作答多次批改的波动
const GRADING_TEMPERATURE: f32 = 0.2;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// 主观题批改服务
#[derive(Clone)]
pub struct GradingService {
    llm: LlmService,
}

impl GradingService {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &LlmService {
        &self.llm
    }

    /// 批改单篇作答
    ///
    /// # 错误
    /// - 满分不大于 0：`GradingError::InvalidMaxPoints`（不会发起调用）
    /// - 模型输出无法解析：`LlmError::MalformedModelOutput`（不重试）
    pub async fn grade_essay(
        &self,
        request: &EssayGradingRequest,
    ) -> AppResult<EssayGradingResult> {
        if !request.has_valid_max_points() {
            return Err(GradingError::InvalidMaxPoints {
                question_id: request.question_id.clone(),
                max_points: request.max_points,
            }
            .into());
        }

        let start = Instant::now();
        debug!(
            "批改题目 {}，作答: {}",
            request.question_id,
            truncate_text(&request.answer, 40)
        );

        let (user_message, system_message) = build_grading_messages(request);
        let overrides = ProviderConfigOverride::with_temperature(GRADING_TEMPERATURE);
        let response = self
            .llm
            .create_completion(&system_message, &user_message, Some(&overrides), None)
            .await?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        let result = parse_grading_response(&response, request, processing_time_ms)?;

        info!(
            "✓ 题目 {} 批改完成: {}/{} (置信度 {:.2})",
            result.question_id, result.suggested_score, result.max_points, result.confidence
        );
        Ok(result)
    }
}

/// 构建批改消息
///
/// 返回 (user_message, system_message)
pub fn build_grading_messages(request: &EssayGradingRequest) -> (String, String) {
    let subject = request.subject.as_deref().unwrap_or("学科");
    let system_message = format!(
        "你是一位经验丰富的{}教师，负责严格按照评分标准批改学生的主观题作答。\
         评分要客观、一致，只输出 JSON，不要输出任何其他内容。",
        subject
    );

    let rubric = if request.rubric.is_empty() {
        "  （未提供评分标准，请根据题目要求综合评分）".to_string()
    } else {
        request
            .rubric
            .iter()
            .enumerate()
            .map(|(i, criterion)| format!("  {}. {}", i + 1, criterion))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let grade_level = request
        .grade_level
        .as_deref()
        .map(|g| format!("年级：{}\n", g))
        .unwrap_or_default();

    let user_message = format!(
        r#"请批改下面的学生作答。

{}题目：
{}

评分标准：
{}

满分：{}

学生作答：
{}

请按以下 JSON 格式返回：
{{
  "suggestedScore": 数字（0 到 {} 之间）,
  "confidence": 数字（0 到 1 之间，表示你对评分的把握）,
  "feedback": {{
    "strengths": ["优点"],
    "improvements": ["改进建议"],
    "overallComment": "总体评语"
  }},
  "rubricScores": [
    {{"criterion": "评分标准原文", "score": 数字, "maxScore": 数字, "comment": "说明"}}
  ]
}}"#,
        grade_level,
        request.question,
        rubric,
        request.max_points,
        request.answer,
        request.max_points
    );

    (user_message, system_message)
}

/// 解析批改响应并夹紧所有分数
pub fn parse_grading_response(
    response: &str,
    request: &EssayGradingRequest,
    processing_time_ms: u64,
) -> AppResult<EssayGradingResult> {
    let raw: RawGrading = parse_json_object(response)?;

    let rubric_scores = raw
        .rubric_scores
        .into_iter()
        .map(|r| {
            let max_score = r.max_score.max(0.0);
            RubricScore {
                criterion: r.criterion,
                score: clamp_score(r.score, max_score),
                max_score,
                comment: r.comment,
            }
        })
        .collect();

    Ok(EssayGradingResult {
        question_id: request.question_id.clone(),
        suggested_score: clamp_score(raw.suggested_score, request.max_points),
        max_points: request.max_points,
        confidence: raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
        feedback: GradingFeedback {
            strengths: raw.feedback.strengths,
            improvements: raw.feedback.improvements,
            overall_comment: raw.feedback.overall_comment,
        },
        rubric_scores,
        processing_time_ms,
    })
}

/// 把分数夹到 `[0, max]`
pub fn clamp_score(score: f64, max: f64) -> f64 {
    score.max(0.0).min(max.max(0.0))
}

// ========== 模型输出结构 ==========

#[derive(Deserialize)]
struct RawGrading {
    #[serde(alias = "suggestedScore")]
    suggested_score: f64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    feedback: RawFeedback,
    #[serde(default, alias = "rubricScores")]
    rubric_scores: Vec<RawRubricScore>,
}

#[derive(Deserialize, Default)]
struct RawFeedback {
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default, alias = "overallComment")]
    overall_comment: String,
}

#[derive(Deserialize)]
struct RawRubricScore {
    #[serde(default)]
    criterion: String,
    score: f64,
    #[serde(alias = "maxScore")]
    max_score: f64,
    #[serde(default)]
    comment: String,
}
