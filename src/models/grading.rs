use serde::{Deserialize, Serialize};

/// 单篇作答的批改请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssayGradingRequest {
    pub question_id: String,
    pub question: String,
    pub answer: String,
    /// 评分标准，按顺序列出每条得分点
    #[serde(default)]
    pub rubric: Vec<String>,
    pub max_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl EssayGradingRequest {
    /// 满分必须是大于 0 的有限数
    pub fn has_valid_max_points(&self) -> bool {
        self.max_points.is_finite() && self.max_points > 0.0
    }
}

/// 单条评分标准的得分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    pub criterion: String,
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub comment: String,
}

/// 批改反馈
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingFeedback {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub overall_comment: String,
}

/// 单篇作答的批改结果
///
/// `suggested_score` 始终落在 `[0, max_points]` 内，`confidence` 始终落在 `[0, 1]` 内。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayGradingResult {
    pub question_id: String,
    pub suggested_score: f64,
    pub max_points: f64,
    pub confidence: f64,
    pub feedback: GradingFeedback,
    pub rubric_scores: Vec<RubricScore>,
    pub processing_time_ms: u64,
}

/// 批量批改请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchGradingRequest {
    pub essays: Vec<EssayGradingRequest>,
    /// 批改完成后是否执行一致性检查
    #[serde(default)]
    pub consistency_check: bool,
}

/// 批量批改统计信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub total_essays: usize,
    pub average_score: f64,
    pub processing_time_ms: u64,
}

/// 批量批改结果，`results[i]` 对应 `essays[i]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchGradingResult {
    pub results: Vec<EssayGradingResult>,
    pub metadata: BatchMetadata,
    #[serde(default)]
    pub consistency_reports: Vec<ConsistencyReport>,
}

impl BatchGradingResult {
    /// 是否存在被标记的题目，需要人工复核后再发布成绩
    pub fn needs_review(&self) -> bool {
        self.consistency_reports.iter().any(|r| r.flagged)
    }
}

/// 同一道题多份作答的评分一致性报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub question_id: String,
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std_deviation: f64,
    pub max_points: f64,
    /// 标准差超过满分的 20% 时标记
    pub flagged: bool,
}

/// 校准样本：一份作答及其人工评分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub answer: String,
    pub human_score: f64,
}

/// 校准参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub question: String,
    #[serde(default)]
    pub rubric: Vec<String>,
    pub max_points: f64,
    pub samples: Vec<CalibrationSample>,
}

/// 校准结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub calibration_factor: f64,
    /// 人工评分减去模型评分的平均值
    pub average_difference: f64,
    pub recommendations: Vec<String>,
}
