//! 评分校准
//!
//! 用一组已有人工评分的样本走一遍正常批改流程，比较人工分与模型分，
//! 给出校准系数和调整评分标准的建议。只做诊断，不会自动修改分数。

use tracing::{info, warn};

use crate::error::{AppResult, GradingError};
use crate::models::{CalibrationParams, CalibrationResult, EssayGradingRequest};
use crate::services::GradingService;

/// 平均差超过满分的该比例时给出方向性建议
pub const RECOMMENDATION_RATIO: f64 = 0.1;
/// 单个样本差值超过满分的该比例时单独提示
pub const OUTLIER_RATIO: f64 = 0.2;

const CALIBRATION_QUESTION_ID: &str = "calibration";

/// 评分校准服务
#[derive(Clone)]
pub struct CalibrationService {
    grading: GradingService,
}

impl CalibrationService {
    pub fn new(grading: GradingService) -> Self {
        Self { grading }
    }

    /// 逐个批改样本并计算校准结果
    pub async fn calibrate(&self, params: &CalibrationParams) -> AppResult<CalibrationResult> {
        if params.samples.is_empty() {
            return Err(GradingError::EmptyCalibrationSamples.into());
        }

        info!("🎯 开始评分校准，样本数: {}", params.samples.len());

        let mut pairs = Vec::with_capacity(params.samples.len());
        for (idx, sample) in params.samples.iter().enumerate() {
            let request = EssayGradingRequest {
                question_id: format!("{}-{}", CALIBRATION_QUESTION_ID, idx + 1),
                question: params.question.clone(),
                answer: sample.answer.clone(),
                rubric: params.rubric.clone(),
                max_points: params.max_points,
                grade_level: None,
                subject: None,
            };
            let result = self.grading.grade_essay(&request).await?;
            pairs.push((sample.human_score, result.suggested_score));
        }

        let result = compute_calibration(params.max_points, &pairs);
        info!(
            "✓ 校准完成: 系数 {:.3}，平均差 {:.2}",
            result.calibration_factor, result.average_difference
        );
        Ok(result)
    }
}

/// 根据 (人工分, 模型分) 计算校准结果
///
/// `average_difference = mean(人工分 - 模型分)`，
/// `calibration_factor = 1 + average_difference / max_points`。
pub fn compute_calibration(max_points: f64, pairs: &[(f64, f64)]) -> CalibrationResult {
    if pairs.is_empty() || max_points <= 0.0 {
        return CalibrationResult {
            calibration_factor: 1.0,
            average_difference: 0.0,
            recommendations: Vec::new(),
        };
    }

    let diffs: Vec<f64> = pairs.iter().map(|(human, model)| human - model).collect();
    let average_difference = diffs.iter().sum::<f64>() / diffs.len() as f64;
    let calibration_factor = 1.0 + average_difference / max_points;

    let mut recommendations = Vec::new();
    if average_difference.abs() > max_points * RECOMMENDATION_RATIO {
        if average_difference > 0.0 {
            recommendations.push(format!(
                "AI 评分平均比人工低 {:.1} 分，建议细化评分标准，明确各得分点的给分条件",
                average_difference
            ));
        } else {
            recommendations.push(format!(
                "AI 评分平均比人工高 {:.1} 分，建议收紧评分标准，明确扣分条件",
                average_difference.abs()
            ));
        }
        warn!("⚠️ AI 评分存在系统性偏差: 平均差 {:.2}", average_difference);
    }

    let outliers = diffs
        .iter()
        .filter(|d| d.abs() > max_points * OUTLIER_RATIO)
        .count();
    if outliers > 0 {
        recommendations.push(format!(
            "有 {} 个样本的人工分与 AI 分相差超过满分的 {:.0}%，建议逐一复核这些样本",
            outliers,
            OUTLIER_RATIO * 100.0
        ));
    }

    if recommendations.is_empty() {
        recommendations.push("AI 评分与人工评分基本一致，无需调整评分标准".to_string());
    }

    CalibrationResult {
        calibration_factor,
        average_difference,
        recommendations,
    }
}
