//! 评分一致性检查
//!
//! 按题目分组，同一道题至少两份结果才参与统计。
//! 标准差（总体标准差）超过该题满分的 20% 时标记，标记只做提示，不拦截结果。

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::models::{ConsistencyReport, EssayGradingRequest, EssayGradingResult};

/// 标准差占满分的比例超过该值即标记
pub const FLAG_RATIO: f64 = 0.2;

/// 检查批量结果的评分一致性
///
/// 满分取自原始请求中同一题目的第一份，请求里找不到时使用结果里的满分。
/// 返回的报告按题目 ID 排序。
pub fn check_consistency(
    results: &[EssayGradingResult],
    original_requests: &[EssayGradingRequest],
) -> Vec<ConsistencyReport> {
    let mut groups: BTreeMap<&str, Vec<&EssayGradingResult>> = BTreeMap::new();
    for result in results {
        groups.entry(result.question_id.as_str()).or_default().push(result);
    }

    let mut reports = Vec::new();
    for (question_id, group) in groups {
        if group.len() < 2 {
            continue;
        }

        let max_points = original_requests
            .iter()
            .find(|r| r.question_id == question_id)
            .map(|r| r.max_points)
            .unwrap_or(group[0].max_points);

        let scores: Vec<f64> = group.iter().map(|r| r.suggested_score).collect();
        let report = build_report(question_id, scores, max_points);

        if report.flagged {
            warn!(
                "⚠️ 题目 {} 评分波动过大: 平均 {:.2}，标准差 {:.2} (满分 {})，建议人工复核",
                report.question_id, report.mean, report.std_deviation, report.max_points
            );
        } else {
            info!(
                "题目 {} 评分一致: 平均 {:.2}，标准差 {:.2}",
                report.question_id, report.mean, report.std_deviation
            );
        }
        reports.push(report);
    }
    reports
}

fn build_report(question_id: &str, scores: Vec<f64>, max_points: f64) -> ConsistencyReport {
    let mean = mean(&scores);
    let std_deviation = population_std_dev(&scores, mean);
    ConsistencyReport {
        question_id: question_id.to_string(),
        flagged: std_deviation > max_points * FLAG_RATIO,
        scores,
        mean,
        std_deviation,
        max_points,
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 总体标准差（除以 n）
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
