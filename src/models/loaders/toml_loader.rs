use crate::error::{AppResult, FileError, GradingError};
use crate::models::grading::BatchGradingRequest;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载批量批改请求
///
/// 文件格式：
/// ```toml
/// consistency_check = true
///
/// [[essays]]
/// question_id = "q1"
/// question = "简述光合作用的过程"
/// answer = "..."
/// rubric = ["说明光反应", "说明暗反应"]
/// max_points = 10
/// ```
pub async fn load_batch_file(path: &Path) -> AppResult<BatchGradingRequest> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| FileError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

    let request = parse_batch_toml(&content, path)?;

    tracing::info!(
        "成功加载 {} 份作答: {}",
        request.essays.len(),
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    Ok(request)
}

fn parse_batch_toml(content: &str, path: &Path) -> AppResult<BatchGradingRequest> {
    let request: BatchGradingRequest =
        toml::from_str(content).map_err(|source| FileError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;

    // 满分在加载阶段就校验，避免批次跑到一半才失败
    if let Some(bad) = request.essays.iter().find(|e| !e.has_valid_max_points()) {
        return Err(GradingError::InvalidMaxPoints {
            question_id: bad.question_id.clone(),
            max_points: bad.max_points,
        }
        .into());
    }

    Ok(request)
}
