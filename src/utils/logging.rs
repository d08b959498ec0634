/// 日志工具模块
///
/// 提供日志初始化和批量批改过程中的格式化输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::BatchMetadata;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，未设置时按 `verbose` 选择 debug 或 info 级别。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 主观题批量批改");
    info!(
        "🤖 后端: {} | 模型: {}",
        config.llm_provider, config.llm_model_name
    );
    info!(
        "📊 每批并发数: {} | 限流: {} 次/分钟",
        config.batch_chunk_size, config.rate_limit_per_minute
    );
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始作答编号
/// - `end`: 结束作答编号
/// - `total`: 作答总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("{}", "─".repeat(60));
    info!("📦 [批次 {}/{}] 开始批改", batch_num, total_batches);
    info!("📄 本批作答: {}-{} / 共 {} 份", start, end, total);
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, total_batches: usize, graded: usize) {
    info!(
        "✓ [批次 {}/{}] 完成: 批改 {} 份",
        batch_num, total_batches, graded
    );
}

/// 打印最终统计信息
pub fn print_final_stats(metadata: &BatchMetadata, flagged_questions: usize) {
    info!("{}", "=".repeat(60));
    info!("📊 批量批改完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 作答总数: {}", metadata.total_essays);
    info!("📈 平均得分: {:.2}", metadata.average_score);
    info!("⏱️ 总耗时: {} ms", metadata.processing_time_ms);
    if flagged_questions > 0 {
        info!("⚠️ 评分波动较大的题目: {} 道，建议人工复核", flagged_questions);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_text("光合作用", 2), "光合...");
        assert_eq!(truncate_text("光合作用", 4), "光合作用");
        assert_eq!(truncate_text("", 3), "");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
