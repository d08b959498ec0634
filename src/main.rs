use anyhow::{Context, Result};
use essay_grader::models::load_batch_file;
use essay_grader::utils::logging;
use essay_grader::{App, Config};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    // 命令行第一个参数优先，其次是 BATCH_FILE
    let batch_file = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.batch_file));

    let request = load_batch_file(&batch_file)
        .await
        .with_context(|| format!("无法加载批量批改文件: {}", batch_file.display()))?;

    let app = App::new(&config);
    let result = app
        .batch_grade_essays(&request)
        .await
        .context("批量批改失败")?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
