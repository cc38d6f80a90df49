/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::ReportSummary;
use crate::orchestrator::Progress;

/// 初始化日志：控制台 + 日志文件
///
/// 日志文件名带启动时间，如 `logs/evaluation_20240101_120000.log`；
/// 级别由 `RUST_LOG` 控制，默认 `info`
///
/// # 返回
/// 返回日志文件路径
pub fn init(log_dir: &Path) -> AppResult<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(format!(
        "evaluation_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    let log_file = File::create(&log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // 全局 subscriber 只能设置一次，重复初始化时忽略
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .try_init();

    Ok(log_path)
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 文档批量评估模式");
    info!("📊 最大并发数: {}", config.max_workers);
    info!("🔁 每个文档最多尝试: {} 次", config.retry_attempts);
    info!("⏱️ 单次调用超时: {}ms", config.per_call_timeout_ms);
    info!("🤖 模型: {}", config.llm_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录表格行加载信息
///
/// # 参数
/// - `total`: 行数
/// - `concurrency`: 最大并发数
pub fn log_rows_loaded(total: usize, concurrency: usize) {
    info!("✓ 找到 {} 个待评估的文档", total);
    info!("📋 将以最多 {} 个并发的方式处理\n", concurrency);
}

/// 记录单个任务完成后的进度
pub fn log_progress(progress: &Progress) {
    let mark = if progress.success { "✓" } else { "✗" };
    info!(
        "{} 已完成 {}/{}（行 {}）",
        mark, progress.completed, progress.total, progress.row_index
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 报告摘要
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &ReportSummary, log_file_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.success, summary.total);
    info!("❌ 失败: {}", summary.failure);
    for (kind, count) in &summary.failures_by_kind {
        info!("   - {}: {}", kind, count);
    }
    if summary.write_failures > 0 {
        info!("⚠️ 写回失败: {}", summary.write_failures);
    }
    info!("⏱️ 总耗时: {:.1}s", summary.elapsed_ms as f64 / 1000.0);
    info!("⏱️ 平均每个文档: {}ms", summary.average_duration_ms);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
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
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("数据库设计报告", 3), "数据库...");
    }

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = init(&dir.path().join("logs")).unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("evaluation_") && n.ends_with(".log")));
    }
}
