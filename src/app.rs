//! 应用入口 - 负责把各层组装起来
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建客户端和批量评估器
//! 2. **加载输入**：读取评分标准和表格行
//! 3. **取消**：Ctrl-C 触发协作式取消，已开始的任务会收尾
//! 4. **输出**：打印统计信息，按需把报告写成 JSON

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::clients::{GoogleDocsClient, GoogleSheetsClient, LlmClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{load_rubric, BatchReport};
use crate::orchestrator::BatchRunner;
use crate::services::{GoogleDocsFetcher, LlmEvaluator, RunLog, SheetResultWriter, Worksheet};
use crate::utils::logging;
use crate::workflow::CancelSignal;

/// 应用主结构
pub struct App {
    config: Config,
    log_path: PathBuf,
    sheets: GoogleSheetsClient,
    runner: BatchRunner,
    cancel: CancelSignal,
}

impl App {
    /// 初始化应用
    ///
    /// 配置不合法时直接返回错误，不会读写表格
    pub async fn initialize(config: Config, log_path: PathBuf) -> Result<Self> {
        config.validate()?;
        logging::log_startup(&config);

        let pipeline = config.pipeline();
        let sheets = GoogleSheetsClient::new(&config);
        let docs = GoogleDocsClient::new(&config.google_access_token, pipeline.per_call_timeout);

        let fetcher = GoogleDocsFetcher::new(docs, pipeline.min_document_chars, pipeline.max_document_chars);
        let evaluator = LlmEvaluator::new(LlmClient::new(&config));
        let writer = SheetResultWriter::new(
            sheets.clone(),
            config.score_column.clone(),
            config.feedback_column.clone(),
        );

        let runner = BatchRunner::new(
            Arc::new(fetcher),
            Arc::new(evaluator),
            Arc::new(writer),
            RunLog::new(&config.run_log_file),
        )
        .with_progress(Arc::new(logging::log_progress));

        Ok(Self {
            config,
            log_path,
            sheets,
            runner,
            cancel: CancelSignal::new(),
        })
    }

    /// 取消信号，可交给外部（如 UI）使用
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<BatchReport> {
        let pipeline = self.config.pipeline();

        // 评分标准和表格行都要在任何任务开始前准备好
        let rubric = load_rubric(&pipeline.rubric_path, pipeline.rubric_tolerance).await?;

        info!("\n📁 正在读取表格...");
        let rows = self.sheets.list_rows().await?;
        if rows.is_empty() {
            warn!("⚠️ 表格中没有待评估的行，程序结束");
            let now = Utc::now();
            return Ok(BatchReport::new(Default::default(), now, now));
        }
        logging::log_rows_loaded(rows.len(), pipeline.concurrency);

        let ctrl_c = spawn_ctrl_c_handler(self.cancel.clone());
        let report = self.runner.run(&rows, rubric, &pipeline, &self.cancel).await;
        ctrl_c.abort();
        let report = report?;

        logging::print_final_stats(&report.summary(), &self.log_path);
        info!("运行日志: {}", self.config.run_log_file.display());

        if let Some(path) = &self.config.report_output_path {
            write_report(path, &report).await?;
            info!("📄 报告已保存至: {}", path.display());
        }

        Ok(report)
    }
}

fn spawn_ctrl_c_handler(cancel: CancelSignal) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 收到 Ctrl-C，停止分发新任务，等待进行中的任务结束...");
            cancel.cancel();
        }
    })
}

/// 把报告写成格式化的 JSON
pub async fn write_report(path: &Path, report: &BatchReport) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvaluationResult, FailureKind, Outcome};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_write_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");

        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            2,
            Outcome::Success {
                result: EvaluationResult::with_score(75),
                attempts: 1,
                duration_ms: 40,
            },
        );
        outcomes.insert(3, Outcome::failure(FailureKind::RetryExhausted, "429", 3, 90));
        let now = Utc::now();
        let report = BatchReport::new(outcomes, now, now);

        write_report(&path, &report).await.unwrap();

        let loaded: BatchReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.total(), 2);
        assert_eq!(loaded.success_count, 1);
        assert_eq!(loaded.get(3), report.get(3));
    }

    #[tokio::test]
    async fn test_initialize_rejects_missing_credentials() {
        let result = App::initialize(Config::default(), PathBuf::from("unused.log")).await;
        assert!(result.is_err());
    }
}
