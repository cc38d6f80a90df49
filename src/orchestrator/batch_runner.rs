//! 批量评估器 - 编排层
//!
//! ## 职责
//!
//! 一次运行的完整生命周期：
//!
//! 1. **校验**：配置、评分标准、行号唯一性；任何一项不通过都不会触碰表格
//! 2. **建任务**：每行一个 `Job`
//! 3. **调度**：委托 [`Scheduler`] 并发执行
//! 4. **写回**：按行号顺序逐行写回；瞬时失败按重试策略重试，最终失败只记录
//! 5. **汇总**：生成 [`BatchReport`]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{ConfigError, WriteError};
use crate::models::{BatchReport, Job, RubricModel, SheetRow, WriteFailure};
use crate::orchestrator::scheduler::{ProgressCallback, Scheduler};
use crate::services::{DocumentFetcher, Evaluator, ResultWriter, RunLog};
use crate::workflow::{CancelSignal, RetryFailure, RetryPolicy, Worker};

/// 每行写回的最大尝试次数
const WRITE_ATTEMPTS: u32 = 3;

/// 批量评估器
pub struct BatchRunner {
    fetcher: Arc<dyn DocumentFetcher>,
    evaluator: Arc<dyn Evaluator>,
    writer: Arc<dyn ResultWriter>,
    run_log: RunLog,
    progress: Option<ProgressCallback>,
}

impl BatchRunner {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        evaluator: Arc<dyn Evaluator>,
        writer: Arc<dyn ResultWriter>,
        run_log: RunLog,
    ) -> Self {
        Self {
            fetcher,
            evaluator,
            writer,
            run_log,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// 运行一个批次
    ///
    /// 只有配置错误会返回 `Err`；单行失败都体现在报告里
    pub async fn run(
        &self,
        rows: &[SheetRow],
        rubric: RubricModel,
        config: &PipelineConfig,
        cancel: &CancelSignal,
    ) -> Result<BatchReport, ConfigError> {
        config.validate()?;
        rubric.validate(config.rubric_tolerance)?;
        let jobs = build_jobs(rows)?;

        let started_at = Utc::now();
        let worker = Arc::new(Worker::from_config(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.evaluator),
            Arc::new(rubric),
            config,
        ));
        let mut scheduler = Scheduler::new(worker, config.concurrency).with_run_log(self.run_log.clone());
        if let Some(callback) = &self.progress {
            scheduler = scheduler.with_progress(Arc::clone(callback));
        }

        info!(
            "🚀 开始评估 {} 个文档（并发 {}，每个文档最多 {} 次尝试）",
            jobs.len(),
            scheduler.concurrency(),
            config.max_attempts_per_document
        );
        let outcomes = scheduler.run_all(jobs, cancel).await;

        // 写回：BTreeMap 的遍历顺序即行号升序
        info!("📝 正在写回 {} 行结果...", outcomes.len());
        let write_retry = RetryPolicy::new(WRITE_ATTEMPTS, config.backoff_initial, config.backoff_max);
        let mut write_failures = Vec::new();

        for (row_index, outcome) in &outcomes {
            let score = outcome.score_cell();
            let feedback = outcome.feedback_cell(config.plagiarism_check_enabled);

            if let Err(e) = self.write_row(&write_retry, *row_index, &score, &feedback).await {
                warn!("[行 {}] ⚠️ 写回失败: {}", row_index, e.message);
                write_failures.push(WriteFailure {
                    row_index: *row_index,
                    message: e.message,
                });
            }
        }

        let mut report = BatchReport::new(outcomes, started_at, Utc::now());
        report.write_failures = write_failures;

        info!(
            "✓ 批次完成: 成功 {}/{}，失败 {}，写回失败 {}",
            report.success_count,
            report.total(),
            report.failure_count,
            report.write_failures.len()
        );
        Ok(report)
    }

    /// 写回一行；写回阶段不受取消信号影响
    async fn write_row(
        &self,
        retry: &RetryPolicy,
        row_index: usize,
        score: &str,
        feedback: &str,
    ) -> Result<(), WriteError> {
        let writer = &self.writer;
        let label = format!("[行 {}]", row_index);
        retry
            .execute(&label, &CancelSignal::new(), move |_| writer.write(row_index, score, feedback))
            .await
            .map(|_| ())
            .map_err(|failure| match failure {
                RetryFailure::Fatal { error, .. } | RetryFailure::Exhausted { error, .. } => error,
                RetryFailure::Cancelled { last_error, .. } => {
                    last_error.unwrap_or_else(|| WriteError::new(row_index, "写回已取消"))
                }
            })
    }
}

/// 每行一个任务；行号重复视为配置错误
fn build_jobs(rows: &[SheetRow]) -> Result<Vec<Job>, ConfigError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert(row.row_index) {
            return Err(ConfigError::DuplicateRow(row.row_index));
        }
    }
    Ok(rows.iter().map(Job::from).collect())
}
