//! 调度器 - 编排层
//!
//! ## 职责
//!
//! 把一组任务分发给最多 `concurrency` 个并发 Worker，收集每个任务的终态。
//!
//! ## 设计特点
//!
//! - **有界并发**：同时运行的任务数不超过 `concurrency`，其余任务排队
//! - **按输入顺序分发**：完成顺序不定，结果按行号收集
//! - **单点收集**：只有调度循环写结果表，每个行号只写一次
//! - **故障隔离**：Worker panic 也会变成该行的失败终态
//! - **协作式取消**：每次分发前检查取消信号，未分发的任务标记为 `Cancelled`
//! - **即时审计**：每收集到一个终态就追加一条运行日志

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::models::{FailureKind, Job, Outcome};
use crate::services::RunLog;
use crate::workflow::{CancelSignal, Worker};

/// 单个任务完成时的进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 已收集的终态数
    pub completed: usize,
    pub total: usize,
    pub row_index: usize,
    pub success: bool,
}

/// 进度回调，在调度循环中调用
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// 调度器
pub struct Scheduler {
    worker: Arc<Worker>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
    run_log: RunLog,
}

impl Scheduler {
    /// `concurrency` 为 0 时按 1 处理
    pub fn new(worker: Arc<Worker>, concurrency: usize) -> Self {
        Self {
            worker,
            concurrency: concurrency.max(1),
            progress: None,
            run_log: RunLog::disabled(),
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = run_log;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 运行全部任务，返回 行号 → 终态
    ///
    /// 每个任务恰好产生一个终态
    pub async fn run_all(&self, jobs: Vec<Job>, cancel: &CancelSignal) -> BTreeMap<usize, Outcome> {
        let total = jobs.len();
        let (tx, mut rx) = mpsc::unbounded_channel::<(Job, Outcome)>();
        let mut pending = jobs.into_iter();
        let mut outcomes = BTreeMap::new();
        let mut in_flight = 0usize;

        info!("📋 共 {} 个任务，最大并发数 {}", total, self.concurrency);

        loop {
            // 补满并发槽位
            while in_flight < self.concurrency && !cancel.is_cancelled() {
                let Some(job) = pending.next() else {
                    break;
                };
                self.dispatch(job, cancel, tx.clone());
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            // 调度器自己持有 tx，recv 不会返回 None
            let Some((job, outcome)) = rx.recv().await else {
                break;
            };
            in_flight -= 1;

            let row_index = job.row_index;
            let success = outcome.is_success();
            self.run_log.record(&job, &outcome).await;
            if outcomes.insert(row_index, outcome).is_some() {
                warn!("[行 {}] 重复的终态，保留最新结果", row_index);
            }

            let progress = Progress {
                completed: outcomes.len(),
                total,
                row_index,
                success,
            };
            debug!("进度 {}/{} (行 {})", progress.completed, total, row_index);
            if let Some(callback) = &self.progress {
                callback(&progress);
            }
        }

        let remaining: Vec<Job> = pending.collect();
        if !remaining.is_empty() {
            warn!("⚠️ 运行已取消，{} 个任务未执行", remaining.len());
            for job in remaining {
                let outcome = Outcome::cancelled();
                self.run_log.record(&job, &outcome).await;
                outcomes.insert(job.row_index, outcome);
            }
        }

        outcomes
    }

    fn dispatch(&self, job: Job, cancel: &CancelSignal, tx: mpsc::UnboundedSender<(Job, Outcome)>) {
        let worker = Arc::clone(&self.worker);
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(worker.run(&job, &cancel)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("{} ❌ Worker 异常退出: {}", job, message);
                    Outcome::failure(FailureKind::EvaluationError, format!("Worker 异常退出: {}", message), 0, 0)
                }
            };
            // 接收端只在调度结束后才会关闭
            let _ = tx.send((job, outcome));
        });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EvalError, FetchError};
    use crate::models::{EvaluationResult, RubricModel};
    use crate::services::{DocumentFetcher, Evaluator};
    use crate::workflow::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 记录同时在途的调用数
    #[derive(Default)]
    struct CountingFetcher {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DocumentFetcher for CountingFetcher {
        async fn fetch_text(&self, doc_ref: &str) -> Result<String, FetchError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if doc_ref == "panic" {
                panic!("bad document");
            }
            Ok(doc_ref.to_string())
        }
    }

    struct EchoEvaluator;

    #[async_trait]
    impl Evaluator for EchoEvaluator {
        async fn evaluate(
            &self,
            text: &str,
            _rubric: &RubricModel,
            _attempt: u32,
        ) -> Result<EvaluationResult, EvalError> {
            Ok(EvaluationResult::with_score(text.len() as u32))
        }
    }

    fn worker(fetcher: Arc<CountingFetcher>) -> Arc<Worker> {
        Arc::new(Worker::new(
            fetcher,
            Arc::new(EchoEvaluator),
            Arc::new(RubricModel::default_rubric()),
            RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1)),
            Duration::from_secs(1),
        ))
    }

    fn jobs(refs: &[&str]) -> Vec<Job> {
        refs.iter()
            .enumerate()
            .map(|(i, r)| Job::new(i + 2, *r, format!("student-{}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_respects_concurrency_bound() {
        let fetcher = Arc::new(CountingFetcher::default());
        let scheduler = Scheduler::new(worker(fetcher.clone()), 3);

        let outcomes = scheduler
            .run_all(jobs(&["a"; 12]), &CancelSignal::new())
            .await;

        assert_eq!(outcomes.len(), 12);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(outcomes.keys().copied().collect::<Vec<_>>(), (2..14).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let fetcher = Arc::new(CountingFetcher::default());
        let scheduler = Scheduler::new(worker(fetcher), 2);

        let outcomes = scheduler
            .run_all(jobs(&["ok", "panic", "fine"]), &CancelSignal::new())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[&2].is_success());
        assert_eq!(outcomes[&3].failure_kind(), Some(FailureKind::EvaluationError));
        assert!(outcomes[&4].is_success());
    }

    #[tokio::test]
    async fn test_progress_reported_per_outcome() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let scheduler = Scheduler::new(worker(Arc::new(CountingFetcher::default())), 2)
            .with_progress(Arc::new(move |p: &Progress| sink.lock().unwrap().push(*p)));

        scheduler.run_all(jobs(&["a", "bb", "ccc"]), &CancelSignal::new()).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen.iter().map(|p| p.completed).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(seen.iter().all(|p| p.total == 3 && p.success));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let fetcher = Arc::new(CountingFetcher::default());
        let scheduler = Scheduler::new(worker(fetcher.clone()), 2);
        let cancel = CancelSignal::new();
        cancel.cancel();

        let outcomes = scheduler.run_all(jobs(&["a", "b", "c"]), &cancel).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .values()
            .all(|o| o.failure_kind() == Some(FailureKind::Cancelled)));
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let scheduler = Scheduler::new(worker(Arc::new(CountingFetcher::default())), 4);
        assert!(scheduler.run_all(Vec::new(), &CancelSignal::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_run_log_appended_as_outcomes_arrive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_log.jsonl");
        let lines_seen = Arc::new(Mutex::new(Vec::new()));
        let sink = lines_seen.clone();
        let log_path = path.clone();

        let scheduler = Scheduler::new(worker(Arc::new(CountingFetcher::default())), 2)
            .with_run_log(RunLog::new(&path))
            .with_progress(Arc::new(move |_: &Progress| {
                let lines = std::fs::read_to_string(&log_path)
                    .map(|content| content.lines().count())
                    .unwrap_or(0);
                sink.lock().unwrap().push(lines);
            }));

        scheduler.run_all(jobs(&["a", "bb", "ccc"]), &CancelSignal::new()).await;

        assert_eq!(*lines_seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_undispatched_jobs_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_log.jsonl");
        let scheduler = Scheduler::new(worker(Arc::new(CountingFetcher::default())), 2)
            .with_run_log(RunLog::new(&path));
        let cancel = CancelSignal::new();
        cancel.cancel();

        scheduler.run_all(jobs(&["a", "b"]), &cancel).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|line| line.contains("Cancelled")));
    }
}
