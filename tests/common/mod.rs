//! 流水线测试用的内存替身
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use auto_evaluator::error::{EvalError, FetchError, WriteError};
use auto_evaluator::models::{EvaluationResult, RubricModel, SheetRow};
use auto_evaluator::services::{DocumentFetcher, Evaluator, ResultWriter, RunLog};
use auto_evaluator::{BatchRunner, PipelineConfig};

/// `count` 行，行号从 2 开始，文档引用为 `doc-<i>`
pub fn rows(count: usize) -> Vec<SheetRow> {
    (0..count)
        .map(|i| SheetRow::new(i + 2, format!("doc-{}", i), format!("Student {}", i)))
        .collect()
}

/// 退避很短的流水线配置
pub fn pipeline(concurrency: usize, max_attempts: u32) -> PipelineConfig {
    PipelineConfig {
        concurrency,
        max_attempts_per_document: max_attempts,
        per_call_timeout: Duration::from_secs(2),
        backoff_initial: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
        ..PipelineConfig::default()
    }
}

/// 返回文档引用本身作为正文
#[derive(Default)]
pub struct FakeFetcher {
    delays: HashMap<String, Duration>,
    failures: HashMap<String, FetchError>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_delay(mut self, doc_ref: &str, delay: Duration) -> Self {
        self.delays.insert(doc_ref.to_string(), delay);
        self
    }

    pub fn with_failure(mut self, doc_ref: &str, error: FetchError) -> Self {
        self.failures.insert(doc_ref.to_string(), error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch_text(&self, doc_ref: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(doc_ref) {
            tokio::time::sleep(*delay).await;
        }
        match self.failures.get(doc_ref) {
            Some(error) => Err(error.clone()),
            None => Ok(doc_ref.to_string()),
        }
    }
}

/// 按正文（即文档引用）决定行为的评估替身
#[derive(Default)]
pub struct FakeEvaluator {
    transient_failures: HashMap<String, u32>,
    always_transient: HashSet<String>,
    fatal: HashSet<String>,
    scores: HashMap<String, u32>,
    attempts: Mutex<HashMap<String, u32>>,
    calls: AtomicUsize,
}

impl FakeEvaluator {
    /// 前 `times` 次返回瞬时错误，之后成功
    pub fn failing_times(mut self, doc_ref: &str, times: u32) -> Self {
        self.transient_failures.insert(doc_ref.to_string(), times);
        self
    }

    pub fn always_transient(mut self, doc_ref: &str) -> Self {
        self.always_transient.insert(doc_ref.to_string());
        self
    }

    pub fn fatal(mut self, doc_ref: &str) -> Self {
        self.fatal.insert(doc_ref.to_string());
        self
    }

    pub fn with_score(mut self, doc_ref: &str, score: u32) -> Self {
        self.scores.insert(doc_ref.to_string(), score);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, doc_ref: &str) -> u32 {
        self.attempts.lock().unwrap().get(doc_ref).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Evaluator for FakeEvaluator {
    async fn evaluate(
        &self,
        text: &str,
        _rubric: &RubricModel,
        _attempt: u32,
    ) -> Result<EvaluationResult, EvalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let seen = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(text.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.fatal.contains(text) {
            return Err(EvalError::InvalidInput("rubric rejected".into()));
        }
        if self.always_transient.contains(text) {
            return Err(EvalError::RateLimited("429 Too Many Requests".into()));
        }
        if let Some(times) = self.transient_failures.get(text) {
            if seen <= *times {
                return Err(EvalError::Timeout(Duration::from_millis(10)));
            }
        }

        let mut result = EvaluationResult::with_score(self.scores.get(text).copied().unwrap_or(80));
        result.strengths = vec![format!("{} is well structured", text)];
        Ok(result)
    }
}

/// 记录每次写回
#[derive(Default)]
pub struct RecordingWriter {
    writes: Mutex<Vec<(usize, String, String)>>,
    failing_rows: HashSet<usize>,
    flaky_rows: Mutex<HashMap<usize, u32>>,
    attempts: AtomicUsize,
}

impl RecordingWriter {
    pub fn failing_on(mut self, row_index: usize) -> Self {
        self.failing_rows.insert(row_index);
        self
    }

    /// 该行前 `times` 次写入返回瞬时错误
    pub fn flaky_on(self, row_index: usize, times: u32) -> Self {
        self.flaky_rows.lock().unwrap().insert(row_index, times);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(usize, String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn rows_written(&self) -> Vec<usize> {
        self.writes().into_iter().map(|(row, _, _)| row).collect()
    }
}

#[async_trait]
impl ResultWriter for RecordingWriter {
    async fn write(&self, row_index: usize, score: &str, feedback: &str) -> Result<(), WriteError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_rows.contains(&row_index) {
            return Err(WriteError::new(row_index, "invalid range"));
        }
        if let Some(remaining) = self.flaky_rows.lock().unwrap().get_mut(&row_index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(WriteError::transient(row_index, "写入配额不足 (429)"));
            }
        }
        self.writes
            .lock()
            .unwrap()
            .push((row_index, score.to_string(), feedback.to_string()));
        Ok(())
    }
}

pub fn runner(
    fetcher: &Arc<FakeFetcher>,
    evaluator: &Arc<FakeEvaluator>,
    writer: &Arc<RecordingWriter>,
) -> BatchRunner {
    BatchRunner::new(
        fetcher.clone(),
        evaluator.clone(),
        writer.clone(),
        RunLog::disabled(),
    )
}
