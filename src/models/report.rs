//! 批次报告

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::{FailureKind, Outcome};

/// 写回失败记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub row_index: usize,
    pub message: String,
}

/// 一次运行的完整报告
///
/// `outcomes` 以行号为键，遍历顺序即表格行顺序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: BTreeMap<usize, Outcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(default)]
    pub write_failures: Vec<WriteFailure>,
}

/// 报告摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub cancelled: usize,
    pub elapsed_ms: u64,
    /// 成功文档的平均耗时
    pub average_duration_ms: u64,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
    pub write_failures: usize,
}

impl BatchReport {
    pub fn new(
        outcomes: BTreeMap<usize, Outcome>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let success_count = outcomes.values().filter(|o| o.is_success()).count();
        let failure_count = outcomes.len() - success_count;
        Self {
            outcomes,
            started_at,
            finished_at,
            success_count,
            failure_count,
            write_failures: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn get(&self, row_index: usize) -> Option<&Outcome> {
        self.outcomes.get(&row_index)
    }

    /// 失败的行（按行号排序）
    pub fn failures(&self) -> impl Iterator<Item = (usize, &Outcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(row, outcome)| (*row, outcome))
    }

    pub fn elapsed_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub fn summary(&self) -> ReportSummary {
        let mut failures_by_kind = BTreeMap::new();
        for (_, outcome) in self.failures() {
            if let Some(kind) = outcome.failure_kind() {
                *failures_by_kind.entry(kind).or_insert(0) += 1;
            }
        }

        let success_durations: Vec<u64> = self
            .outcomes
            .values()
            .filter(|o| o.is_success())
            .map(Outcome::duration_ms)
            .collect();
        let average_duration_ms = if success_durations.is_empty() {
            0
        } else {
            success_durations.iter().sum::<u64>() / success_durations.len() as u64
        };

        ReportSummary {
            total: self.total(),
            success: self.success_count,
            failure: self.failure_count,
            cancelled: failures_by_kind.get(&FailureKind::Cancelled).copied().unwrap_or(0),
            elapsed_ms: self.elapsed_ms(),
            average_duration_ms,
            failures_by_kind,
            write_failures: self.write_failures.len(),
        }
    }
}
