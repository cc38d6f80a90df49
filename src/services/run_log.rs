//! 运行日志服务 - 业务能力层
//!
//! 只负责"追加一条审计记录"能力，不关心流程

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::models::{Job, Outcome};

/// 一条运行记录（JSON Lines 中的一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub timestamp: String,
    pub row_index: usize,
    pub student: String,
    pub doc_ref: String,
    pub outcome: String,
    pub attempts: u32,
    pub duration_ms: u64,
    pub score: Option<u32>,
    pub message: Option<String>,
}

impl RunLogEntry {
    pub fn new(job: &Job, outcome: &Outcome) -> Self {
        let (score, message) = match outcome {
            Outcome::Success { result, .. } => (Some(result.score), None),
            Outcome::Failure { message, .. } => (None, Some(message.clone())),
        };
        Self {
            timestamp: Utc::now().to_rfc3339(),
            row_index: job.row_index,
            student: job.student_label.clone(),
            doc_ref: job.doc_ref.clone(),
            outcome: outcome.kind_label().to_string(),
            attempts: outcome.attempts(),
            duration_ms: outcome.duration_ms(),
            score,
            message,
        }
    }
}

/// 运行日志
///
/// 职责：
/// - 每个任务结束后追加一行记录
/// - 只追加，不读取
/// - 写入失败只告警，不影响流水线
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    path: Option<PathBuf>,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// 不落盘的运行日志
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 追加一条记录
    pub async fn record(&self, job: &Job, outcome: &Outcome) {
        let Some(path) = &self.path else {
            return;
        };

        let entry = RunLogEntry::new(job, outcome);
        if let Err(e) = append_line(path, &entry).await {
            warn!("{} ⚠️ 运行日志写入失败 ({}): {}", job, path.display(), e);
        } else {
            debug!("{} 已记录运行日志: {}", job, entry.outcome);
        }
    }
}

async fn append_line(path: &Path, entry: &RunLogEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
