//! 评估结果与任务终态

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 分数单元格中表示失败的标记
pub const ERROR_MARKER: &str = "ERROR";

/// 模型给出的评估结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// 取值范围 `[0, rubric.total_points]`
    pub score: u32,
    /// 各评分项得分（模型提供时才有）
    #[serde(default)]
    pub breakdown: BTreeMap<String, u32>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub plagiarism_note: Option<String>,
}

impl EvaluationResult {
    pub fn with_score(score: u32) -> Self {
        Self {
            score,
            breakdown: BTreeMap::new(),
            strengths: Vec::new(),
            improvements: Vec::new(),
            recommendations: Vec::new(),
            plagiarism_note: None,
        }
    }

    /// 拼接成写入反馈单元格的文本
    ///
    /// 格式：`Strengths: .. | Areas for Improvement: .. | Recommendations: .. | Plagiarism Check: ..`，
    /// 空的段落不输出
    pub fn format_feedback(&self, include_plagiarism: bool) -> String {
        let mut parts = Vec::new();

        if !self.strengths.is_empty() {
            parts.push(format!("Strengths: {}", self.strengths.join("; ")));
        }
        if !self.improvements.is_empty() {
            parts.push(format!("Areas for Improvement: {}", self.improvements.join("; ")));
        }
        if !self.recommendations.is_empty() {
            parts.push(format!("Recommendations: {}", self.recommendations.join("; ")));
        }
        if include_plagiarism {
            if let Some(note) = self.plagiarism_note.as_deref().filter(|n| !n.trim().is_empty()) {
                parts.push(format!("Plagiarism Check: {}", note));
            }
        }

        parts.join(" | ")
    }
}

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    /// 文档读取失败
    FetchError,
    /// 评估失败（致命错误，不重试）
    EvaluationError,
    /// 重试次数用尽
    RetryExhausted,
    /// 运行被取消，任务未完成
    Cancelled,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::FetchError => "FetchError",
            FailureKind::EvaluationError => "EvaluationError",
            FailureKind::RetryExhausted => "RetryExhausted",
            FailureKind::Cancelled => "Cancelled",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个任务的终态
///
/// `attempts` 统计的是评估调用次数；读取阶段失败或尚未开始就被取消时为 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum Outcome {
    Success {
        result: EvaluationResult,
        attempts: u32,
        duration_ms: u64,
    },
    Failure {
        kind: FailureKind,
        message: String,
        attempts: u32,
        duration_ms: u64,
    },
}

impl Outcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>, attempts: u32, duration_ms: u64) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
            attempts,
            duration_ms,
        }
    }

    /// 未被调度的任务
    pub fn cancelled() -> Self {
        Self::failure(FailureKind::Cancelled, "运行已取消，任务未执行", 0, 0)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Success { attempts, .. } | Outcome::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            Outcome::Success { duration_ms, .. } | Outcome::Failure { duration_ms, .. } => *duration_ms,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// 类别名（用于运行日志）
    pub fn kind_label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "Success",
            Outcome::Failure { kind, .. } => kind.as_str(),
        }
    }

    /// 分数单元格的值
    pub fn score_cell(&self) -> String {
        match self {
            Outcome::Success { result, .. } => result.score.to_string(),
            Outcome::Failure { .. } => ERROR_MARKER.to_string(),
        }
    }

    /// 反馈单元格的值
    pub fn feedback_cell(&self, include_plagiarism: bool) -> String {
        match self {
            Outcome::Success { result, .. } => result.format_feedback(include_plagiarism),
            Outcome::Failure { kind, message, .. } => format!("{}: {}", kind, message),
        }
    }
}
