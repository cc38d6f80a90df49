//! 表格行与评估任务

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 表格中的一行
///
/// `row_index` 是表格中的真实行号，写回时按它定位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub row_index: usize,
    pub doc_ref: String,
    pub student_name: String,
    /// 读取时的分数单元格（通常为空）
    #[serde(default)]
    pub score: Option<String>,
    /// 读取时的反馈单元格（通常为空）
    #[serde(default)]
    pub feedback: Option<String>,
}

impl SheetRow {
    pub fn new(row_index: usize, doc_ref: impl Into<String>, student_name: impl Into<String>) -> Self {
        Self {
            row_index,
            doc_ref: doc_ref.into(),
            student_name: student_name.into(),
            score: None,
            feedback: None,
        }
    }
}

/// 一个文档的评估任务
///
/// 由 `BatchRunner` 根据表格行创建，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// 本批次内唯一
    pub row_index: usize,
    pub doc_ref: String,
    pub student_label: String,
}

impl Job {
    pub fn new(row_index: usize, doc_ref: impl Into<String>, student_label: impl Into<String>) -> Self {
        Self {
            row_index,
            doc_ref: doc_ref.into(),
            student_label: student_label.into(),
        }
    }
}

impl From<&SheetRow> for Job {
    fn from(row: &SheetRow) -> Self {
        let student_label = if row.student_name.trim().is_empty() {
            "Unknown".to_string()
        } else {
            row.student_name.trim().to_string()
        };
        Self::new(row.row_index, row.doc_ref.trim(), student_label)
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[行 {} 学生 {}]", self.row_index, self.student_label)
    }
}
