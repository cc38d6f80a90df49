//! 表格读写服务 - 业务能力层
//!
//! 只负责"读行 / 写单元格"能力，不关心流程

use async_trait::async_trait;
use tracing::debug;

use crate::clients::GoogleSheetsClient;
use crate::error::{SheetError, WriteError};
use crate::models::SheetRow;

/// 表格数据源
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// 按表格顺序列出待评估的行
    async fn list_rows(&self) -> Result<Vec<SheetRow>, SheetError>;

    /// 一次写入同一行的多个单元格，`cells` 为 (列名, 值)
    ///
    /// 要么全部写入，要么全部不写
    async fn write_cells(&self, row_index: usize, cells: &[(&str, &str)]) -> Result<(), WriteError>;
}

/// 结果写回边界
#[async_trait]
pub trait ResultWriter: Send + Sync {
    async fn write(&self, row_index: usize, score: &str, feedback: &str) -> Result<(), WriteError>;
}

/// 把分数和反馈作为一次更新写回表格的两列
pub struct SheetResultWriter<W> {
    sheet: W,
    score_column: String,
    feedback_column: String,
}

impl<W: Worksheet> SheetResultWriter<W> {
    pub fn new(sheet: W, score_column: impl Into<String>, feedback_column: impl Into<String>) -> Self {
        Self {
            sheet,
            score_column: score_column.into(),
            feedback_column: feedback_column.into(),
        }
    }

    pub fn sheet(&self) -> &W {
        &self.sheet
    }
}

#[async_trait]
impl<W: Worksheet> ResultWriter for SheetResultWriter<W> {
    async fn write(&self, row_index: usize, score: &str, feedback: &str) -> Result<(), WriteError> {
        debug!("写回第 {} 行: 分数 {}", row_index, score);
        self.sheet
            .write_cells(
                row_index,
                &[(self.score_column.as_str(), score), (self.feedback_column.as_str(), feedback)],
            )
            .await
    }
}

#[async_trait]
impl Worksheet for GoogleSheetsClient {
    async fn list_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
        self.read_rows().await
    }

    async fn write_cells(&self, row_index: usize, cells: &[(&str, &str)]) -> Result<(), WriteError> {
        self.update_cells(row_index, cells).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 按行记录写入；`fail_column` 出现在某次更新里时整次更新失败
    #[derive(Default)]
    struct RecordingSheet {
        cells: Mutex<Vec<(usize, String, String)>>,
        fail_column: Option<&'static str>,
    }

    #[async_trait]
    impl Worksheet for RecordingSheet {
        async fn list_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
            Ok(Vec::new())
        }

        async fn write_cells(&self, row_index: usize, cells: &[(&str, &str)]) -> Result<(), WriteError> {
            if cells.iter().any(|(column, _)| self.fail_column == Some(*column)) {
                return Err(WriteError::transient(row_index, "quota exceeded"));
            }
            self.cells.lock().unwrap().extend(
                cells
                    .iter()
                    .map(|(column, value)| (row_index, column.to_string(), value.to_string())),
            );
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_score_and_feedback_together() {
        let writer = SheetResultWriter::new(RecordingSheet::default(), "C", "D");
        writer.write(4, "88", "Strengths: tidy").await.unwrap();

        let cells = writer.sheet().cells.lock().unwrap().clone();
        assert_eq!(
            cells,
            vec![
                (4, "C".to_string(), "88".to_string()),
                (4, "D".to_string(), "Strengths: tidy".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_feedback_failure_leaves_score_untouched() {
        let sheet = RecordingSheet {
            fail_column: Some("D"),
            ..Default::default()
        };
        let writer = SheetResultWriter::new(sheet, "C", "D");
        let err = writer.write(4, "88", "Strengths: tidy").await.unwrap_err();

        assert_eq!(err.row_index, 4);
        assert!(writer.sheet().cells.lock().unwrap().is_empty());
    }
}
