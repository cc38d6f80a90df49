/// Google Sheets API 客户端
///
/// 封装表格行读取和单元格写入
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{SheetError, WriteError};
use crate::models::SheetRow;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateBody<'a> {
    value_input_option: &'static str,
    data: Vec<CellUpdate<'a>>,
}

#[derive(Debug, Serialize)]
struct CellUpdate<'a> {
    range: String,
    values: [[&'a str; 1]; 1],
}

/// 列布局：四个列名 + 起始行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub sheet_name: String,
    pub doc_link_column: String,
    pub student_name_column: String,
    pub score_column: String,
    pub feedback_column: String,
    pub start_row: usize,
}

impl SheetLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sheet_name: config.sheet_name.clone(),
            doc_link_column: config.doc_link_column.clone(),
            student_name_column: config.student_name_column.clone(),
            score_column: config.score_column.clone(),
            feedback_column: config.feedback_column.clone(),
            start_row: config.start_row,
        }
    }

    fn columns(&self) -> [&str; 4] {
        [
            self.doc_link_column.as_str(),
            self.student_name_column.as_str(),
            self.score_column.as_str(),
            self.feedback_column.as_str(),
        ]
    }

    /// 读取范围，覆盖四列中最左到最右的列
    pub fn read_range(&self) -> String {
        let indices = self.columns().map(column_index);
        let first = indices.iter().min().copied().unwrap_or(0);
        let last = indices.iter().max().copied().unwrap_or(0);
        format!(
            "{}!{}{}:{}",
            self.sheet_name,
            column_name(first),
            self.start_row,
            column_name(last)
        )
    }

    /// 单个单元格的范围
    pub fn cell_range(&self, row_index: usize, column: &str) -> String {
        format!("{}!{}{}", self.sheet_name, column, row_index)
    }

    /// 把读取到的二维值转成表格行
    ///
    /// 行号 = 起始行 + 偏移；文档和姓名都为空的行跳过
    pub fn rows_from_values(&self, values: Vec<Vec<String>>) -> Vec<SheetRow> {
        let first = self.columns().map(column_index).into_iter().min().unwrap_or(0);
        let offset = |column: &str| column_index(column) - first;
        let cell = |row: &[String], column: &str| -> String {
            row.get(offset(column)).map(|s| s.trim().to_string()).unwrap_or_default()
        };
        let optional = |value: String| Some(value).filter(|v| !v.is_empty());

        values
            .into_iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let row_index = self.start_row + i;
                let doc_ref = cell(row.as_slice(), self.doc_link_column.as_str());
                let student_name = cell(row.as_slice(), self.student_name_column.as_str());
                if doc_ref.is_empty() && student_name.is_empty() {
                    debug!("跳过空行: {}", row_index);
                    return None;
                }
                Some(SheetRow {
                    row_index,
                    doc_ref,
                    student_name,
                    score: optional(cell(row.as_slice(), self.score_column.as_str())),
                    feedback: optional(cell(row.as_slice(), self.feedback_column.as_str())),
                })
            })
            .collect()
    }
}

/// 列名转 0 起始的列序号（`A` -> 0，`AA` -> 26）
pub fn column_index(column: &str) -> usize {
    column
        .bytes()
        .filter(u8::is_ascii_uppercase)
        .fold(0usize, |acc, b| acc * 26 + usize::from(b - b'A' + 1))
        .saturating_sub(1)
}

/// 列序号转列名
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Google Sheets 客户端
#[derive(Clone)]
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    access_token: String,
    spreadsheet_id: String,
    layout: SheetLayout,
    base_url: String,
}

impl GoogleSheetsClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.per_call_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            http,
            access_token: config.google_access_token.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            layout: SheetLayout::from_config(config),
            base_url: SHEETS_API_BASE.to_string(),
        }
    }

    /// 使用自定义 API 地址创建
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    fn values_url(&self, range: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("无效的 API 地址: {}", self.base_url))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range);
        Ok(url)
    }

    /// 读取待评估的行
    pub async fn read_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
        let range = self.layout.read_range();
        let url = self.values_url(&range).map_err(|_| SheetError::BadResponse {
            endpoint: range.clone(),
            status: 0,
        })?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|source| SheetError::RequestFailed {
                endpoint: range.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::BadResponse {
                endpoint: range,
                status: status.as_u16(),
            });
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|source| SheetError::RequestFailed {
                endpoint: range.clone(),
                source,
            })?;

        let rows = self.layout.rows_from_values(body.values);
        info!("从表格读取到 {} 行 ({})", rows.len(), range);
        Ok(rows)
    }

    /// 在一次 `values:batchUpdate` 请求中写入同一行的多个单元格
    ///
    /// `cells` 为 (列名, 值)；请求要么整体生效，要么整体失败
    pub async fn update_cells(&self, row_index: usize, cells: &[(&str, &str)]) -> Result<(), WriteError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| WriteError::new(row_index, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| WriteError::new(row_index, format!("无效的 API 地址: {}", self.base_url)))?
            .push(&self.spreadsheet_id)
            .push("values:batchUpdate");

        let body = BatchUpdateBody {
            value_input_option: "RAW",
            data: cells
                .iter()
                .map(|(column, value)| CellUpdate {
                    range: self.layout.cell_range(row_index, column),
                    values: [[*value]],
                })
                .collect(),
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| WriteError::transient(row_index, format!("第 {} 行: {}", row_index, e)))?;

        match response.status() {
            status if status.is_success() => {
                debug!("已写入第 {} 行 {} 个单元格", row_index, cells.len());
                Ok(())
            }
            StatusCode::TOO_MANY_REQUESTS => Err(WriteError::transient(row_index, "写入配额不足 (429)")),
            status if status.is_server_error() => {
                Err(WriteError::transient(row_index, format!("HTTP {}", status.as_u16())))
            }
            status => Err(WriteError::new(row_index, format!("HTTP {}", status.as_u16()))),
        }
    }
}
