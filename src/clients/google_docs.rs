/// Google Docs API 客户端
///
/// 封装文档读取和正文提取
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;

const DOCS_API_BASE: &str = "https://docs.googleapis.com/v1/documents";

/// Docs API 返回的文档（只保留正文相关字段）
#[derive(Debug, Default, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub body: Body,
}

#[derive(Debug, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StructuralElement {
    pub paragraph: Option<Paragraph>,
    pub table: Option<Table>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub table_rows: Vec<TableRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    #[serde(default)]
    pub table_cells: Vec<TableCell>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

/// Google Docs 客户端
#[derive(Clone)]
pub struct GoogleDocsClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
    timeout: Duration,
}

impl GoogleDocsClient {
    /// 创建新的 Docs 客户端
    ///
    /// `timeout` 作用于底层 HTTP 请求；流水线另有单次调用超时
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            access_token: access_token.into(),
            base_url: DOCS_API_BASE.to_string(),
            timeout,
        }
    }

    /// 使用自定义 API 地址创建
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 从文档链接中提取 ID
    ///
    /// 支持 `.../d/<id>/...`、`...?id=<id>` 以及直接给出的 ID
    pub fn extract_doc_id(doc_ref: &str) -> Option<String> {
        static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            [r"/d/([a-zA-Z0-9_-]+)", r"[?&]id=([a-zA-Z0-9_-]+)", r"^([a-zA-Z0-9_-]+)$"]
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect()
        });

        let doc_ref = doc_ref.trim();
        if doc_ref.is_empty() {
            return None;
        }
        patterns
            .iter()
            .find_map(|re| re.captures(doc_ref))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// 读取文档
    pub async fn fetch_document(&self, doc_id: &str) -> Result<Document, FetchError> {
        let url = format!("{}/{}", self.base_url, doc_id);
        debug!("正在读取文档: {}", doc_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, self.timeout))?;

        match response.status() {
            status if status.is_success() => response
                .json::<Document>()
                .await
                .map_err(|e| FetchError::Malformed(format!("文档 {} 无法解析: {}", doc_id, e))),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(doc_id.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(FetchError::AccessDenied(doc_id.to_string()))
            }
            StatusCode::BAD_REQUEST => Err(FetchError::Malformed(doc_id.to_string())),
            status => Err(FetchError::Unavailable(format!("HTTP {} ({})", status.as_u16(), doc_id))),
        }
    }

    /// 提取文档正文（段落 + 表格单元格）
    pub fn extract_text(document: &Document) -> String {
        let mut parts = Vec::new();
        collect_text(&document.body.content, &mut parts);
        parts.concat().trim().to_string()
    }
}

fn collect_text<'a>(elements: &'a [StructuralElement], parts: &mut Vec<&'a str>) {
    for element in elements {
        if let Some(paragraph) = &element.paragraph {
            for run in paragraph.elements.iter().filter_map(|e| e.text_run.as_ref()) {
                if !run.content.trim().is_empty() {
                    parts.push(&run.content);
                }
            }
        }
        if let Some(table) = &element.table {
            for cell in table.table_rows.iter().flat_map(|row| &row.table_cells) {
                collect_text(&cell.content, parts);
            }
        }
    }
}

fn map_transport_error(error: &reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Unavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::stub_server::StubServer;
    use crate::error::Retryable;

    #[test]
    fn test_extract_doc_id() {
        assert_eq!(
            GoogleDocsClient::extract_doc_id(
                "https://docs.google.com/document/d/1AbC-d_9/edit?usp=sharing"
            ),
            Some("1AbC-d_9".to_string())
        );
        assert_eq!(
            GoogleDocsClient::extract_doc_id("https://drive.google.com/open?id=XyZ_12"),
            Some("XyZ_12".to_string())
        );
        assert_eq!(
            GoogleDocsClient::extract_doc_id("  plainId123 "),
            Some("plainId123".to_string())
        );
        assert_eq!(GoogleDocsClient::extract_doc_id("not a link!"), None);
        assert_eq!(GoogleDocsClient::extract_doc_id(""), None);
    }

    #[test]
    fn test_extract_text_from_paragraphs_and_tables() {
        let json = r#"{
            "body": {
                "content": [
                    {"sectionBreak": {}},
                    {"paragraph": {"elements": [
                        {"textRun": {"content": "CREATE TABLE users;\n"}},
                        {"textRun": {"content": "   "}}
                    ]}},
                    {"table": {"tableRows": [
                        {"tableCells": [
                            {"content": [{"paragraph": {"elements": [{"textRun": {"content": "id INT\n"}}]}}]},
                            {"content": [{"paragraph": {"elements": [{"inlineObjectElement": {}}]}}]}
                        ]}
                    ]}}
                ]
            }
        }"#;
        let document: Document = serde_json::from_str(json).unwrap();
        assert_eq!(
            GoogleDocsClient::extract_text(&document),
            "CREATE TABLE users;\nid INT"
        );
    }

    #[test]
    fn test_empty_document() {
        let document: Document = serde_json::from_str("{}").unwrap();
        assert_eq!(GoogleDocsClient::extract_text(&document), "");
    }

    #[tokio::test]
    async fn test_stalled_request_reports_configured_timeout() {
        let server = StubServer::silent().await;
        let client = GoogleDocsClient::new("token", Duration::from_millis(200))
            .with_base_url(format!("{}/v1/documents", server.base_url));

        let err = client.fetch_document("abc").await.unwrap_err();

        assert_eq!(err, FetchError::Timeout(Duration::from_millis(200)));
        assert_eq!(err.to_string(), "读取文档超时 (200ms)");
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let missing = StubServer::respond_with("404 Not Found", "{}").await;
        let client = GoogleDocsClient::new("token", Duration::from_secs(5))
            .with_base_url(format!("{}/v1/documents", missing.base_url));
        assert_eq!(
            client.fetch_document("abc").await.unwrap_err(),
            FetchError::NotFound("abc".to_string())
        );
        assert!(missing.requests()[0].request_line.starts_with("GET /v1/documents/abc"));

        let busy = StubServer::respond_with("503 Service Unavailable", "{}").await;
        let client = GoogleDocsClient::new("token", Duration::from_secs(5))
            .with_base_url(format!("{}/v1/documents", busy.base_url));
        assert!(client.fetch_document("abc").await.unwrap_err().is_transient());
    }
}
