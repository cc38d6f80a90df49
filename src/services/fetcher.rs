//! 文档读取服务 - 业务能力层
//!
//! 只负责"把文档引用变成正文"能力，不关心流程

use async_trait::async_trait;
use tracing::debug;

use crate::clients::GoogleDocsClient;
use crate::error::FetchError;

/// 文档读取边界
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// 读取文档正文
    async fn fetch_text(&self, doc_ref: &str) -> Result<String, FetchError>;
}

/// 基于 Google Docs 的文档读取
///
/// 职责：
/// - 从链接中提取文档 ID
/// - 拒绝空文档 / 过短的文档
/// - 截断过长的正文
pub struct GoogleDocsFetcher {
    client: GoogleDocsClient,
    min_chars: usize,
    max_chars: usize,
}

impl GoogleDocsFetcher {
    pub fn new(client: GoogleDocsClient, min_chars: usize, max_chars: usize) -> Self {
        Self {
            client,
            min_chars,
            max_chars,
        }
    }
}

#[async_trait]
impl DocumentFetcher for GoogleDocsFetcher {
    async fn fetch_text(&self, doc_ref: &str) -> Result<String, FetchError> {
        let doc_id = GoogleDocsClient::extract_doc_id(doc_ref)
            .ok_or_else(|| FetchError::Malformed(doc_ref.to_string()))?;

        let document = self.client.fetch_document(&doc_id).await?;
        let text = GoogleDocsClient::extract_text(&document);

        debug!("文档 {} 提取到 {} 个字符", doc_id, text.chars().count());
        check_length(text, self.min_chars, self.max_chars)
    }
}

/// 检查正文长度，超长时按字符截断
pub fn check_length(text: String, min_chars: usize, max_chars: usize) -> Result<String, FetchError> {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    if chars == 0 || chars < min_chars {
        return Err(FetchError::Empty {
            chars,
            min: min_chars,
        });
    }
    if chars > max_chars {
        return Ok(trimmed.chars().take(max_chars).collect());
    }
    Ok(trimmed.to_string())
}
