//! 错误类型
//!
//! 按"能不能重试"划分：
//! - `FetchError` / `EvalError` 实现 [`Retryable`]，由 `RetryPolicy` 判断是否重试
//! - `WriteError` 只记录，不影响其他行
//! - `ConfigError` 在任何任务开始前中止整个运行

use std::time::Duration;

use thiserror::Error;

/// 可分类为"瞬时 / 致命"的错误
pub trait Retryable {
    /// 是否值得重试（限流、超时、网络抖动等）
    fn is_transient(&self) -> bool;
}

/// 文档读取错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 文档不存在
    #[error("文档不存在: {0}")]
    NotFound(String),
    /// 无权访问
    #[error("无权访问文档: {0}")]
    AccessDenied(String),
    /// 文档引用无法解析
    #[error("无效的文档引用: {0}")]
    Malformed(String),
    /// 文档为空或过短
    #[error("文档内容过短 ({chars} 字符，至少需要 {min})")]
    Empty { chars: usize, min: usize },
    /// 单次调用超时
    #[error("读取文档超时 ({0:?})")]
    Timeout(Duration),
    /// 服务暂时不可用（429 / 5xx / 连接失败）
    #[error("文档服务暂时不可用: {0}")]
    Unavailable(String),
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Unavailable(_))
    }
}

/// 评估（LLM）错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// 请求频率限制 / 配额不足
    #[error("请求频率限制: {0}")]
    RateLimited(String),
    /// 单次调用超时
    #[error("评估调用超时 ({0:?})")]
    Timeout(Duration),
    /// 服务暂时不可用
    #[error("评估服务暂时不可用: {0}")]
    Unavailable(String),
    /// 模型返回内容无法解析，或分数越界
    #[error("评估结果无法解析: {0}")]
    MalformedResponse(String),
    /// 输入被拒绝（密钥无效、评分标准被拒等），不重试
    #[error("评估输入无效: {0}")]
    InvalidInput(String),
}

impl Retryable for EvalError {
    fn is_transient(&self) -> bool {
        !matches!(self, EvalError::InvalidInput(_))
    }
}

/// 结果写回错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("写入第 {row_index} 行失败: {message}")]
pub struct WriteError {
    pub row_index: usize,
    pub message: String,
    /// 配额不足 / 5xx / 网络抖动
    pub transient: bool,
}

impl WriteError {
    pub fn new(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            row_index,
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            transient: true,
            ..Self::new(row_index, message)
        }
    }
}

impl Retryable for WriteError {
    fn is_transient(&self) -> bool {
        self.transient
    }
}

/// 表格读取错误
#[derive(Debug, Error)]
pub enum SheetError {
    /// 网络请求失败
    #[error("表格请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 返回非成功状态码
    #[error("表格返回错误响应 ({endpoint}): HTTP {status}")]
    BadResponse { endpoint: String, status: u16 },
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必填项缺失
    #[error("缺少配置项: {0}")]
    Missing(String),
    /// 配置值不合法
    #[error("配置项 {name} 不合法: {reason}")]
    Invalid { name: String, reason: String },
    /// 评分标准不合法
    #[error("评分标准不合法: {0}")]
    InvalidRubric(String),
    /// 评分标准文件读取/解析失败
    #[error("无法加载评分标准 ({path}): {reason}")]
    RubricLoadFailed { path: String, reason: String },
    /// 同一批次中行号重复
    #[error("行号 {0} 在本批次中重复出现")]
    DuplicateRow(usize),
}

impl ConfigError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    #[error("表格错误: {0}")]
    Sheet(#[from] SheetError),
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
