/// LLM API 客户端
///
/// 封装所有与 LLM API 相关的调用逻辑
///
/// ## 技术栈
/// - 使用 `async-openai` crate 进行 API 调用
/// - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
/// - 关闭 SDK 自带的限流重试，重试只由流水线的重试策略负责
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use backoff::ExponentialBackoffBuilder;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::EvalError;

/// 评分回复的最大 token 数
const MAX_RESPONSE_TOKENS: u32 = 2048;

/// LLM 客户端
#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    request_timeout: Duration,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        Self::with_model(config, config.llm_model_name.clone())
    }

    /// 创建自定义模型的 LLM 客户端
    pub fn with_model(config: &Config, model_name: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        // 每次 chat 只发一次 HTTP 请求
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry),
            model_name: model_name.into(),
            request_timeout: Duration::from_millis(config.per_call_timeout_ms),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 发送聊天请求
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容；失败按限流 / 鉴权 / 不可用分类
    pub async fn chat(&self, user_message: &str, system_message: Option<&str>) -> Result<String, EvalError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(request_error)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(request_error)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 评分需要可复现，温度固定为 0
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(MAX_RESPONSE_TOKENS)
            .build()
            .map_err(request_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            classify_llm_error(&e, self.request_timeout)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| EvalError::MalformedResponse("LLM 返回内容为空".to_string()))?;

        Ok(content.trim().to_string())
    }
}

fn request_error(error: OpenAIError) -> EvalError {
    EvalError::InvalidInput(format!("请求构建失败: {}", error))
}

/// 对 LLM 调用失败分类
///
/// 限流 / 配额 → `RateLimited`；请求或密钥被拒 → `InvalidInput`；超时 → `Timeout`；
/// 其余（5xx、连接失败等）→ `Unavailable`
pub fn classify_llm_error(error: &OpenAIError, timeout: Duration) -> EvalError {
    match error {
        OpenAIError::ApiError(api_error) => classify_api_error(api_error),
        OpenAIError::Reqwest(e) if e.is_timeout() => EvalError::Timeout(timeout),
        OpenAIError::JSONDeserialize(..) => EvalError::MalformedResponse(error.to_string()),
        OpenAIError::InvalidArgument(_) => EvalError::InvalidInput(error.to_string()),
        _ => EvalError::Unavailable(error.to_string()),
    }
}

const RATE_LIMIT_KINDS: &[&str] = &[
    "rate_limit_exceeded",
    "rate_limit_error",
    "insufficient_quota",
    "requests",
    "tokens",
];

const REJECTED_KINDS: &[&str] = &[
    "invalid_request_error",
    "invalid_api_key",
    "authentication_error",
    "permission_error",
    "context_length_exceeded",
    "model_not_found",
];

fn classify_api_error(api_error: &ApiError) -> EvalError {
    let kinds = [api_error.r#type.as_deref(), api_error.code.as_deref()];
    let is = |known: &[&str]| kinds.iter().flatten().any(|kind| known.contains(kind));

    if is(RATE_LIMIT_KINDS) {
        EvalError::RateLimited(api_error.to_string())
    } else if is(REJECTED_KINDS) {
        EvalError::InvalidInput(api_error.to_string())
    } else {
        EvalError::Unavailable(api_error.to_string())
    }
}
