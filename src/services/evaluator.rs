//! 评估服务 - 业务能力层
//!
//! 只负责"给一篇文档打分"能力，不关心流程
//!
//! ## 技术栈
//! - 通过 [`LlmClient`] 调用兼容 OpenAI API 的模型
//! - 模型按 JSON 返回分数和反馈，本模块负责解析和校验

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::clients::LlmClient;
use crate::error::EvalError;
use crate::models::{EvaluationResult, RubricModel};

/// 评估边界
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// 按评分标准评估文档
    ///
    /// `attempt` 为当前尝试序号（从 1 开始），实现可以据此调整请求
    async fn evaluate(
        &self,
        text: &str,
        rubric: &RubricModel,
        attempt: u32,
    ) -> Result<EvaluationResult, EvalError>;
}

const SYSTEM_PROMPT: &str = "You are a precise academic grading system. \
Grade strictly against the rubric you are given and only cite features that actually exist in the document. \
Reply with pure JSON (no markdown) of the form: \
{\"total_score\": <integer>, \"breakdown\": {\"<criterion>\": <integer>}, \
\"strengths\": [\"...\"], \"weaknesses\": [\"...\"], \"recommendations\": [\"...\"], \
\"plagiarism_flags\": \"<short note or 'None detected'>\"}";

/// 基于 LLM 的评估
pub struct LlmEvaluator {
    client: LlmClient,
}

impl LlmEvaluator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn build_user_message(text: &str, rubric: &RubricModel) -> String {
        format!(
            "{}\nThe total_score must be an integer between 0 and {}.\n\nDOCUMENT TO EVALUATE:\n\n{}",
            rubric.to_prompt(),
            rubric.total_points,
            text
        )
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        text: &str,
        rubric: &RubricModel,
        attempt: u32,
    ) -> Result<EvaluationResult, EvalError> {
        debug!("第 {} 次评估，正文 {} 字符", attempt, text.chars().count());

        let user_message = Self::build_user_message(text, rubric);
        let response = self.client.chat(&user_message, Some(SYSTEM_PROMPT)).await?;

        parse_evaluation(&response, rubric.total_points)
    }
}

/// 字符串或字符串列表
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            TextOrList::Text(text) => vec![text],
            TextOrList::List(list) => list,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    total_score: JsonValue,
    #[serde(default)]
    breakdown: BTreeMap<String, JsonValue>,
    #[serde(default)]
    strengths: Option<TextOrList>,
    #[serde(default, alias = "improvements")]
    weaknesses: Option<TextOrList>,
    #[serde(default)]
    recommendations: Option<TextOrList>,
    #[serde(default)]
    plagiarism_flags: Option<String>,
}

/// 解析模型返回的 JSON
///
/// 允许外层包着 Markdown 代码块；分数可以是数字或数字字符串
pub fn parse_evaluation(response: &str, total_points: u32) -> Result<EvaluationResult, EvalError> {
    let body = strip_code_fence(response);
    let raw: RawEvaluation = serde_json::from_str(body)
        .map_err(|e| EvalError::MalformedResponse(format!("{e}: {}", truncate(body, 200))))?;

    let score = score_from_json(&raw.total_score)
        .ok_or_else(|| EvalError::MalformedResponse(format!("无效的分数: {}", raw.total_score)))?;
    if score > u64::from(total_points) {
        return Err(EvalError::MalformedResponse(format!(
            "分数 {} 超出总分 {}",
            score, total_points
        )));
    }

    let breakdown = raw
        .breakdown
        .iter()
        .filter_map(|(name, value)| {
            score_from_json(value).map(|points| (name.clone(), points.min(u64::from(u32::MAX)) as u32))
        })
        .collect();

    Ok(EvaluationResult {
        score: score as u32,
        breakdown,
        strengths: raw.strengths.map(TextOrList::into_vec).unwrap_or_default(),
        improvements: raw.weaknesses.map(TextOrList::into_vec).unwrap_or_default(),
        recommendations: raw.recommendations.map(TextOrList::into_vec).unwrap_or_default(),
        plagiarism_note: raw
            .plagiarism_flags
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}

fn score_from_json(value: &JsonValue) -> Option<u64> {
    let number = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(number.round() as u64)
}

fn strip_code_fence(content: &str) -> &str {
    let content = content.trim();
    if let Some(rest) = content.split("```json").nth(1) {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    if let Some(inner) = content.split("```").nth(1) {
        return inner.trim();
    }
    content
}

fn truncate(text: &str, max_chars: usize) -> String {
    crate::utils::logging::truncate_text(text, max_chars)
}
