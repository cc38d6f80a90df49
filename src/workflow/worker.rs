//! 单个文档的评估流程
//!
//! 读取正文 → 评估（经重试策略）→ 生成终态；任何错误都在这里变成 `Outcome::Failure`

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{EvalError, FetchError};
use crate::models::{FailureKind, Job, Outcome, RubricModel};
use crate::services::{DocumentFetcher, Evaluator};
use crate::workflow::cancel::CancelSignal;
use crate::workflow::retry::{RetryFailure, RetryPolicy};

/// Worker
///
/// 职责：
/// - 只处理一个任务
/// - 每次外部调用都受单次超时约束
/// - 不向上抛出错误
pub struct Worker {
    fetcher: Arc<dyn DocumentFetcher>,
    evaluator: Arc<dyn Evaluator>,
    rubric: Arc<RubricModel>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl Worker {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        evaluator: Arc<dyn Evaluator>,
        rubric: Arc<RubricModel>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            evaluator,
            rubric,
            retry,
            call_timeout,
        }
    }

    pub fn from_config(
        fetcher: Arc<dyn DocumentFetcher>,
        evaluator: Arc<dyn Evaluator>,
        rubric: Arc<RubricModel>,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(
            fetcher,
            evaluator,
            rubric,
            RetryPolicy::from_config(config),
            config.per_call_timeout,
        )
    }

    /// 运行一个任务，总是返回一个终态
    pub async fn run(&self, job: &Job, cancel: &CancelSignal) -> Outcome {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;
        let label = job.to_string();

        if cancel.is_cancelled() {
            return Outcome::cancelled();
        }

        // 1. 读取正文
        let text = match self.fetch(&label, &job.doc_ref, cancel).await {
            Ok(text) => text,
            Err(RetryFailure::Cancelled { .. }) => {
                return cancelled_after(&label, 0, elapsed());
            }
            Err(RetryFailure::Fatal { error, .. } | RetryFailure::Exhausted { error, .. }) => {
                warn!("{} ❌ 文档读取失败: {}", label, error);
                return Outcome::failure(FailureKind::FetchError, error.to_string(), 0, elapsed());
            }
        };

        if cancel.is_cancelled() {
            return cancelled_after(&label, 0, elapsed());
        }

        // 2. 评估
        let rubric = self.rubric.as_ref();
        let text = text.as_str();
        let evaluated = self
            .retry
            .execute(&label, cancel, move |attempt| {
                async move {
                    let result = tokio::time::timeout(
                        self.call_timeout,
                        self.evaluator.evaluate(text, rubric, attempt),
                    )
                    .await
                    .map_err(|_| EvalError::Timeout(self.call_timeout))??;

                    if result.score > rubric.total_points {
                        return Err(EvalError::MalformedResponse(format!(
                            "分数 {} 超出总分 {}",
                            result.score, rubric.total_points
                        )));
                    }
                    Ok::<_, EvalError>(result)
                }
            })
            .await;

        // 3. 生成终态
        match evaluated {
            Ok(retried) => {
                info!(
                    "{} ✓ 评估完成: {} / {} 分（第 {} 次尝试）",
                    label, retried.value.score, rubric.total_points, retried.attempts
                );
                Outcome::Success {
                    result: retried.value,
                    attempts: retried.attempts,
                    duration_ms: elapsed(),
                }
            }
            Err(RetryFailure::Fatal { error, attempts }) => Outcome::failure(
                FailureKind::EvaluationError,
                error.to_string(),
                attempts,
                elapsed(),
            ),
            Err(RetryFailure::Exhausted { error, attempts }) => Outcome::failure(
                FailureKind::RetryExhausted,
                format!("{} 次尝试后仍失败: {}", attempts, error),
                attempts,
                elapsed(),
            ),
            Err(RetryFailure::Cancelled { attempts, .. }) => cancelled_after(&label, attempts, elapsed()),
        }
    }

    async fn fetch(&self, label: &str, doc_ref: &str, cancel: &CancelSignal) -> Result<String, RetryFailure<FetchError>> {
        let fetched = self
            .retry
            .execute(label, cancel, move |_| async move {
                tokio::time::timeout(self.call_timeout, self.fetcher.fetch_text(doc_ref))
                    .await
                    .map_err(|_| FetchError::Timeout(self.call_timeout))?
            })
            .await?;
        Ok(fetched.value)
    }
}

fn cancelled_after(label: &str, attempts: u32, duration_ms: u64) -> Outcome {
    warn!("{} 运行已取消，任务中止", label);
    Outcome::failure(
        FailureKind::Cancelled,
        "运行已取消，任务未完成",
        attempts,
        duration_ms,
    )
}
