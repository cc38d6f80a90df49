//! 重试策略
//!
//! - 致命错误立即返回，不重试
//! - 瞬时错误最多尝试 `max_attempts` 次，两次尝试之间指数退避
//! - 单次等待不超过 `max_backoff`
//! - 两次尝试之间检查取消信号；正在进行的尝试不会被打断

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::PipelineConfig;
use crate::error::Retryable;
use crate::workflow::cancel::CancelSignal;

/// 成功结果及其尝试次数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// 重试失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure<E> {
    /// 遇到致命错误
    Fatal { error: E, attempts: u32 },
    /// 瞬时错误，次数用尽
    Exhausted { error: E, attempts: u32 },
    /// 等待重试期间被取消
    Cancelled { last_error: Option<E>, attempts: u32 },
}

impl<E> RetryFailure<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryFailure::Fatal { attempts, .. }
            | RetryFailure::Exhausted { attempts, .. }
            | RetryFailure::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// 重试策略
///
/// 本身不持有状态，多个 Worker 可以同时使用同一个实例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` 至少为 1；`initial_backoff` 超过上限时按上限处理
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: initial_backoff.min(max_backoff),
            max_backoff,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.max_attempts_per_document,
            config.backoff_initial,
            config.backoff_max,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 `failed_attempts` 次失败后的等待时间
    ///
    /// 单调不减，且不超过 `max_backoff`
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// 执行 `operation`，按错误类别决定是否重试
    ///
    /// `operation` 的参数是当前尝试的序号（从 1 开始）
    pub async fn execute<T, E, F, Fut>(
        &self,
        label: &str,
        cancel: &CancelSignal,
        mut operation: F,
    ) -> Result<Retried<T>, RetryFailure<E>>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation(attempt).await {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                    })
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                error!("{} ❌ 第 {} 次尝试遇到不可重试的错误: {}", label, attempt, error);
                return Err(RetryFailure::Fatal {
                    error,
                    attempts: attempt,
                });
            }

            if attempt >= self.max_attempts {
                error!("{} ❌ 已尝试 {} 次，放弃: {}", label, attempt, error);
                return Err(RetryFailure::Exhausted {
                    error,
                    attempts: attempt,
                });
            }

            let delay = self.delay_after(attempt);
            warn!(
                "{} ⚠️ 第 {}/{} 次尝试失败: {}，{}ms 后重试",
                label,
                attempt,
                self.max_attempts,
                error,
                delay.as_millis()
            );

            if cancel.is_cancelled() {
                return Err(RetryFailure::Cancelled {
                    last_error: Some(error),
                    attempts: attempt,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {}
            }

            if cancel.is_cancelled() {
                warn!("{} 运行已取消，不再重试", label);
                return Err(RetryFailure::Cancelled {
                    last_error: Some(error),
                    attempts: attempt,
                });
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
