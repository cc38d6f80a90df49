//! # Auto Evaluator
//!
//! 批量评估学生提交文档的 Rust 应用程序：读取表格中的文档链接，
//! 按评分标准调用模型打分，再把分数和反馈写回原来的行
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 持有网络资源，只暴露能力
//! - `GoogleDocsClient` / `GoogleSheetsClient` / `LlmClient`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文档或单元格
//! - `DocumentFetcher` - 读取正文能力
//! - `Evaluator` - 评估打分能力
//! - `Worksheet` / `ResultWriter` - 表格读写能力
//! - `RunLog` - 审计记录能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文档"的完整处理流程
//! - `RetryPolicy` - 瞬时错误重试 + 指数退避
//! - `Worker` - 流程编排（fetch → evaluate → outcome）
//! - `CancelSignal` - 协作式取消
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 有界并发调度，收集每行终态
//! - `orchestrator/batch_runner` - 校验、调度、按行写回、生成报告
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::{Config, PipelineConfig};
pub use error::{AppError, AppResult, ConfigError};
pub use models::{BatchReport, Job, Outcome, RubricModel, SheetRow};
pub use orchestrator::{BatchRunner, Progress, Scheduler};
pub use workflow::{CancelSignal, RetryPolicy, Worker};
