//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_runner` - 批量评估器
//! - 运行前校验配置和评分标准
//! - 每个表格行建一个任务（Vec<Job>）
//! - 按行号顺序写回结果，记录运行日志
//! - 生成批次报告
//!
//! ### `scheduler` - 调度器
//! - 控制并发数量（最多 `concurrency` 个在途任务）
//! - 收集每个任务的终态（行号 → Outcome）
//! - 上报进度，响应取消信号
//!
//! ## 层次关系
//!
//! ```text
//! batch_runner (处理 Vec<SheetRow>)
//!     ↓
//! scheduler (处理 Vec<Job>)
//!     ↓
//! workflow::Worker (处理单个 Job)
//!     ↓
//! services (能力层：fetch / evaluate / write / run log)
//!     ↓
//! clients (基础设施：Google Docs / Sheets / LLM)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_runner 管批次，scheduler 管并发
//! 2. **向下依赖**：编排层 → workflow → services → clients
//! 3. **无业务逻辑**：只做调度、写回和统计，不做具体评估判断

pub mod batch_runner;
pub mod scheduler;

// 重新导出主要类型
pub use batch_runner::BatchRunner;
pub use scheduler::{Progress, ProgressCallback, Scheduler};
