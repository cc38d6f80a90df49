pub mod job;
pub mod loaders;
pub mod outcome;
pub mod report;
pub mod rubric;

pub use job::{Job, SheetRow};
pub use loaders::load_rubric;
pub use outcome::{EvaluationResult, FailureKind, Outcome, ERROR_MARKER};
pub use report::{BatchReport, ReportSummary, WriteFailure};
pub use rubric::{Criterion, RubricModel};
