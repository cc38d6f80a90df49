pub mod evaluator;
pub mod fetcher;
pub mod run_log;
pub mod sheet;

pub use evaluator::{parse_evaluation, Evaluator, LlmEvaluator};
pub use fetcher::{DocumentFetcher, GoogleDocsFetcher};
pub use run_log::{RunLog, RunLogEntry};
pub use sheet::{ResultWriter, SheetResultWriter, Worksheet};
