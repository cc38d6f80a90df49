use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// 程序配置
///
/// 进程启动时构造一次，之后只读；流水线内部只看到 [`PipelineConfig`]
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时评估的文档数量
    pub max_workers: usize,
    /// 每个文档最多评估几次
    pub retry_attempts: u32,
    /// 单次读取/评估调用的超时（毫秒）
    pub per_call_timeout_ms: u64,
    /// 首次重试前的等待（毫秒）
    pub backoff_initial_ms: u64,
    /// 单次等待上限（毫秒）
    pub backoff_max_ms: u64,
    /// 反馈中是否附带抄袭检查说明
    pub include_plagiarism_check: bool,
    /// 评分标准文件
    pub rubric_path: PathBuf,
    /// 各项分值之和允许超出总分的幅度
    pub rubric_tolerance: u32,
    /// 文档最少字符数
    pub min_document_chars: usize,
    /// 送入模型的最大字符数
    pub max_document_chars: usize,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- Google 配置 ---
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub google_access_token: String,
    pub doc_link_column: String,
    pub student_name_column: String,
    pub score_column: String,
    pub feedback_column: String,
    /// 数据起始行（第 1 行通常是表头）
    pub start_row: usize,
    // --- 输出 ---
    pub log_dir: PathBuf,
    pub run_log_file: PathBuf,
    pub report_output_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: 5,
            retry_attempts: 3,
            per_call_timeout_ms: 60_000,
            backoff_initial_ms: 2_000,
            backoff_max_ms: 30_000,
            include_plagiarism_check: true,
            rubric_path: PathBuf::from("rubrics/default_rubric.json"),
            rubric_tolerance: 0,
            min_document_chars: 100,
            max_document_chars: 15_000,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".to_string(),
            google_access_token: String::new(),
            doc_link_column: "A".to_string(),
            student_name_column: "B".to_string(),
            score_column: "C".to_string(),
            feedback_column: "D".to_string(),
            start_row: 2,
            log_dir: PathBuf::from("logs"),
            run_log_file: PathBuf::from("logs/run_log.jsonl"),
            report_output_path: None,
        }
    }
}

impl Config {
    /// 从环境变量加载（会先读取 `.env`）
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载，便于测试
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let string = |key: &str, fallback: String| lookup(key).unwrap_or(fallback);

        Ok(Self {
            max_workers: parse_var(&lookup, "MAX_WORKERS", default.max_workers)?,
            retry_attempts: parse_var(&lookup, "RETRY_ATTEMPTS", default.retry_attempts)?,
            per_call_timeout_ms: parse_var(&lookup, "PER_CALL_TIMEOUT_MS", default.per_call_timeout_ms)?,
            backoff_initial_ms: parse_var(&lookup, "BACKOFF_INITIAL_MS", default.backoff_initial_ms)?,
            backoff_max_ms: parse_var(&lookup, "BACKOFF_MAX_MS", default.backoff_max_ms)?,
            include_plagiarism_check: parse_bool(&lookup, "INCLUDE_PLAGIARISM_CHECK", default.include_plagiarism_check)?,
            rubric_path: lookup("RUBRIC_PATH").map(PathBuf::from).unwrap_or(default.rubric_path),
            rubric_tolerance: parse_var(&lookup, "RUBRIC_TOLERANCE", default.rubric_tolerance)?,
            min_document_chars: parse_var(&lookup, "MIN_DOCUMENT_CHARS", default.min_document_chars)?,
            max_document_chars: parse_var(&lookup, "MAX_DOCUMENT_CHARS", default.max_document_chars)?,
            llm_api_key: string("LLM_API_KEY", default.llm_api_key),
            llm_api_base_url: string("LLM_API_BASE_URL", default.llm_api_base_url),
            llm_model_name: string("LLM_MODEL_NAME", default.llm_model_name),
            spreadsheet_id: string("SPREADSHEET_ID", default.spreadsheet_id),
            sheet_name: string("SHEET_NAME", default.sheet_name),
            google_access_token: string("GOOGLE_ACCESS_TOKEN", default.google_access_token),
            doc_link_column: string("DOC_LINK_COLUMN", default.doc_link_column),
            student_name_column: string("STUDENT_NAME_COLUMN", default.student_name_column),
            score_column: string("SCORE_COLUMN", default.score_column),
            feedback_column: string("FEEDBACK_COLUMN", default.feedback_column),
            start_row: parse_var(&lookup, "START_ROW", default.start_row)?,
            log_dir: lookup("LOG_DIR").map(PathBuf::from).unwrap_or(default.log_dir),
            run_log_file: lookup("RUN_LOG_FILE").map(PathBuf::from).unwrap_or(default.run_log_file),
            report_output_path: lookup("REPORT_OUTPUT_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// 校验进程级配置（密钥、表格、列名）
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("LLM_API_KEY".into()));
        }
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::Missing("SPREADSHEET_ID".into()));
        }
        if self.google_access_token.trim().is_empty() {
            return Err(ConfigError::Missing("GOOGLE_ACCESS_TOKEN".into()));
        }
        for (name, column) in [
            ("DOC_LINK_COLUMN", &self.doc_link_column),
            ("STUDENT_NAME_COLUMN", &self.student_name_column),
            ("SCORE_COLUMN", &self.score_column),
            ("FEEDBACK_COLUMN", &self.feedback_column),
        ] {
            if column.is_empty() || !column.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ConfigError::invalid(name, format!("'{column}' 不是合法的列名")));
            }
        }
        if self.start_row == 0 {
            return Err(ConfigError::invalid("START_ROW", "行号从 1 开始"));
        }
        self.pipeline().validate()
    }

    /// 流水线使用的不可变配置
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            concurrency: self.max_workers,
            max_attempts_per_document: self.retry_attempts,
            per_call_timeout: Duration::from_millis(self.per_call_timeout_ms),
            backoff_initial: Duration::from_millis(self.backoff_initial_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            plagiarism_check_enabled: self.include_plagiarism_check,
            rubric_path: self.rubric_path.clone(),
            rubric_tolerance: self.rubric_tolerance,
            min_document_chars: self.min_document_chars,
            max_document_chars: self.max_document_chars,
        }
    }
}

/// 流水线配置
///
/// 由 [`Config::pipeline`] 构造后按引用传入 `BatchRunner`，
/// Worker 和 Scheduler 不再读取任何环境变量
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub max_attempts_per_document: u32,
    pub per_call_timeout: Duration,
    pub backoff_initial: Duration,
    /// 单次退避等待的上限
    pub backoff_max: Duration,
    pub plagiarism_check_enabled: bool,
    pub rubric_path: PathBuf,
    pub rubric_tolerance: u32,
    pub min_document_chars: usize,
    pub max_document_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Config::default().pipeline()
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "必须大于 0"));
        }
        if self.max_attempts_per_document == 0 {
            return Err(ConfigError::invalid("max_attempts_per_document", "必须大于 0"));
        }
        if self.per_call_timeout.is_zero() {
            return Err(ConfigError::invalid("per_call_timeout", "必须大于 0"));
        }
        if self.backoff_initial > self.backoff_max {
            return Err(ConfigError::invalid(
                "backoff_initial",
                format!("{:?} 超过了上限 {:?}", self.backoff_initial, self.backoff_max),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: key.to_string(),
            value: raw.clone(),
            expected_type: std::any::type_name::<T>().to_string(),
        }),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::EnvVarParseFailed {
                var_name: key.to_string(),
                value: raw,
                expected_type: "bool".to_string(),
            }),
        },
    }
}
