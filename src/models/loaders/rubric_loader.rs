use std::path::Path;

use tokio::fs;

use crate::error::ConfigError;
use crate::models::rubric::RubricModel;

/// 从文件加载评分标准并校验
///
/// - 支持 `.json` 和 `.toml`
/// - 文件不存在时使用内置默认标准
pub async fn load_rubric(path: &Path, tolerance: u32) -> Result<RubricModel, ConfigError> {
    let rubric = if fs::try_exists(path).await.unwrap_or(false) {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| load_failed(path, e))?;
        let rubric = parse_rubric(path, &content)?;
        tracing::info!(
            "已加载评分标准: {} ({} 项，总分 {})",
            path.display(),
            rubric.criteria.len(),
            rubric.total_points
        );
        rubric
    } else {
        tracing::warn!("评分标准文件不存在: {}，使用默认评分标准", path.display());
        RubricModel::default_rubric()
    };

    rubric.validate(tolerance)?;
    Ok(rubric)
}

/// 按扩展名解析评分标准内容
pub fn parse_rubric(path: &Path, content: &str) -> Result<RubricModel, ConfigError> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(content).map_err(|e| load_failed(path, e)),
        Some("json") | None => serde_json::from_str(content).map_err(|e| load_failed(path, e)),
        Some(other) => Err(load_failed(path, format!("不支持的文件类型: .{other}"))),
    }
}

fn load_failed(path: &Path, reason: impl ToString) -> ConfigError {
    ConfigError::RubricLoadFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
