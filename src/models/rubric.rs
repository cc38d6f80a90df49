//! 评分标准
//!
//! 运行开始时加载一次，之后只读，所有 Worker 通过 `Arc` 共享

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 单个评分项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub points: u32,
    #[serde(default)]
    pub description: String,
}

impl Criterion {
    pub fn new(name: impl Into<String>, points: u32, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points,
            description: description.into(),
        }
    }
}

/// 评分标准
///
/// 各项分值只是权重参考，之和不必等于总分，但不能超出总分太多
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricModel {
    pub total_points: u32,
    pub criteria: Vec<Criterion>,
}

impl RubricModel {
    pub fn new(total_points: u32, criteria: Vec<Criterion>) -> Self {
        Self {
            total_points,
            criteria,
        }
    }

    /// 内置的默认评分标准（数据库课程设计，100 分）
    pub fn default_rubric() -> Self {
        Self::new(
            100,
            vec![
                Criterion::new(
                    "SQL Implementation",
                    25,
                    "Table creation with correct types and constraints, realistic insert data, index strategy, code quality",
                ),
                Criterion::new(
                    "ER Model & Database Design",
                    20,
                    "Complete ER diagram, correct relationships and cardinality, normalization to 3NF",
                ),
                Criterion::new(
                    "Query Design & Optimization",
                    25,
                    "Correct and meaningful queries, appropriate complexity, indexes aligned with query patterns",
                ),
                Criterion::new(
                    "Design Documentation & Justification",
                    20,
                    "Scenario understanding, entity justification, normalization and optimization explanations",
                ),
                Criterion::new(
                    "Originality & Authenticity",
                    10,
                    "Personal voice and creative, justified design choices",
                ),
            ],
        )
    }

    /// 各项分值之和
    pub fn criteria_points(&self) -> u64 {
        self.criteria.iter().map(|c| u64::from(c.points)).sum()
    }

    /// 校验评分标准
    ///
    /// `tolerance`：各项之和允许超出总分的点数
    pub fn validate(&self, tolerance: u32) -> Result<(), ConfigError> {
        if self.total_points == 0 {
            return Err(ConfigError::InvalidRubric("总分必须大于 0".into()));
        }
        if self.criteria.is_empty() {
            return Err(ConfigError::InvalidRubric("至少需要一个评分项".into()));
        }
        for criterion in &self.criteria {
            if criterion.name.trim().is_empty() {
                return Err(ConfigError::InvalidRubric("评分项名称不能为空".into()));
            }
            if criterion.points == 0 {
                return Err(ConfigError::InvalidRubric(format!(
                    "评分项 '{}' 的分值必须大于 0",
                    criterion.name
                )));
            }
        }

        let sum = self.criteria_points();
        let ceiling = u64::from(self.total_points) + u64::from(tolerance);
        if sum > ceiling {
            return Err(ConfigError::InvalidRubric(format!(
                "各项分值之和 {} 超出总分 {}（容差 {}）",
                sum, self.total_points, tolerance
            )));
        }
        Ok(())
    }

    /// 渲染成提示词中的评分标准段落
    pub fn to_prompt(&self) -> String {
        let mut text = String::from("Evaluate the following document according to these criteria:\n\n");
        for criterion in &self.criteria {
            text.push_str(&format!(
                "{} ({} points): {}\n",
                criterion.name, criterion.points, criterion.description
            ));
        }
        text.push_str(&format!("\nTotal possible points: {}\n", self.total_points));
        text
    }
}

impl Default for RubricModel {
    fn default() -> Self {
        Self::default_rubric()
    }
}
