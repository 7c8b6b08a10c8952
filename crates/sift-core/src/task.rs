//! Classification task vocabulary
//!
//! Every task is a fixed prompt pair plus a small policy describing which
//! rows it reads and where its answers go. Adding a task means adding a
//! variant here; everything downstream matches on it exhaustively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The two fixed instructions that precede every chunk of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Sent with the system role
    pub system_instruction: String,
    /// Sent with the assistant role, describes the expected line shape
    pub response_format_instruction: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            system_instruction: system.into(),
            response_format_instruction: format.into(),
        }
    }
}

/// Which rows of the source table a task classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFilter {
    /// Every row
    All,
    /// Only rows whose comparison column equals the configured opinion label
    OpinionsOnly,
}

/// Data-driven behavior of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPolicy {
    /// Rows carry the comparison column value as a third field
    pub uses_comparison: bool,
    pub filter: RowFilter,
    /// Column the labels land in when the caller does not name one
    pub default_output_column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CreateCategory,
    EvaluateCategory,
    SummarizeOpinion,
    SummarizeEval,
    EvaluateAsOthers,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::CreateCategory,
        TaskKind::EvaluateCategory,
        TaskKind::SummarizeOpinion,
        TaskKind::SummarizeEval,
        TaskKind::EvaluateAsOthers,
    ];

    /// Stable identifier, used on the command line and in cache fingerprints
    pub fn id(&self) -> &'static str {
        match self {
            TaskKind::CreateCategory => "create_category",
            TaskKind::EvaluateCategory => "evaluate_category",
            TaskKind::SummarizeOpinion => "summarize_opinion",
            TaskKind::SummarizeEval => "summarize_eval",
            TaskKind::EvaluateAsOthers => "evaluate_as_others",
        }
    }

    /// Human-readable label shown in task pickers
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskKind::CreateCategory => "create category (of 4 types)",
            TaskKind::EvaluateCategory => "evaluate category",
            TaskKind::SummarizeOpinion => "summarize opinion",
            TaskKind::SummarizeEval => "summarize eval",
            TaskKind::EvaluateAsOthers => "evaluate as others",
        }
    }

    pub fn policy(&self) -> TaskPolicy {
        match self {
            TaskKind::CreateCategory => TaskPolicy {
                uses_comparison: false,
                filter: RowFilter::All,
                default_output_column: "category",
            },
            TaskKind::EvaluateCategory => TaskPolicy {
                uses_comparison: true,
                filter: RowFilter::All,
                default_output_column: "eval",
            },
            TaskKind::SummarizeOpinion => TaskPolicy {
                uses_comparison: true,
                filter: RowFilter::OpinionsOnly,
                default_output_column: "summary",
            },
            TaskKind::SummarizeEval => TaskPolicy {
                uses_comparison: true,
                filter: RowFilter::OpinionsOnly,
                default_output_column: "keyword",
            },
            TaskKind::EvaluateAsOthers => TaskPolicy {
                uses_comparison: true,
                filter: RowFilter::All,
                default_output_column: "opinion_category",
            },
        }
    }

    pub fn template(&self) -> PromptTemplate {
        let (system, format) = match self {
            TaskKind::CreateCategory => (CREATE_CATEGORY, FORMAT_CREATE_CATEGORY),
            TaskKind::EvaluateCategory => (EVALUATE_CATEGORY, FORMAT_EVALUATE_CATEGORY),
            TaskKind::SummarizeOpinion => (SUMMARIZE_OPINION, FORMAT_SUMMARIZE_OPINION),
            TaskKind::SummarizeEval => (SUMMARIZE_EVAL, FORMAT_SUMMARIZE_EVAL),
            TaskKind::EvaluateAsOthers => (EVALUATE_AS_OTHERS, FORMAT_EVALUATE_AS_OTHERS),
        };
        PromptTemplate::new(system, format)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    /// Accepts the id (`create_category`), its kebab-case form, or the
    /// display name.
    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        let normalized = needle.replace('-', "_");
        TaskKind::ALL
            .into_iter()
            .find(|task| task.id() == normalized || task.display_name() == needle)
            .ok_or_else(|| {
                let known: Vec<_> = TaskKind::ALL.iter().map(|t| t.id()).collect();
                Error::InvalidSelection(format!(
                    "Unknown task '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

const CREATE_CATEGORY: &str = r#"For every "index:content", classify every "content" based on whether it contains an idea for improvement or not:
if there's no idea for improvement
    - value: 무의견 (if there is absolutely no information)
    - value: 만족 (if one is simply thankful for the service)
    - value: 불만족 (if one is simply dissatisfied with the service)
if there's an idea for improvement
    - value: 의견"#;

const FORMAT_CREATE_CATEGORY: &str = r#"Input format is [index:content]
Your output format MUST follow [index:value]
Your number of outputs should be equal to the number of inputs
(NEVER concatenate multiple indices into one line, eg. 41-44, 43~64 <- prohibited)"#;

const EVALUATE_CATEGORY: &str = r#"For every "index:content:category", evaluate whether the category is accurate or not
1. Read content and think whether the category is accurate or not
2. If category is accurate, write a blank and skip
3. If category is not accurate, write a different category it should belong
4. If category is 의견, write your concise summary of the content (in Korean)
    (Your summary should be concise/consistent enough to fit in a single line)"#;

const FORMAT_EVALUATE_CATEGORY: &str = r#"Input format is [index:content:category]
Your output format MUST follow [index:eval]
Your number of outputs should be equal to the number of inputs
(NEVER concatenate multiple indices into one line, eg. 41-44, 43~64 <- prohibited)"#;

const SUMMARIZE_OPINION: &str = r#"For every "index:suggestion:category",
write your concise summary of each suggestion (in Korean)
(Your summary should be concise/consistent enough to fit in a single line)"#;

const FORMAT_SUMMARIZE_OPINION: &str = r#"Input format is [index:suggestion:category]
Your output format MUST follow [index:summary]
Your number of outputs should be equal to the number of inputs
(NEVER concatenate multiple indices into one line, eg. 41-44, 43~64 <- prohibited)"#;

const SUMMARIZE_EVAL: &str = r#"For every "index:suggestion",
write two keywords that summarizes a main point of the suggestion (in Korean, no more than two words)"#;

const FORMAT_SUMMARIZE_EVAL: &str = r#"Input format is [index:suggestion]
Your output format MUST follow [index:keyword]
Your number of outputs should be equal to the number of inputs"#;

const EVALUATE_AS_OTHERS: &str = r#"For every "index:opinion:opinion_category",
if opinion_category is 'blank', fill the blank with a category that fits the opinion
(The format should be similar to other opinion categories)"#;

const FORMAT_EVALUATE_AS_OTHERS: &str = r#"Input format is [index:opinion:opinion_category]
Your output format MUST follow [index:opinion_category]"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_names() {
        assert_eq!(
            "create_category".parse::<TaskKind>().unwrap(),
            TaskKind::CreateCategory
        );
        assert_eq!(
            "summarize-eval".parse::<TaskKind>().unwrap(),
            TaskKind::SummarizeEval
        );
        assert_eq!(
            "evaluate as others".parse::<TaskKind>().unwrap(),
            TaskKind::EvaluateAsOthers
        );
        assert!(matches!(
            "translate".parse::<TaskKind>(),
            Err(Error::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_ids_round_trip() {
        for task in TaskKind::ALL {
            assert_eq!(task.id().parse::<TaskKind>().unwrap(), task);
            assert_eq!(task.display_name().parse::<TaskKind>().unwrap(), task);
        }
    }

    #[test]
    fn test_every_task_has_prompts() {
        for task in TaskKind::ALL {
            let template = task.template();
            assert!(!template.system_instruction.is_empty());
            assert!(template.response_format_instruction.contains("Input format"));
        }
    }

    #[test]
    fn test_summaries_only_read_opinions() {
        assert_eq!(TaskKind::SummarizeOpinion.policy().filter, RowFilter::OpinionsOnly);
        assert_eq!(TaskKind::SummarizeEval.policy().filter, RowFilter::OpinionsOnly);
        assert_eq!(TaskKind::CreateCategory.policy().filter, RowFilter::All);
        assert!(!TaskKind::CreateCategory.policy().uses_comparison);
    }
}
