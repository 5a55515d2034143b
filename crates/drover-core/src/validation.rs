//! Validation for configuration and task records, reported as issues rather
//! than hard errors so the caller decides what is fatal.

use serde::{Deserialize, Serialize};

use crate::config::{AiProvider, Config};
use crate::types::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.level == ValidationLevel::Error
    }
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

impl Validate for Config {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        // An hour between requests almost certainly means a unit mix-up
        // (seconds entered where milliseconds were expected).
        if self.delay_ms > 3_600_000 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "delayMs.very_large",
                message: format!(
                    "delayMs of {} ms is more than an hour between requests",
                    self.delay_ms
                ),
            });
        }

        match self.ai_provider {
            AiProvider::Ollama => {
                if !self.ollama_base_url.starts_with("http://")
                    && !self.ollama_base_url.starts_with("https://")
                {
                    issues.push(ValidationIssue {
                        level: ValidationLevel::Error,
                        code: "ollamaBaseUrl.invalid",
                        message: format!(
                            "ollamaBaseUrl {:?} is not an http(s) URL",
                            self.ollama_base_url
                        ),
                    });
                }
                if self.ollama_model.trim().is_empty() {
                    issues.push(ValidationIssue {
                        level: ValidationLevel::Error,
                        code: "ollamaModel.empty",
                        message: "ollamaModel must not be empty".to_string(),
                    });
                }
            }
            AiProvider::Copilot => {
                if self.copilot_model.trim().is_empty() {
                    issues.push(ValidationIssue {
                        level: ValidationLevel::Error,
                        code: "copilotModel.empty",
                        message: "copilotModel must not be empty".to_string(),
                    });
                }
            }
            AiProvider::Gemini => {}
        }

        issues
    }
}

impl Validate for Task {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.id.0.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "task.id.empty",
                message: "task id must not be empty".to_string(),
            });
        }

        if self.name.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "task.name.empty",
                message: "task name must not be empty".to_string(),
            });
        } else if !self
            .name
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token.len() >= 3)
        {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "task.name.unusable",
                message: format!(
                    "task name {:?} has no token long enough to derive a branch name",
                    self.name
                ),
            });
        }

        issues
    }
}
