//! Pipeline files: a task queue described in TOML.
//!
//! ```toml
//! [variables]
//! topic = "rust ownership"
//!
//! [[tasks]]
//! id = "outline"
//! instructions = "Write an outline about {{TOPIC}}."
//! tools = ["set_variables"]
//! ```

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use taskswarm_core::message::Variables;

/// A pipeline definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Initial contents of the root variable bag
    #[serde(default)]
    pub variables: Variables,

    /// Tasks, executed in order
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

/// One task in a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task ID (also the child-context key)
    pub id: String,

    /// Instructions template with `{{KEY}}` placeholders
    pub instructions: String,

    /// Names of built-in tools this task may call
    #[serde(default)]
    pub tools: Vec<String>,
}

impl PipelineConfig {
    /// Parse and validate a pipeline from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let pipeline: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: "<inline>".into(),
            reason: e.to_string(),
        })?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Load and validate a pipeline file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let pipeline: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        pipeline.validate()?;
        Ok(pipeline)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tasks.is_empty() {
            return Err(ConfigError::ValidationError(
                "pipeline must define at least one task".into(),
            ));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.id.trim().is_empty() {
                return Err(ConfigError::ValidationError("task id must not be empty".into()));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
            if task.instructions.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "task '{}' has empty instructions",
                    task.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variables_and_tasks() {
        let toml_str = r#"
[variables]
topic = "ownership"
attempts = 3

[[tasks]]
id = "outline"
instructions = "Outline {{TOPIC}}"
tools = ["set_variables"]

[[tasks]]
id = "draft"
instructions = "Draft from {{OUTLINE}}"
"#;
        let pipeline = PipelineConfig::from_toml(toml_str).unwrap();
        assert_eq!(pipeline.tasks.len(), 2);
        assert_eq!(pipeline.tasks[0].tools, vec!["set_variables".to_string()]);
        assert!(pipeline.tasks[1].tools.is_empty());
        assert_eq!(pipeline.variables["topic"], serde_json::json!("ownership"));
        assert_eq!(pipeline.variables["attempts"], serde_json::json!(3));
    }

    #[test]
    fn empty_pipeline_rejected() {
        let err = PipelineConfig::from_toml("[variables]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn duplicate_task_ids_rejected() {
        let toml_str = r#"
[[tasks]]
id = "a"
instructions = "one"

[[tasks]]
id = "a"
instructions = "two"
"#;
        let err = PipelineConfig::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("duplicate task id 'a'"));
    }

    #[test]
    fn blank_instructions_rejected() {
        let toml_str = "[[tasks]]\nid = \"a\"\ninstructions = \"  \"\n";
        assert!(PipelineConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn load_from_missing_file_fails() {
        let err = PipelineConfig::load_from(Path::new("/nonexistent/pipeline.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
