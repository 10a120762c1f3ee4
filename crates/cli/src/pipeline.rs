//! Turning a pipeline file into engine tasks.

use serde_json::Value;
use taskswarm_config::PipelineConfig;
use taskswarm_core::error::ToolError;
use taskswarm_core::message::Variables;
use taskswarm_engine::{Task, template};

use crate::builtin;

/// Build the tasks of `pipeline`, attaching built-in tools by name.
pub fn build_tasks(pipeline: &PipelineConfig) -> Result<Vec<Task>, ToolError> {
    pipeline
        .tasks
        .iter()
        .map(|config| {
            let mut task = Task::new(&config.id, &config.instructions);
            for name in &config.tools {
                let tool = builtin::lookup(name).ok_or_else(|| ToolError::NotFound(name.clone()))?;
                task.add_tool(tool)?;
            }
            Ok(task)
        })
        .collect()
}

/// The pipeline's variables with `--var` overrides applied.
///
/// Override values are read as JSON when they parse (`3`, `true`,
/// `["a","b"]`) and kept as plain strings otherwise.
pub fn initial_variables(pipeline: &PipelineConfig, overrides: &[(String, String)]) -> Variables {
    let mut variables = pipeline.variables.clone();
    for (key, value) in overrides {
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.clone()));
        variables.insert(key.clone(), value);
    }
    variables
}

/// Parse a `KEY=VALUE` argument.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// `{{KEY}}` placeholders in `instructions` with no matching variable.
///
/// Candidates containing braces or line breaks are stray `{{` text, not
/// placeholders, and are skipped.
pub fn unresolved_placeholders(instructions: &str, variables: &Variables) -> Vec<String> {
    let known = template::lookup_table(variables);
    let mut missing: Vec<String> = Vec::new();

    for placeholder in template::placeholders(instructions) {
        if !placeholder.is_well_formed() || known.contains_key(placeholder.key) {
            continue;
        }
        if !missing.iter().any(|m| m == placeholder.key) {
            missing.push(placeholder.key.to_string());
        }
    }
    missing
}
