//! Built-in tools available to pipeline tasks by name.

use serde_json::json;
use taskswarm_core::provider::ToolDefinition;
use taskswarm_engine::{TaskResult, TaskTool};

pub const SET_VARIABLES: &str = "set_variables";
pub const CURRENT_TIME: &str = "current_time";

/// Names accepted in a task's `tools` list.
pub const NAMES: &[&str] = &[SET_VARIABLES, CURRENT_TIME];

/// Build the built-in tool called `name`.
pub fn lookup(name: &str) -> Option<TaskTool> {
    match name {
        SET_VARIABLES => Some(set_variables()),
        CURRENT_TIME => Some(current_time()),
        _ => None,
    }
}

/// Stores every argument as a variable for later tasks.
fn set_variables() -> TaskTool {
    let definition = ToolDefinition {
        name: SET_VARIABLES.into(),
        description: "Store values for later tasks. Each argument becomes a variable \
                      that later instructions can reference as {{NAME}}."
            .into(),
        parameters: json!({
            "type": "object",
            "additionalProperties": true
        }),
    };

    TaskTool::from_fn(definition, |args, _ctx| {
        let mut keys: Vec<&str> = args.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let response = format!("Stored {} variable(s): {}", keys.len(), keys.join(", "));
        Ok(TaskResult::new(response).with_variables(args.into_iter().collect()))
    })
}

/// Stores the current UTC time in `current_time`.
fn current_time() -> TaskTool {
    let definition = ToolDefinition {
        name: CURRENT_TIME.into(),
        description: "Get the current date and time in UTC (RFC 3339).".into(),
        parameters: json!({
            "type": "object",
            "properties": {}
        }),
    };

    TaskTool::from_fn(definition, |_args, _ctx| {
        let now = chrono::Utc::now().to_rfc3339();
        Ok(TaskResult::new(now.clone()).with_variable(CURRENT_TIME, now))
    })
}
