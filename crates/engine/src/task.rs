//! Tasks and the tools they may call.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use taskswarm_core::error::ToolError;
use taskswarm_core::message::Variables;
use taskswarm_core::provider::ToolDefinition;

use crate::context::TaskExecutionContext;

/// What a handler (or a finished task) produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResult {
    /// Text fed back to the conversation
    pub response: String,

    /// Variables to merge into the context
    pub variables: Variables,
}

impl TaskResult {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            variables: Variables::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }
}

/// Runs one tool call.
///
/// Handlers may do arbitrary I/O. They run to completion unless the
/// execution is cancelled, in which case the future is dropped.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(
        &self,
        args: Map<String, Value>,
        ctx: &TaskExecutionContext,
    ) -> Result<TaskResult, ToolError>;
}

/// Adapter for synchronous closures.
struct FnHandler<F>(F);

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>, &TaskExecutionContext) -> Result<TaskResult, ToolError>
        + Send
        + Sync,
{
    async fn run(
        &self,
        args: Map<String, Value>,
        ctx: &TaskExecutionContext,
    ) -> Result<TaskResult, ToolError> {
        (self.0)(args, ctx)
    }
}

/// A tool definition paired with its handler.
#[derive(Clone)]
pub struct TaskTool {
    pub definition: ToolDefinition,
    handler: Arc<dyn TaskHandler>,
}

impl TaskTool {
    pub fn new(definition: ToolDefinition, handler: impl TaskHandler + 'static) -> Self {
        Self {
            definition,
            handler: Arc::new(handler),
        }
    }

    /// Wrap a synchronous closure as a handler.
    pub fn from_fn<F>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(Map<String, Value>, &TaskExecutionContext) -> Result<TaskResult, ToolError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(definition, FnHandler(handler))
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub async fn run(
        &self,
        args: Map<String, Value>,
        ctx: &TaskExecutionContext,
    ) -> Result<TaskResult, ToolError> {
        self.handler.run(args, ctx).await
    }
}

impl std::fmt::Debug for TaskTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// One unit of instructed work.
///
/// `instructions` is a template; the manager renders it in place right
/// before execution, so a task object is meant to run once.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub instructions: String,
    tools: BTreeMap<String, TaskTool>,
}

impl Task {
    pub fn new(id: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instructions: instructions.into(),
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool; function names must be unique within a task.
    pub fn add_tool(&mut self, tool: TaskTool) -> Result<(), ToolError> {
        if self.tools.contains_key(tool.name()) {
            return Err(ToolError::DuplicateName(tool.name().to_string()));
        }
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    pub fn with_tool(mut self, tool: TaskTool) -> Result<Self, ToolError> {
        self.add_tool(tool)?;
        Ok(self)
    }

    pub fn tool(&self, name: &str) -> Option<&TaskTool> {
        self.tools.get(name)
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Definitions sent to the LLM, ordered by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }
}
