//! Task manager: runs a FIFO queue of tasks against the LLM.
//!
//! Each task renders its instructions against the root variables, streams a
//! turn in a forked child context, dispatches any tool calls, and feeds the
//! results back into the parent history. Execution is strictly sequential
//! and fail-fast: the first failing task ends the run, and side effects of
//! earlier tasks are kept.

use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use taskswarm_core::error::{ExecutionError, ToolError};
use taskswarm_core::message::Message;
use taskswarm_core::observer::NoopObserver;
use taskswarm_core::provider::LlmClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::TaskExecutionContext;
use crate::driver::StreamingDriver;
use crate::observer::TaskObserver;
use crate::task::{Task, TaskResult};
use crate::template;

/// Message passed to `on_complete` when the queue drains.
pub const EXECUTION_COMPLETE: &str = "Execution complete";

pub struct TaskManager {
    driver: StreamingDriver,
    observer: Arc<dyn TaskObserver>,
    queue: VecDeque<Task>,
}

impl TaskManager {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            driver: StreamingDriver::new(client),
            observer: Arc::new(NoopObserver),
            queue: VecDeque::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TaskObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Queue a task at the back.
    pub fn add_task(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Remove and return the task at the front.
    pub fn pop_task(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Run every queued task in order against `ctx`.
    ///
    /// Each task's response is appended to `ctx` as an assistant message.
    /// Stops at the first failure; the queue keeps the tasks that did not run.
    pub async fn execute(
        &mut self,
        ctx: &mut TaskExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        if self.queue.is_empty() {
            return Err(ExecutionError::NoTasks);
        }

        info!(tasks = self.queue.len(), "Starting execution");
        self.observer.on_start();

        while let Some(mut task) = self.pop_task() {
            let result = self.execute_task(&mut task, ctx, cancel).await?;

            ctx.push(Message::assistant(result.response));
            ctx.merge(result.variables);
        }

        info!("Execution complete");
        self.observer
            .on_complete(&Message::assistant(EXECUTION_COMPLETE));
        Ok(())
    }

    /// Run a single task as a child of `parent`.
    ///
    /// Tool results are appended to `parent`. The returned result carries the
    /// turn's content and the variables visible after the task ran.
    pub async fn execute_task(
        &self,
        task: &mut Task,
        parent: &mut TaskExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ExecutionError> {
        self.observer.on_task_start(task);

        match self.run_task(task, parent, cancel).await {
            Ok(result) => {
                self.observer.on_task_complete(task);
                Ok(result)
            }
            Err(e) => {
                self.observer.on_task_error(task, &e);
                Err(e)
            }
        }
    }

    async fn run_task(
        &self,
        task: &mut Task,
        parent: &mut TaskExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ExecutionError> {
        task.instructions = template::render(&task.instructions, &parent.variables().snapshot());

        info!(
            task_id = %task.id,
            tools = task.tool_count(),
            history = parent.messages.len(),
            "Executing task"
        );

        let mut history = parent.messages.clone();
        history.push(Message::system(task.instructions.as_str()));
        let definitions = task.tool_definitions();

        let child = parent.fork(task.id.clone());
        child.messages = history;

        let message = self
            .driver
            .run(&child.messages, &definitions, self.observer.as_ref(), cancel)
            .await?;

        let mut tool_messages = Vec::new();
        let dispatched = self
            .dispatch_tool_calls(task, &message, child, cancel, &mut tool_messages)
            .await;

        let response = message.content.clone();
        child.push(message);

        // Results flow up even when a later call failed
        parent.messages.append(&mut tool_messages);
        dispatched?;

        Ok(TaskResult {
            response,
            variables: parent.variables().snapshot(),
        })
    }

    /// Run each completed call in order, collecting tool-role messages.
    async fn dispatch_tool_calls(
        &self,
        task: &Task,
        message: &Message,
        child: &TaskExecutionContext,
        cancel: &CancellationToken,
        results: &mut Vec<Message>,
    ) -> Result<(), ExecutionError> {
        for call in &message.tool_calls {
            let tool = task
                .tool(&call.name)
                .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

            let args: Map<String, Value> =
                serde_json::from_str(&call.arguments).map_err(|e| ToolError::InvalidArguments {
                    tool_name: call.name.clone(),
                    reason: e.to_string(),
                })?;

            debug!(task_id = %task.id, call_id = %call.id, tool = %call.name, "Dispatching tool call");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                result = tool.run(args, child) => result?,
            };

            results.push(Message::tool_result(
                call.id.as_str(),
                call.name.as_str(),
                result.response,
            ));
            child.merge(result.variables);
        }
        Ok(())
    }
}
