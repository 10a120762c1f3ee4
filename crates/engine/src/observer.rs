//! Task-level observers.
//!
//! [`TaskObserver`] extends the core stream notifications with task
//! lifecycle callbacks. Two implementations ship here: [`ChannelObserver`]
//! turns notifications into [`TaskStreamEvent`]s on a channel, and
//! [`TracingObserver`] logs them.

use taskswarm_core::error::ExecutionError;
use taskswarm_core::message::{Message, ToolCallRecord};
use taskswarm_core::observer::{NoopObserver, StreamObserver};
use taskswarm_core::provider::Usage;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::event::TaskStreamEvent;
use crate::task::Task;

/// Stream notifications plus task lifecycle callbacks.
pub trait TaskObserver: StreamObserver {
    fn on_task_start(&self, _task: &Task) {}

    fn on_task_complete(&self, _task: &Task) {}

    /// Called once per failing task.
    fn on_task_error(&self, _task: &Task, _error: &ExecutionError) {}
}

impl TaskObserver for NoopObserver {}

/// Forwards every notification as a [`TaskStreamEvent`].
///
/// Sends never block; once the receiver is dropped events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TaskStreamEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<TaskStreamEvent>) -> Self {
        Self { tx }
    }

    /// An observer and the receiver for its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskStreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn emit(&self, event: TaskStreamEvent) {
        let _ = self.tx.send(event);
    }
}

impl StreamObserver for ChannelObserver {
    fn on_start(&self) {
        self.emit(TaskStreamEvent::Start);
    }

    fn on_llm_start(&self, history: &[Message]) {
        self.emit(TaskStreamEvent::LlmStart {
            messages: history.len(),
        });
    }

    fn on_token(&self, text: &str) {
        self.emit(TaskStreamEvent::Token {
            content: text.to_string(),
        });
    }

    fn on_tool_call_arguments(&self, id: &str, fragment: &str) {
        self.emit(TaskStreamEvent::ToolCallArguments {
            id: id.to_string(),
            fragment: fragment.to_string(),
        });
    }

    fn on_tool_call(&self, call: &ToolCallRecord) {
        self.emit(TaskStreamEvent::from(call));
    }

    fn on_llm_response(&self, message: &Message) {
        self.emit(TaskStreamEvent::LlmResponse {
            message: message.clone(),
        });
    }

    fn on_token_usage(&self, usage: &Usage) {
        self.emit(TaskStreamEvent::TokenUsage { usage: *usage });
    }

    fn on_complete(&self, message: &Message) {
        self.emit(TaskStreamEvent::Complete {
            message: message.content.clone(),
        });
    }

    fn on_error(&self, error: &ExecutionError) {
        self.emit(TaskStreamEvent::Error {
            message: error.to_string(),
            cancelled: error.is_cancelled(),
        });
    }
}

impl TaskObserver for ChannelObserver {
    fn on_task_start(&self, task: &Task) {
        self.emit(TaskStreamEvent::TaskStart {
            task_id: task.id.clone(),
        });
    }

    fn on_task_complete(&self, task: &Task) {
        self.emit(TaskStreamEvent::TaskComplete {
            task_id: task.id.clone(),
        });
    }

    fn on_task_error(&self, task: &Task, error: &ExecutionError) {
        self.emit(TaskStreamEvent::TaskError {
            task_id: task.id.clone(),
            message: error.to_string(),
        });
    }
}

/// Logs every notification through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StreamObserver for TracingObserver {
    fn on_start(&self) {
        info!("Execution started");
    }

    fn on_llm_start(&self, history: &[Message]) {
        debug!(messages = history.len(), "Calling LLM");
    }

    fn on_token(&self, text: &str) {
        trace!(len = text.len(), "Token");
    }

    fn on_tool_call_arguments(&self, id: &str, fragment: &str) {
        trace!(call_id = %id, len = fragment.len(), "Tool call arguments");
    }

    fn on_tool_call(&self, call: &ToolCallRecord) {
        debug!(call_id = %call.id, tool = %call.name, "Tool call complete");
    }

    fn on_llm_response(&self, message: &Message) {
        debug!(
            role = %message.role,
            content_len = message.content.len(),
            tool_calls = message.tool_calls.len(),
            "LLM response"
        );
    }

    fn on_token_usage(&self, usage: &Usage) {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Token usage"
        );
    }

    fn on_complete(&self, message: &Message) {
        info!(message = %message.content, "Execution finished");
    }

    fn on_error(&self, error: &ExecutionError) {
        if error.is_cancelled() {
            info!("LLM call cancelled");
        } else {
            warn!(error = %error, "LLM call failed");
        }
    }
}

impl TaskObserver for TracingObserver {
    fn on_task_start(&self, task: &Task) {
        info!(task_id = %task.id, tools = task.tool_count(), "Task started");
    }

    fn on_task_complete(&self, task: &Task) {
        info!(task_id = %task.id, "Task complete");
    }

    fn on_task_error(&self, task: &Task, error: &ExecutionError) {
        warn!(task_id = %task.id, error = %error, "Task failed");
    }
}
