//! Stream observer: callbacks for streaming and completion events.
//!
//! Notifications are synchronous and in-line with stream consumption:
//! a slow observer stalls the driver. Every method defaults to a no-op so
//! implementors only override what they care about.

use crate::error::ExecutionError;
use crate::message::{Message, ToolCallRecord};
use crate::provider::Usage;

pub trait StreamObserver: Send + Sync {
    /// An execution began.
    fn on_start(&self) {}

    /// The LLM is about to be called with `history`.
    fn on_llm_start(&self, _history: &[Message]) {}

    /// A content delta arrived.
    fn on_token(&self, _text: &str) {}

    /// A raw arguments fragment arrived for tool call `id`.
    fn on_tool_call_arguments(&self, _id: &str, _fragment: &str) {}

    /// A tool call completed.
    fn on_tool_call(&self, _call: &ToolCallRecord) {}

    /// The LLM turn finished.
    fn on_llm_response(&self, _message: &Message) {}

    /// The provider reported token usage.
    fn on_token_usage(&self, _usage: &Usage) {}

    /// The whole execution finished.
    fn on_complete(&self, _message: &Message) {}

    /// The LLM call failed.
    fn on_error(&self, _error: &ExecutionError) {}
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}
