//! Serializable execution events.
//!
//! `TaskStreamEvent` mirrors every observer notification so a caller can
//! forward an execution over SSE, a WebSocket, or as JSON lines.

use serde::{Deserialize, Serialize};
use taskswarm_core::message::{Message, ToolCallRecord};
use taskswarm_core::provider::Usage;

/// Events emitted while a task queue executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskStreamEvent {
    /// `execute` began.
    Start,

    /// An LLM call is about to be made with `messages` history entries.
    LlmStart { messages: usize },

    /// Partial text token from the LLM.
    Token { content: String },

    /// Raw arguments fragment for an in-flight tool call.
    ToolCallArguments { id: String, fragment: String },

    /// A tool call completed.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// The LLM turn finished.
    LlmResponse { message: Message },

    /// Provider-reported token usage.
    TokenUsage { usage: Usage },

    TaskStart { task_id: String },

    TaskComplete { task_id: String },

    TaskError { task_id: String, message: String },

    /// The queue drained.
    Complete { message: String },

    /// An LLM call failed or was cancelled.
    Error { message: String, cancelled: bool },
}

impl TaskStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::LlmStart { .. } => "llm_start",
            Self::Token { .. } => "token",
            Self::ToolCallArguments { .. } => "tool_call_arguments",
            Self::ToolCall { .. } => "tool_call",
            Self::LlmResponse { .. } => "llm_response",
            Self::TokenUsage { .. } => "token_usage",
            Self::TaskStart { .. } => "task_start",
            Self::TaskComplete { .. } => "task_complete",
            Self::TaskError { .. } => "task_error",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

impl From<&ToolCallRecord> for TaskStreamEvent {
    fn from(call: &ToolCallRecord) -> Self {
        Self::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_serialization() {
        let event = TaskStreamEvent::Token {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"token""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn tool_call_from_record() {
        let record = ToolCallRecord {
            id: "c1".into(),
            name: "sum".into(),
            arguments: r#"{"a":1}"#.into(),
        };
        let event = TaskStreamEvent::from(&record);
        assert_eq!(event.event_type(), "tool_call");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "sum");
    }

    #[test]
    fn unit_variant_roundtrip() {
        let json = serde_json::to_string(&TaskStreamEvent::Start).unwrap();
        assert_eq!(json, r#"{"type":"start"}"#);
        let parsed: TaskStreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type(), "start");
    }

    #[test]
    fn event_types_match_serde_tags() {
        let events = vec![
            TaskStreamEvent::LlmStart { messages: 2 },
            TaskStreamEvent::TaskError {
                task_id: "a".into(),
                message: "boom".into(),
            },
            TaskStreamEvent::Error {
                message: "Execution cancelled".into(),
                cancelled: true,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }
}
