//! Message and tool-call domain types.
//!
//! These are the value objects that flow through the whole engine:
//! the task manager builds a history of messages, the streaming driver
//! reconstructs an assistant turn from deltas, and tool handlers answer
//! with tool-role messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The variable bag contents: string keys to arbitrary JSON values.
pub type Variables = HashMap<String, serde_json::Value>;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (task instructions)
    System,
    /// The end user
    User,
    /// The LLM's answer
    Assistant,
    /// A turn that requests actions, or the result of one
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A single message in a history.
///
/// Messages are treated as immutable once appended to a history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Function name for tool-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool calls requested in this turn, in completion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a tool result message answering `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.name = Some(name.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Insert a completed record, replacing any earlier record with the same id.
    pub fn upsert_tool_call(&mut self, record: ToolCallRecord) {
        match self.tool_calls.iter_mut().find(|tc| tc.id == record.id) {
            Some(existing) => *existing = record,
            None => self.tool_calls.push(record),
        }
    }
}

/// A tool invocation requested by the LLM.
///
/// Identity is the `id`: records sharing an id describe the same invocation.
/// `arguments` holds the raw JSON text accumulated from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Unique ID for this tool call within a turn
    pub id: String,

    /// Name of the function to invoke
    pub name: String,

    /// Arguments as JSON text
    pub arguments: String,
}

/// One streamed fragment of a tool call.
///
/// Empty strings mean the field was absent from the chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub arguments: String,
}

impl ToolCallDelta {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_tool_result_message() {
        let msg = Message::tool_result("call_1", "sum", "3");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.name.as_deref(), Some("sum"));
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.content, "3");
    }

    #[test]
    fn upsert_replaces_partial_record() {
        let mut msg = Message::assistant("");
        msg.upsert_tool_call(ToolCallRecord {
            id: "c1".into(),
            name: "sum".into(),
            arguments: "{\"a\"".into(),
        });
        msg.upsert_tool_call(ToolCallRecord {
            id: "c1".into(),
            name: "sum".into(),
            arguments: "{\"a\":1}".into(),
        });
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].arguments, "{\"a\":1}");
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Tool).unwrap();
        assert_eq!(json, "\"tool\"");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn delta_defaults_missing_fields() {
        let delta: ToolCallDelta = serde_json::from_str(r#"{"arguments":"}"}"#).unwrap();
        assert!(delta.id.is_empty());
        assert!(delta.name.is_empty());
        assert_eq!(delta.arguments, "}");
    }
}
