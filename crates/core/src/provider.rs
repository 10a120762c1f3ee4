//! LLM client trait: the boundary to a streaming chat-completion backend.
//!
//! A client turns a history plus tool definitions into a stream of raw
//! chunks. It does not accumulate tool calls; reconstruction of complete
//! invocations is the engine's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::{Message, ToolCallDelta};

/// The receiving half of a chunk stream. A closed channel is end-of-stream.
pub type ChunkStream = tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// The `finish_reason` a provider reports when a turn ends on tool calls.
pub const FINISH_REASON_TOOL_CALLS: &str = "tool_calls";

/// A tool definition sent to the LLM so it knows what it may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The function name
    pub name: String,

    /// Description of what the function does
    pub description: String,

    /// JSON Schema describing the function's parameters
    pub parameters: serde_json::Value,
}

/// One streaming completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The history to send
    pub messages: Vec<Message>,

    /// Functions the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Choices carried by this chunk; only the first is consumed
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Usage counters, when the provider reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The delta for one choice within a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Content delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool-call fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,

    /// Why the turn stopped (`stop`, `tool_calls`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    /// A chunk with a single content delta.
    pub fn content(text: impl Into<String>) -> Self {
        Self::from_choice(ChunkChoice {
            content: Some(text.into()),
            ..ChunkChoice::default()
        })
    }

    /// A chunk with tool-call fragments.
    pub fn tool_calls(deltas: Vec<ToolCallDelta>) -> Self {
        Self::from_choice(ChunkChoice {
            tool_calls: deltas,
            ..ChunkChoice::default()
        })
    }

    /// A chunk that only reports a finish reason.
    pub fn finish(reason: impl Into<String>) -> Self {
        Self::from_choice(ChunkChoice {
            finish_reason: Some(reason.into()),
            ..ChunkChoice::default()
        })
    }

    /// A choice-less chunk reporting usage (OpenAI's `include_usage` tail).
    pub fn usage(usage: Usage) -> Self {
        Self {
            choices: Vec::new(),
            usage: Some(usage),
        }
    }

    fn from_choice(choice: ChunkChoice) -> Self {
        Self {
            choices: vec![choice],
            usage: None,
        }
    }
}

/// How a client tells the engine that a tool call's arguments are complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallCompletion {
    /// The accumulated arguments parse as a JSON object
    Parse,
    /// The provider reports `finish_reason = "tool_calls"`
    #[default]
    FinishReason,
}

/// The core LLM client trait.
///
/// Implementations own transport, authentication and vendor translation.
/// Retries and rate limiting are the caller's concern.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Open a streaming completion.
    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, ProviderError>;

    /// Which completion signal this client's streams carry.
    fn tool_call_completion(&self) -> ToolCallCompletion {
        ToolCallCompletion::Parse
    }
}
