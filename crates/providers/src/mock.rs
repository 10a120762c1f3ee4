//! Scripted LLM client for tests and offline runs.
//!
//! Each call to `stream` replays the next [`ScriptedTurn`] as raw chunks, the
//! same shape a real provider produces. Requests are recorded so tests can
//! inspect the history the engine sent.
//!
//! ```rust,ignore
//! let client = ScriptedClient::new(vec![
//!     ScriptedTurn::new()
//!         .tool_call("call_1", "sum", r#"{"a":1,"b":2}"#)
//!         .finish("tool_calls"),
//!     ScriptedTurn::text("The answer is 3"),
//! ]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use taskswarm_core::error::ProviderError;
use taskswarm_core::message::ToolCallDelta;
use taskswarm_core::provider::*;
use tokio::sync::mpsc;

/// One scripted LLM turn.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    /// Items sent on the stream, in order
    items: Vec<Result<StreamChunk, ProviderError>>,
    /// Fail `stream()` itself instead of opening a stream
    open_error: Option<ProviderError>,
    /// Keep the stream open after the last item until the receiver drops
    stall: bool,
}

impl ScriptedTurn {
    pub fn new() -> Self {
        Self::default()
    }

    /// A plain answer: one content chunk and `finish_reason = "stop"`.
    pub fn text(content: &str) -> Self {
        Self::new().content(content).finish("stop")
    }

    /// A turn whose `stream()` call fails before any chunk is produced.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::default()
        }
    }

    /// Append a content delta.
    pub fn content(self, text: &str) -> Self {
        self.chunk(StreamChunk::content(text))
    }

    /// Append a tool call streamed in fragments: a header delta carrying the
    /// name, then the arguments split in two.
    pub fn tool_call(self, id: &str, name: &str, arguments: &str) -> Self {
        let mut mid = arguments.len() / 2;
        while !arguments.is_char_boundary(mid) {
            mid -= 1;
        }
        let (head, tail) = arguments.split_at(mid);

        self.chunk(StreamChunk::tool_calls(vec![ToolCallDelta::new(id, name, "")]))
            .chunk(StreamChunk::tool_calls(vec![ToolCallDelta::new(id, "", head)]))
            .chunk(StreamChunk::tool_calls(vec![ToolCallDelta::new(id, "", tail)]))
    }

    /// Append a finish-reason chunk.
    pub fn finish(self, reason: &str) -> Self {
        self.chunk(StreamChunk::finish(reason))
    }

    /// Append a choice-less usage chunk.
    pub fn usage(self, usage: Usage) -> Self {
        self.chunk(StreamChunk::usage(usage))
    }

    /// Append an arbitrary chunk.
    pub fn chunk(mut self, chunk: StreamChunk) -> Self {
        self.items.push(Ok(chunk));
        self
    }

    /// Append a transport error; the stream ends after it.
    pub fn error(mut self, error: ProviderError) -> Self {
        self.items.push(Err(error));
        self
    }

    /// Hold the stream open after the scripted items.
    pub fn stall(mut self) -> Self {
        self.stall = true;
        self
    }
}

/// An [`LlmClient`] that replays scripted turns in order.
pub struct ScriptedClient {
    name: String,
    completion: ToolCallCompletion,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            name: "scripted".into(),
            completion: ToolCallCompletion::FinishReason,
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Choose the completion signal reported to the engine.
    pub fn with_tool_call_completion(mut self, completion: ToolCallCompletion) -> Self {
        self.completion = completion;
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `stream` calls made.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Turns not yet replayed.
    pub fn remaining(&self) -> usize {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool_call_completion(&self) -> ToolCallCompletion {
        self.completion
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let turn = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("scripted client has no turns left".into()))?;

        let ScriptedTurn {
            items,
            open_error,
            stall,
        } = turn;
        if let Some(error) = open_error {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for item in items {
                let is_error = item.is_err();
                if tx.send(item).await.is_err() {
                    return; // receiver dropped
                }
                if is_error {
                    return;
                }
            }
            if stall {
                tx.closed().await;
            }
        });

        Ok(rx)
    }
}
