//! Streaming response driver.
//!
//! Consumes one provider stream and turns it into a complete turn:
//! content deltas are concatenated, tool-call fragments go through the
//! [`ToolCallAccumulator`], and completed calls are folded into the message
//! by id. The loop exits on end-of-stream, a transport error, or
//! cancellation, and on no other path.

use std::sync::Arc;
use taskswarm_core::error::ExecutionError;
use taskswarm_core::message::{Message, Role, ToolCallRecord};
use taskswarm_core::observer::StreamObserver;
use taskswarm_core::provider::{
    CompletionRequest, FINISH_REASON_TOOL_CALLS, LlmClient, ToolCallCompletion, ToolDefinition,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::accumulator::ToolCallAccumulator;

/// Drives a single streaming completion.
#[derive(Clone)]
pub struct StreamingDriver {
    client: Arc<dyn LlmClient>,
}

impl StreamingDriver {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &dyn LlmClient {
        self.client.as_ref()
    }

    /// Stream one turn for `history`.
    ///
    /// Returns the assembled message: role `Tool` when it carries tool calls,
    /// `Assistant` otherwise. Cancellation yields `ExecutionError::Cancelled`
    /// and no partial message.
    pub async fn run<O>(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
        observer: &O,
        cancel: &CancellationToken,
    ) -> Result<Message, ExecutionError>
    where
        O: StreamObserver + ?Sized,
    {
        observer.on_llm_start(history);

        let result = self.stream_turn(history, tools, observer, cancel).await;
        match &result {
            Ok(message) => observer.on_llm_response(message),
            Err(e) => observer.on_error(e),
        }
        result
    }

    async fn stream_turn<O>(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
        observer: &O,
        cancel: &CancellationToken,
    ) -> Result<Message, ExecutionError>
    where
        O: StreamObserver + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        let request = CompletionRequest {
            messages: history.to_vec(),
            tools: tools.to_vec(),
        };

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
            opened = self.client.stream(request) => opened?,
        };

        let mode = self.client.tool_call_completion();
        let mut accumulator = ToolCallAccumulator::new(mode);
        let mut message = Message::assistant("");

        debug!(
            client = %self.client.name(),
            messages = history.len(),
            tools = tools.len(),
            ?mode,
            "Streaming turn"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                next = stream.recv() => next,
            };

            let chunk = match next {
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(chunk)) => chunk,
            };

            if let Some(usage) = &chunk.usage {
                observer.on_token_usage(usage);
            }

            // Only the first choice is consumed
            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };

            if let Some(text) = choice.content.filter(|t| !t.is_empty()) {
                message.content.push_str(&text);
                observer.on_token(&text);
            }

            for delta in &choice.tool_calls {
                let completed = match accumulator.process_delta(delta, tools, observer) {
                    Some(entry) if entry.is_complete => entry.record.clone(),
                    _ => continue,
                };
                record_call(&mut accumulator, &mut message, completed, observer);
            }

            if mode == ToolCallCompletion::FinishReason
                && choice.finish_reason.as_deref() == Some(FINISH_REASON_TOOL_CALLS)
            {
                flush(&mut accumulator, &mut message, observer);
            }
        }

        match mode {
            ToolCallCompletion::FinishReason => flush(&mut accumulator, &mut message, observer),
            ToolCallCompletion::Parse => {
                for entry in accumulator.pending() {
                    warn!(
                        call_id = %entry.record.id,
                        tool = %entry.record.name,
                        "Discarding incomplete tool call at end of stream"
                    );
                }
            }
        }

        if message.has_tool_calls() {
            message.role = Role::Tool;
        }

        debug!(
            content_len = message.content.len(),
            tool_calls = message.tool_calls.len(),
            "Stream finished"
        );

        Ok(message)
    }
}

fn flush<O>(accumulator: &mut ToolCallAccumulator, message: &mut Message, observer: &O)
where
    O: StreamObserver + ?Sized,
{
    for entry in accumulator.finish() {
        record_call(accumulator, message, entry.record, observer);
    }
}

fn record_call<O>(
    accumulator: &mut ToolCallAccumulator,
    message: &mut Message,
    record: ToolCallRecord,
    observer: &O,
) where
    O: StreamObserver + ?Sized,
{
    accumulator.mark_processed(&record.id);
    observer.on_tool_call(&record);
    message.upsert_tool_call(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use taskswarm_core::error::ProviderError;
    use taskswarm_core::message::ToolCallDelta;
    use taskswarm_core::provider::{StreamChunk, Usage};
    use taskswarm_core::NoopObserver;
    use taskswarm_providers::{ScriptedClient, ScriptedTurn};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl StreamObserver for Recorder {
        fn on_llm_start(&self, history: &[Message]) {
            self.push(format!("llm_start:{}", history.len()));
        }
        fn on_token(&self, text: &str) {
            self.push(format!("token:{text}"));
        }
        fn on_tool_call_arguments(&self, id: &str, fragment: &str) {
            self.push(format!("args:{id}:{fragment}"));
        }
        fn on_tool_call(&self, call: &ToolCallRecord) {
            self.push(format!("tool_call:{}", call.id));
        }
        fn on_llm_response(&self, message: &Message) {
            self.push(format!("response:{}", message.role));
        }
        fn on_token_usage(&self, usage: &Usage) {
            self.push(format!("usage:{}", usage.total_tokens));
        }
        fn on_error(&self, error: &ExecutionError) {
            self.push(format!("error:{error}"));
        }
    }

    fn sum_tool() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "sum".into(),
            description: "Add numbers".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]
    }

    fn driver(turns: Vec<ScriptedTurn>, mode: ToolCallCompletion) -> StreamingDriver {
        StreamingDriver::new(Arc::new(
            ScriptedClient::new(turns).with_tool_call_completion(mode),
        ))
    }

    #[tokio::test]
    async fn content_deltas_concatenate() {
        let driver = driver(
            vec![ScriptedTurn::new().content("Hel").content("lo")],
            ToolCallCompletion::Parse,
        );
        let recorder = Recorder::default();

        let message = driver
            .run(&[Message::user("hi")], &[], &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(message.content, "Hello");
        assert_eq!(message.role, Role::Assistant);
        assert!(!message.has_tool_calls());
        assert_eq!(
            recorder.events(),
            vec!["llm_start:1", "token:Hel", "token:lo", "response:assistant"]
        );
    }

    #[tokio::test]
    async fn parse_mode_completes_tool_call_mid_stream() {
        let driver = driver(
            vec![ScriptedTurn::new().tool_call("c1", "sum", r#"{"a":1,"b":2}"#)],
            ToolCallCompletion::Parse,
        );
        let recorder = Recorder::default();

        let message = driver
            .run(&[], &sum_tool(), &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].arguments, r#"{"a":1,"b":2}"#);
        let events = recorder.events();
        assert_eq!(events.iter().filter(|e| e.starts_with("args:c1")).count(), 2);
        assert_eq!(events.iter().filter(|e| *e == "tool_call:c1").count(), 1);
    }

    #[tokio::test]
    async fn repeated_complete_deltas_recorded_once() {
        let full = ToolCallDelta::new("c1", "sum", r#"{"a":1}"#);
        let driver = driver(
            vec![
                ScriptedTurn::new()
                    .chunk(StreamChunk::tool_calls(vec![full.clone()]))
                    .chunk(StreamChunk::tool_calls(vec![full])),
            ],
            ToolCallCompletion::Parse,
        );
        let recorder = Recorder::default();

        let message = driver
            .run(&[], &sum_tool(), &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(
            recorder.events().iter().filter(|e| *e == "tool_call:c1").count(),
            1
        );
    }

    #[tokio::test]
    async fn finish_reason_mode_waits_for_signal() {
        // `{}` parses on its own but the call is not over yet
        let driver = driver(
            vec![
                ScriptedTurn::new()
                    .chunk(StreamChunk::tool_calls(vec![ToolCallDelta::new("c1", "sum", "{}")]))
                    .chunk(StreamChunk::tool_calls(vec![ToolCallDelta::new("c2", "sum", "{\"a\":")]))
                    .chunk(StreamChunk::tool_calls(vec![ToolCallDelta::new("c2", "", "1}")]))
                    .finish(FINISH_REASON_TOOL_CALLS),
            ],
            ToolCallCompletion::FinishReason,
        );
        let recorder = Recorder::default();

        let message = driver
            .run(&[], &sum_tool(), &recorder, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = message.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(message.tool_calls[1].arguments, "{\"a\":1}");
        let events = recorder.events();
        let first_call = events.iter().position(|e| e.starts_with("tool_call:")).unwrap();
        let last_args = events.iter().rposition(|e| e.starts_with("args:")).unwrap();
        assert!(first_call > last_args);
    }

    #[tokio::test]
    async fn finish_reason_mode_flushes_at_end_of_stream() {
        let driver = driver(
            vec![ScriptedTurn::new().tool_call("c1", "sum", r#"{"a":1}"#)],
            ToolCallCompletion::FinishReason,
        );
        let message = driver
            .run(&[], &sum_tool(), &NoopObserver, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn parse_mode_discards_incomplete_call() {
        let driver = driver(
            vec![
                ScriptedTurn::new()
                    .content("thinking")
                    .chunk(StreamChunk::tool_calls(vec![ToolCallDelta::new("c1", "sum", "{\"a\":")])),
            ],
            ToolCallCompletion::Parse,
        );
        let message = driver
            .run(&[], &sum_tool(), &NoopObserver, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!message.has_tool_calls());
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "thinking");
    }

    #[tokio::test]
    async fn usage_and_choiceless_chunks() {
        let driver = driver(
            vec![
                ScriptedTurn::new()
                    .chunk(StreamChunk::default())
                    .content("ok")
                    .usage(Usage {
                        prompt_tokens: 3,
                        completion_tokens: 1,
                        total_tokens: 4,
                    }),
            ],
            ToolCallCompletion::Parse,
        );
        let recorder = Recorder::default();
        let message = driver
            .run(&[], &[], &recorder, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message.content, "ok");
        assert!(recorder.events().contains(&"usage:4".to_string()));
    }

    #[tokio::test]
    async fn transport_error_is_fatal() {
        let driver = driver(
            vec![
                ScriptedTurn::new()
                    .content("par")
                    .error(ProviderError::StreamInterrupted("connection reset".into())),
            ],
            ToolCallCompletion::Parse,
        );
        let recorder = Recorder::default();
        let err = driver
            .run(&[], &[], &recorder, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Provider(ProviderError::StreamInterrupted(_))
        ));
        assert!(!err.is_cancelled());
        assert!(recorder.events().last().unwrap().starts_with("error:"));
    }

    #[tokio::test]
    async fn open_failure_is_fatal() {
        let driver = driver(
            vec![ScriptedTurn::failing(ProviderError::RateLimited {
                retry_after_secs: 5,
            })],
            ToolCallCompletion::Parse,
        );
        let err = driver
            .run(&[], &[], &NoopObserver, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Provider(ProviderError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let client = Arc::new(ScriptedClient::new(vec![ScriptedTurn::text("never")]));
        let driver = StreamingDriver::new(client.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = driver.run(&[], &[], &NoopObserver, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_stalled_stream() {
        let driver = driver(
            vec![ScriptedTurn::new().content("partial").stall()],
            ToolCallCompletion::Parse,
        );
        let recorder = Recorder::default();
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            driver.run(&[], &[], &recorder, &cancel),
        )
        .await
        .expect("driver should observe cancellation");
        canceller.await.unwrap();

        assert!(result.unwrap_err().is_cancelled());
        let events = recorder.events();
        assert!(events.contains(&"token:partial".to_string()));
        assert_eq!(events.last().unwrap(), "error:Execution cancelled");
    }
}
