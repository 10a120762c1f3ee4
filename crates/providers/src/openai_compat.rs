//! OpenAI-compatible streaming client.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI and any endpoint
//! exposing `/v1/chat/completions` with SSE streaming.
//!
//! The client translates each SSE chunk into a raw [`StreamChunk`] and does
//! not assemble tool calls. The only state it keeps is the tool-call
//! index→id map, because OpenAI sends the id on the first delta only.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use taskswarm_core::error::ProviderError;
use taskswarm_core::message::{Message, Role, ToolCallDelta};
use taskswarm_core::provider::*;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible streaming client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    completion: ToolCallCompletion,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            completion: ToolCallCompletion::FinishReason,
            client,
        })
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Build a client from application configuration.
    pub fn from_config(config: &taskswarm_config::AppConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured("no API key configured".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self::new("openai-compat", &config.base_url, api_key, &config.model)?
            .with_http_client(client)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_tool_call_completion(config.tool_call_completion))
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Choose the completion signal the engine should rely on.
    pub fn with_tool_call_completion(mut self, completion: ToolCallCompletion) -> Self {
        self.completion = completion;
        self
    }

    /// Convert our Message types to OpenAI API format.
    ///
    /// A tool-role message that requests calls goes out as the assistant
    /// turn. A tool result answers with `tool` only when its call id was
    /// announced earlier in the request; otherwise it uses the `function`
    /// role keyed by name, since the API rejects unmatched tool ids.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        let mut announced: HashSet<&str> = HashSet::new();

        messages
            .iter()
            .map(|m| {
                announced.extend(m.tool_calls.iter().map(|tc| tc.id.as_str()));

                let answers_announced = m
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| announced.contains(id));
                let role = match m.role {
                    Role::Tool if m.has_tool_calls() => "assistant".to_string(),
                    Role::Tool if !answers_announced => "function".to_string(),
                    other => other.to_string(),
                };
                let tool_call_id = if role == "tool" {
                    m.tool_call_id.clone()
                } else {
                    None
                };

                ApiMessage {
                    role,
                    content: Some(m.content.clone()),
                    name: m.name.clone(),
                    tool_calls: if m.tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            m.tool_calls
                                .iter()
                                .map(|tc| ApiToolCall {
                                    id: tc.id.clone(),
                                    r#type: "function".into(),
                                    function: ApiFunction {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.clone(),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id,
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": self.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool_call_completion(&self) -> ToolCallCompletion {
        self.completion
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(
            client = %self.name,
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let client_name = self.name.clone();

        // Spawn task to read the SSE byte stream and forward chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for event in decoder.push(&bytes) {
                    match event {
                        SseEvent::Done => return,
                        SseEvent::Chunk(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseEvent::Unparseable { data, error } => {
                            trace!(
                                client = %client_name,
                                data = %data,
                                error = %error,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
            // Dropping `tx` here closes the stream.
        });

        Ok(rx)
    }
}

/// Output of the SSE line decoder.
#[derive(Debug)]
enum SseEvent {
    Chunk(StreamChunk),
    Done,
    Unparseable { data: String, error: String },
}

/// Splits an SSE byte stream into `data:` payloads and translates them.
#[derive(Debug, Default)]
struct SseDecoder {
    /// Raw bytes of the current partial line; decoded only once complete
    buffer: Vec<u8>,
    /// Tool-call id per choice-local index, for continuation deltas
    call_ids: HashMap<u32, String>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                events.push(SseEvent::Done);
                break;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => events.push(SseEvent::Chunk(self.translate(resp))),
                Err(e) => events.push(SseEvent::Unparseable {
                    data: data.to_string(),
                    error: e.to_string(),
                }),
            }
        }
        events
    }

    fn translate(&mut self, resp: StreamResponse) -> StreamChunk {
        let choices = resp
            .choices
            .into_iter()
            .map(|choice| {
                let tool_calls = choice
                    .delta
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|tc| {
                        let id = match tc.id.filter(|id| !id.is_empty()) {
                            Some(id) => {
                                self.call_ids.insert(tc.index, id.clone());
                                id
                            }
                            None => self.call_ids.get(&tc.index).cloned().unwrap_or_default(),
                        };
                        let (name, arguments) = tc
                            .function
                            .map(|f| (f.name.unwrap_or_default(), f.arguments.unwrap_or_default()))
                            .unwrap_or_default();
                        ToolCallDelta {
                            id,
                            name,
                            arguments,
                        }
                    })
                    .collect();

                ChunkChoice {
                    content: choice.delta.content.filter(|c| !c.is_empty()),
                    tool_calls,
                    finish_reason: choice.finish_reason,
                }
            })
            .collect();

        StreamChunk {
            choices,
            usage: resp.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; only the first one for an index carries the id.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
