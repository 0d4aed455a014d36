//! Provider trait — the abstraction over the hosted completion endpoint.
//!
//! A Provider sends a conversation to a model and returns either one
//! terminal response or a finite stream of deltas. Providers never retry;
//! retry policy belongs to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "moonshotai/kimi-k2-instruct")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// How the model may pick among `tools`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.6
}

impl ProviderRequest {
    /// A plain, tool-free request with default sampling.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            top_p: None,
            tools: Vec::new(),
            tool_choice: None,
            stream: false,
        }
    }
}

/// A tool advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Tool selection mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    /// Force a specific tool by name
    Function(String),
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// Parse the wire string used by OpenAI-compatible endpoints.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stop" => Self::Stop,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message (text and/or tool calls)
    pub message: Message,

    /// Why generation stopped
    pub finish_reason: FinishReason,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

impl ProviderResponse {
    /// Whether the model is asking for tools to be run.
    pub fn wants_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls || !self.message.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One incremental fragment of a streamed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Partial text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool calls, each tagged with its slot index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,

    /// Present on the terminal delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Usage info (typically only near the end)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Responding model, when the chunk names it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A partial tool call as delivered over a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Which logical tool call this fragment belongs to
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A piece of the JSON argument text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Receiving end of a streamed response.
pub type DeltaReceiver = tokio::sync::mpsc::Receiver<std::result::Result<StreamDelta, ProviderError>>;

/// The core Provider trait.
///
/// The agent loop and the reflection pipeline call `complete()` or
/// `stream()` without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "groq").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of deltas.
    ///
    /// Default implementation calls `complete()` and replays the result as a
    /// single terminal delta.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<DeltaReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx.send(Ok(terminal_delta(response))).await;
        Ok(rx)
    }
}

fn terminal_delta(response: ProviderResponse) -> StreamDelta {
    let tool_calls = response
        .message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(index, MessageToolCall { id, name, arguments })| ToolCallFragment {
            index,
            id: Some(id),
            name: Some(name),
            arguments: Some(arguments),
        })
        .collect();

    StreamDelta {
        content: response.message.content,
        tool_calls,
        finish_reason: Some(response.finish_reason),
        usage: response.usage,
        model: Some(response.model),
    }
}
