//! Agent-level streaming events.
//!
//! `AgentStreamEvent` lifts provider deltas and tool dispatch into the
//! events a front end renders while a turn is in progress.

use salin_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by the agent during a turn.
///
/// - `chunk`       — partial text from the model
/// - `tool_call`   — the agent is invoking a tool
/// - `tool_result` — tool execution completed
/// - `done`        — the turn is complete
/// - `error`       — the turn failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the model.
    Chunk { content: String },

    /// The agent is calling a tool.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        id: String,
        name: String,
        output: String,
    },

    /// The turn is complete.
    Done {
        conversation_id: String,
        usage: Option<Usage>,
        iterations: u32,
        tool_calls_made: usize,
    },

    /// The turn failed.
    Error { message: String },
}

impl AgentStreamEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
