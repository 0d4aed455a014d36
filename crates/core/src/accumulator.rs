//! Reassembles streamed tool calls.
//!
//! OpenAI-compatible endpoints split each tool call into fragments tagged
//! with a slot `index`: the first fragment usually carries the id and the
//! function name, later ones carry pieces of the JSON argument text. The
//! accumulator keeps one slot per index and merges fragments in arrival
//! order. Argument text is only parsed once the terminal delta (the one
//! carrying a finish reason) has been seen.

use tracing::{trace, warn};

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};
use crate::provider::{FinishReason, ProviderResponse, StreamDelta, ToolCallFragment, Usage};

/// Highest slot count accepted from the wire; larger indexes are rejected.
pub const MAX_TOOL_CALL_SLOTS: usize = 128;

/// A tool call still being assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingToolCall {
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

/// Merges deltas into a complete [`ProviderResponse`].
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    slots: Vec<PendingToolCall>,
    content: String,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    model: Option<String>,
    /// First fragment index that was out of range, if any.
    rejected_index: Option<usize>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one tool-call fragment into its slot.
    ///
    /// Slots up to and including `fragment.index` are created on demand, so
    /// the slot list is never sparse.
    pub fn push_fragment(&mut self, fragment: &ToolCallFragment) {
        if fragment.index >= MAX_TOOL_CALL_SLOTS {
            warn!(index = fragment.index, "Dropping tool-call fragment with out-of-range index");
            self.rejected_index.get_or_insert(fragment.index);
            return;
        }
        if self.slots.len() <= fragment.index {
            self.slots
                .resize_with(fragment.index + 1, PendingToolCall::default);
        }
        let slot = &mut self.slots[fragment.index];

        if slot.id.is_none() {
            slot.id = fragment.id.clone();
        }
        if slot.name.is_none() {
            slot.name = fragment.name.clone();
        }
        if let Some(piece) = &fragment.arguments {
            slot.arguments.push_str(piece);
        }
    }

    /// Merge a whole delta: narration text, tool-call fragments and any
    /// terminal metadata.
    pub fn push_delta(&mut self, delta: &StreamDelta) {
        if let Some(text) = &delta.content {
            self.content.push_str(text);
        }
        for fragment in &delta.tool_calls {
            self.push_fragment(fragment);
        }
        if let Some(reason) = &delta.finish_reason {
            trace!(?reason, slots = self.slots.len(), "Stream reached finish reason");
            self.finish_reason = Some(reason.clone());
        }
        if delta.usage.is_some() {
            self.usage = delta.usage.clone();
        }
        if self.model.is_none() {
            self.model = delta.model.clone();
        }
    }

    /// The slots assembled so far, in index order.
    pub fn slots(&self) -> &[PendingToolCall] {
        &self.slots
    }

    /// Validate every slot's argument text and build the response.
    ///
    /// Fails if the stream never delivered a finish reason, if a fragment
    /// carried an index of [`MAX_TOOL_CALL_SLOTS`] or more, or if any slot's
    /// argument text is not valid JSON. Empty argument text reads as `{}`.
    pub fn finish(self, fallback_model: &str) -> Result<ProviderResponse, ProviderError> {
        if let Some(index) = self.rejected_index {
            return Err(ProviderError::InvalidToolArguments {
                index,
                reason: format!("slot index exceeds the limit of {MAX_TOOL_CALL_SLOTS}"),
            });
        }

        let Some(finish_reason) = self.finish_reason else {
            return Err(ProviderError::StreamInterrupted(
                "stream closed before a finish reason was delivered".into(),
            ));
        };

        let mut tool_calls = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            let arguments = if slot.arguments.trim().is_empty() {
                "{}".to_string()
            } else {
                serde_json::from_str::<serde_json::Value>(&slot.arguments).map_err(|e| {
                    ProviderError::InvalidToolArguments {
                        index,
                        reason: e.to_string(),
                    }
                })?;
                slot.arguments
            };
            tool_calls.push(MessageToolCall {
                id: slot.id.unwrap_or_default(),
                name: slot.name.unwrap_or_default(),
                arguments,
            });
        }

        let content = (!self.content.is_empty()).then_some(self.content);
        Ok(ProviderResponse {
            message: Message::assistant_with_tool_calls(content, tool_calls),
            finish_reason,
            usage: self.usage,
            model: self.model.unwrap_or_else(|| fallback_model.to_string()),
        })
    }
}
