//! # Salin Core
//!
//! Domain types, traits, and error definitions for the Salin translation
//! judge. This crate has **no transport dependencies**: it defines the
//! conversation model, the provider and tool seams, the streaming tool-call
//! accumulator and the judgment records every other crate works against.
//!
//! ## Layout
//!
//! - [`message`] — conversation turns and the append-only history
//! - [`provider`] — the completion-client seam (one-shot and streamed)
//! - [`accumulator`] — rebuilds tool calls from streamed fragments
//! - [`tool`] — local capabilities the model can invoke by name
//! - [`judgment`] — structured translation judgments and their laws
//! - [`error`] — the error taxonomy

pub mod accumulator;
pub mod error;
pub mod judgment;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use accumulator::{PendingToolCall, ToolCallAccumulator};
pub use error::{Error, JudgeError, ProviderError, Result, ToolError};
pub use judgment::{
    Criterion, CriterionScore, Highlight, JudgmentRecord, Label, PipelineOutput, PipelineStage,
    Recommendation, ReflectionFindings, ReflectionResult, SchemaViolation, TranslationPair,
    judgment_schema,
};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{
    DeltaReceiver, FinishReason, Provider, ProviderRequest, ProviderResponse, StreamDelta,
    ToolCallFragment, ToolChoice, ToolDefinition, Usage,
};
pub use tool::{Tool, ToolCall, ToolRegistry};
