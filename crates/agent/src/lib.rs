//! The conversation loop and the translation judge.
//!
//! The agent follows a **call → dispatch → call** cycle:
//!
//! 1. **Append** the user's message to the conversation
//! 2. **Send** the full history to the model with the tool schemas
//! 3. **If tool calls**: run each tool, append the results, go back to 2
//! 4. **If text**: append it and return it to the caller
//!
//! The judge ([`ReflectionPipeline`]) is a separate evaluate → reflect →
//! revise state machine, exposed to the model as the `evaluate_translation`
//! tool.

pub mod judge_tool;
pub mod loop_runner;
pub mod patterns;
pub mod retry;
pub mod stream_event;

use std::sync::Arc;

use salin_core::tool::ToolRegistry;

pub use judge_tool::EvaluateTranslationTool;
pub use loop_runner::AgentLoop;
pub use patterns::{NO_REVISION_NOTE, ReflectionPipeline};
pub use retry::RetryPolicy;
pub use stream_event::AgentStreamEvent;

/// Add the `evaluate_translation` tool, backed by `pipeline`, to `registry`.
pub fn register_judge(registry: &mut ToolRegistry, pipeline: Arc<ReflectionPipeline>) {
    registry.register(Box::new(EvaluateTranslationTool::new(pipeline)));
}
