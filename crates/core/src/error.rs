//! Error types for the Salin domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

use crate::judgment::{PipelineStage, SchemaViolation};

/// The top-level error type for all Salin operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Judge pipeline errors ---
    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    // --- Conversation invariants ---
    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("Tool loop did not settle after {0} model calls")]
    IterationLimit(u32),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Tool call #{index} carried malformed arguments: {reason}")]
    InvalidToolArguments { index: usize, reason: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Bad credentials, unknown models and missing configuration will fail
    /// the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::AuthenticationFailed(_) | Self::ModelNotFound(_) | Self::NotConfigured(_) => {
                false
            }
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 408,
            _ => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures of the evaluate → reflect → revise pipeline.
#[derive(Debug, Clone, Error)]
pub enum JudgeError {
    #[error("{stage} stage: {source}")]
    Provider {
        stage: PipelineStage,
        #[source]
        source: ProviderError,
    },

    #[error("{stage} stage returned malformed output: {reason}")]
    MalformedOutput { stage: PipelineStage, reason: String },

    #[error("{stage} stage judgment violates the schema: {}", format_violations(.violations))]
    SchemaViolation {
        stage: PipelineStage,
        violations: Vec<SchemaViolation>,
    },

    #[error("gave up after {attempts} attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<JudgeError> },
}

impl JudgeError {
    /// Whether restarting the pipeline could produce a different outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { source, .. } => source.is_transient(),
            Self::MalformedOutput { .. } | Self::SchemaViolation { .. } => true,
            Self::RetriesExhausted { .. } => false,
        }
    }
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
