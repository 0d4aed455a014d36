//! Shared test helpers for agent and pipeline tests.

use salin_core::error::ProviderError;
use salin_core::judgment::{Criterion, expected_score, label_for_score};
use salin_core::message::{Message, MessageToolCall};
use salin_core::provider::{FinishReason, Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` returns the next result in the queue and records
/// the request it was given. Panics if more calls are made than results
/// provided.
pub struct SequentialMockProvider {
    results: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose replies are plain text bodies, in order.
    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!(
                "SequentialMockProvider: no more responses (call #{})",
                requests.len()
            )
        })
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        finish_reason: FinishReason::Stop,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional narration.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(Some(thought.to_string()), tool_calls),
        finish_reason: FinishReason::ToolCalls,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// A judgment body that honours the scoring contract for the given points.
pub fn judgment_json(points: [u8; 6]) -> serde_json::Value {
    let criteria: serde_json::Map<String, serde_json::Value> = Criterion::ALL
        .iter()
        .zip(points)
        .map(|(c, point)| {
            (
                c.as_str().to_string(),
                serde_json::json!({ "point": point, "reason": format!("{c} check") }),
            )
        })
        .collect();
    let sum: u8 = points.iter().sum();
    let score = expected_score(sum);
    serde_json::json!({
        "score": score,
        "sum_of_criteria": sum,
        "label": label_for_score(score).unwrap().to_string(),
        "criteria": criteria,
        "highlights": [],
        "confidence": 80
    })
}

/// A reflection body with the given recommendation.
pub fn reflection_json(recommendation: &str) -> serde_json::Value {
    let revision_needed_for: Vec<&str> = if recommendation == "revise" {
        vec!["Cultural Appropriateness"]
    } else {
        vec![]
    };
    serde_json::json!({
        "reflection_findings": {
            "concerns_identified": ["register may be too casual"],
            "confidence_issues": ["Cultural Appropriateness"],
            "potential_bias_detected": "none",
            "missed_considerations": []
        },
        "recommendation": recommendation,
        "revision_needed_for": revision_needed_for
    })
}
