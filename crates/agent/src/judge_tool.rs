//! `evaluate_translation` — the reflection pipeline exposed as a tool.

use std::sync::Arc;

use async_trait::async_trait;
use salin_core::error::ToolError;
use salin_core::judgment::TranslationPair;
use salin_core::tool::{Tool, parse_arguments};

use crate::patterns::ReflectionPipeline;

pub struct EvaluateTranslationTool {
    pipeline: Arc<ReflectionPipeline>,
}

impl EvaluateTranslationTool {
    pub fn new(pipeline: Arc<ReflectionPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Tool for EvaluateTranslationTool {
    fn name(&self) -> &str {
        "evaluate_translation"
    }

    fn description(&self) -> &str {
        "Evaluate an English to Filipino translation with a self-reflecting judge. \
         Scores six criteria (Accuracy, Fluency, Coherence, Cultural Appropriateness, \
         Guideline Adherence, Completeness), reflects on the judgment and revises it \
         if needed. Returns the initial, reflection and final evaluations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "source_en": {
                    "type": "string",
                    "description": "The English source text"
                },
                "candidate_fil": {
                    "type": "string",
                    "description": "The Filipino translation to evaluate"
                },
                "reference_fil": {
                    "type": "string",
                    "description": "Optional reference Filipino translation"
                },
                "domain_guidelines": {
                    "type": "string",
                    "description": "Optional domain or style guidelines"
                }
            },
            "required": ["source_en", "candidate_fil"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let mut pair: TranslationPair = parse_arguments(self.name(), arguments)?;
        if pair.source_en.trim().is_empty() || pair.candidate_fil.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "evaluate_translation: source_en and candidate_fil must not be empty".into(),
            ));
        }
        // Blank optionals mean "not given".
        pair.reference_fil = pair.reference_fil.filter(|s| !s.trim().is_empty());
        pair.domain_guidelines = pair.domain_guidelines.filter(|s| !s.trim().is_empty());

        let output = self
            .pipeline
            .evaluate(&pair)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        serde_json::to_value(&output).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::*;
    use crate::retry::RetryPolicy;

    fn tool(provider: Arc<SequentialMockProvider>) -> EvaluateTranslationTool {
        let pipeline = ReflectionPipeline::new(provider, "judge-model")
            .with_retry_policy(RetryPolicy::immediate(2));
        EvaluateTranslationTool::new(Arc::new(pipeline))
    }

    #[tokio::test]
    async fn returns_pipeline_output_json() {
        let provider = Arc::new(SequentialMockProvider::replies(&[
            &judgment_json([1, 1, 1, 1, 1, 0]).to_string(),
            &reflection_json("maintain").to_string(),
        ]));

        let result = tool(provider)
            .execute(serde_json::json!({
                "source_en": "Good evening.",
                "candidate_fil": "Magandang gabi po.",
                "reference_fil": ""
            }))
            .await
            .unwrap();

        assert_eq!(result["reflection_triggered"], false);
        assert_eq!(result["final_evaluation"]["score"], 5);
        assert_eq!(
            result["final_evaluation"]["revision_notes"],
            crate::patterns::NO_REVISION_NOTE
        );
        assert_eq!(result["initial_evaluation"]["label"], "excellent");
    }

    #[tokio::test]
    async fn blank_reference_is_not_sent() {
        let provider = Arc::new(SequentialMockProvider::replies(&[
            &judgment_json([1; 6]).to_string(),
            &reflection_json("maintain").to_string(),
        ]));
        tool(provider.clone())
            .execute(serde_json::json!({
                "source_en": "Hi",
                "candidate_fil": "Kumusta",
                "reference_fil": "   "
            }))
            .await
            .unwrap();

        let prompt = provider.requests()[0].messages[0].text().to_string();
        assert!(prompt.contains(r#""reference_fil": """#));
    }

    #[tokio::test]
    async fn missing_candidate_is_invalid() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let err = tool(provider.clone())
            .execute(serde_json::json!({"source_en": "Hello"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn pipeline_failure_is_execution_failure() {
        let provider = Arc::new(SequentialMockProvider::replies(&["x", "y"]));
        let err = tool(provider)
            .execute(serde_json::json!({"source_en": "Hello", "candidate_fil": "Kumusta"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { tool_name, reason } => {
                assert_eq!(tool_name, "evaluate_translation");
                assert!(reason.contains("2 attempts"));
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
    }
}
