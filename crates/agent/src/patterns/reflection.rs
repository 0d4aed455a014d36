//! Reflection pattern — evaluate → reflect → revise.
//!
//! One run makes two or three plain completions at a low temperature:
//!
//! 1. **Initial**: score the pair against the six criteria.
//! 2. **Reflecting**: the model audits its own judgment and recommends
//!    `maintain` or `revise`.
//! 3. **Revising** (only on `revise`): a corrected judgment with
//!    `revision_notes`.
//!
//! Any failure in any stage throws the run away and starts again from the
//! initial stage, under the pipeline's [`RetryPolicy`].

use std::sync::Arc;

use salin_config::AppConfig;
use salin_core::error::JudgeError;
use salin_core::judgment::{
    JudgmentRecord, PipelineOutput, PipelineStage, Recommendation, ReflectionResult,
    TranslationPair,
};
use salin_core::message::Message;
use salin_core::provider::{Provider, ProviderRequest};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::prompts;
use crate::retry::RetryPolicy;

/// `revision_notes` on a final evaluation that reflection left unchanged.
pub const NO_REVISION_NOTE: &str = "No revision needed after reflection";

/// Runs the three-stage translation judge.
pub struct ReflectionPipeline {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    validate_schema: bool,
    retry: RetryPolicy,
}

impl ReflectionPipeline {
    /// Create a pipeline with the default judge settings.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 2048,
            validate_schema: true,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a pipeline from the `[judge]` section of the config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.judge_model())
            .with_temperature(config.judge.temperature)
            .with_max_tokens(config.judge.max_tokens)
            .with_schema_validation(config.judge.validate_schema)
            .with_retry_policy(RetryPolicy::from_config(&config.judge))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Check every parsed judgment against the scoring contract.
    pub fn with_schema_validation(mut self, enabled: bool) -> Self {
        self.validate_schema = enabled;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Judge a translation pair, retrying whole runs on failure.
    pub async fn evaluate(&self, pair: &TranslationPair) -> Result<PipelineOutput, JudgeError> {
        info!(
            model = %self.model,
            source_chars = pair.source_en.chars().count(),
            candidate_chars = pair.candidate_fil.chars().count(),
            "Evaluating translation"
        );

        let output = self
            .retry
            .run(move |attempt| {
                debug!(attempt, "Starting pipeline run");
                self.run_once(pair)
            })
            .await?;

        info!(
            score = output.final_evaluation.score,
            label = %output.final_evaluation.label,
            reflection_triggered = output.reflection_triggered,
            "Translation evaluated"
        );
        Ok(output)
    }

    /// One pass through the stages, failing on the first bad stage.
    async fn run_once(&self, pair: &TranslationPair) -> Result<PipelineOutput, JudgeError> {
        let stage = PipelineStage::Initial;
        let reply = self.ask(stage, prompts::initial_prompt(pair)).await?;
        let initial = self.parse_judgment(stage, &reply)?;

        let stage = PipelineStage::Reflecting;
        let reply = self
            .ask(stage, prompts::reflection_prompt(pair, &initial))
            .await?;
        let reflection: ReflectionResult = parse_stage(stage, &reply)?;
        debug!(
            recommendation = ?reflection.recommendation,
            concerns = reflection.reflection_findings.concerns_identified.len(),
            "Reflection complete"
        );

        let final_evaluation = match reflection.recommendation {
            Recommendation::Maintain => JudgmentRecord {
                revision_notes: Some(NO_REVISION_NOTE.to_string()),
                ..initial.clone()
            },
            Recommendation::Revise => {
                let stage = PipelineStage::Revising;
                let reply = self
                    .ask(stage, prompts::revision_prompt(pair, &initial, &reflection))
                    .await?;
                self.parse_judgment(stage, &reply)?
            }
        };

        Ok(PipelineOutput {
            reflection_triggered: reflection.recommendation == Recommendation::Revise,
            initial_evaluation: initial,
            reflection_analysis: reflection,
            final_evaluation,
        })
    }

    /// Send one stage prompt and return the reply text.
    async fn ask(&self, stage: PipelineStage, prompt: String) -> Result<String, JudgeError> {
        let mut request = ProviderRequest::new(&self.model, vec![Message::user(prompt)]);
        request.temperature = self.temperature;
        request.max_tokens = Some(self.max_tokens);

        debug!(%stage, model = %self.model, "Sending judge request");
        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|source| JudgeError::Provider { stage, source })?;

        let text = response.message.text().trim();
        if text.is_empty() {
            return Err(JudgeError::MalformedOutput {
                stage,
                reason: "empty reply".into(),
            });
        }
        Ok(text.to_string())
    }

    fn parse_judgment(
        &self,
        stage: PipelineStage,
        reply: &str,
    ) -> Result<JudgmentRecord, JudgeError> {
        let record: JudgmentRecord = parse_stage(stage, reply)?;
        if self.validate_schema {
            record
                .validate()
                .map_err(|violations| JudgeError::SchemaViolation { stage, violations })?;
        }
        Ok(record)
    }
}

/// Parse a stage reply as JSON, tolerating a surrounding code fence.
fn parse_stage<T: DeserializeOwned>(stage: PipelineStage, reply: &str) -> Result<T, JudgeError> {
    serde_json::from_str(strip_code_fence(reply)).map_err(|e| JudgeError::MalformedOutput {
        stage,
        reason: e.to_string(),
    })
}

/// Strip a surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
