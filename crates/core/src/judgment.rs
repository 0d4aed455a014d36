//! Translation judgments.
//!
//! A [`JudgmentRecord`] is the structured verdict the model returns for one
//! English → Filipino pair. Six fixed criteria each earn 0 or 1 point; the
//! sum maps to a 1/3/5 score and a label. The model is asked to honour that
//! arithmetic, and [`JudgmentRecord::validate`] checks that it did.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The six fixed judging criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Criterion {
    Accuracy,
    Fluency,
    Coherence,
    #[serde(rename = "Cultural Appropriateness")]
    CulturalAppropriateness,
    #[serde(rename = "Guideline Adherence")]
    GuidelineAdherence,
    Completeness,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::Accuracy,
        Criterion::Fluency,
        Criterion::Coherence,
        Criterion::CulturalAppropriateness,
        Criterion::GuidelineAdherence,
        Criterion::Completeness,
    ];

    /// The name used on the wire and in prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accuracy => "Accuracy",
            Self::Fluency => "Fluency",
            Self::Coherence => "Coherence",
            Self::CulturalAppropriateness => "Cultural Appropriateness",
            Self::GuidelineAdherence => "Guideline Adherence",
            Self::Completeness => "Completeness",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final label attached to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[serde(alias = "Poor")]
    Poor,
    #[serde(alias = "Good")]
    Good,
    #[serde(alias = "Excellent")]
    Excellent,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poor => "poor",
            Self::Good => "good",
            Self::Excellent => "excellent",
        })
    }
}

/// Map a criteria sum to the final score: 5–6 → 5, 3–4 → 3, 0–2 → 1.
pub fn expected_score(sum_of_criteria: u8) -> u8 {
    match sum_of_criteria {
        5..=u8::MAX => 5,
        3..=4 => 3,
        _ => 1,
    }
}

/// The label that goes with a mapped score.
pub fn label_for_score(score: u8) -> Option<Label> {
    match score {
        5 => Some(Label::Excellent),
        3 => Some(Label::Good),
        1 => Some(Label::Poor),
        _ => None,
    }
}

/// One criterion's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub point: u8,
    pub reason: String,
}

/// A span-level note tying a criterion to source and candidate text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub criterion: String,
    #[serde(default)]
    pub source_span: String,
    #[serde(default)]
    pub candidate_span: String,
    #[serde(default)]
    pub explanation: String,
}

/// Structured per-criterion assessment produced by one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentRecord {
    pub score: u8,
    pub sum_of_criteria: u8,
    pub label: Label,
    pub criteria: BTreeMap<Criterion, CriterionScore>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Set on the final evaluation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_notes: Option<String>,
}

/// A way a judgment breaks the scoring contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaViolation {
    MissingCriterion { criterion: Criterion },
    PointOutOfRange { criterion: Criterion, point: u8 },
    SumOutOfRange { sum_of_criteria: u8 },
    SumMismatch { declared: u8, computed: u8 },
    ScoreMismatch { sum_of_criteria: u8, score: u8, expected: u8 },
    LabelMismatch { score: u8, label: Label },
    ConfidenceOutOfRange { confidence: f64 },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCriterion { criterion } => write!(f, "criterion '{criterion}' is missing"),
            Self::PointOutOfRange { criterion, point } => {
                write!(f, "criterion '{criterion}' has point {point}, expected 0 or 1")
            }
            Self::SumOutOfRange { sum_of_criteria } => {
                write!(f, "sum_of_criteria {sum_of_criteria} is outside 0..=6")
            }
            Self::SumMismatch { declared, computed } => {
                write!(f, "sum_of_criteria is {declared} but the points add up to {computed}")
            }
            Self::ScoreMismatch {
                sum_of_criteria,
                score,
                expected,
            } => write!(
                f,
                "score {score} does not match sum_of_criteria {sum_of_criteria} (expected {expected})"
            ),
            Self::LabelMismatch { score, label } => {
                write!(f, "label '{label}' does not match score {score}")
            }
            Self::ConfidenceOutOfRange { confidence } => {
                write!(f, "confidence {confidence} is outside 0..=100")
            }
        }
    }
}

impl JudgmentRecord {
    /// Sum of the points actually awarded.
    pub fn computed_sum(&self) -> u8 {
        self.criteria
            .values()
            .fold(0u8, |acc, c| acc.saturating_add(c.point))
    }

    /// Check the record against the scoring contract.
    ///
    /// Returns every violation found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();

        for criterion in Criterion::ALL {
            match self.criteria.get(&criterion) {
                None => violations.push(SchemaViolation::MissingCriterion { criterion }),
                Some(c) if c.point > 1 => violations.push(SchemaViolation::PointOutOfRange {
                    criterion,
                    point: c.point,
                }),
                Some(_) => {}
            }
        }

        if self.sum_of_criteria > 6 {
            violations.push(SchemaViolation::SumOutOfRange {
                sum_of_criteria: self.sum_of_criteria,
            });
        }

        let computed = self.computed_sum();
        if computed != self.sum_of_criteria {
            violations.push(SchemaViolation::SumMismatch {
                declared: self.sum_of_criteria,
                computed,
            });
        }

        let expected = expected_score(self.sum_of_criteria);
        if self.score != expected {
            violations.push(SchemaViolation::ScoreMismatch {
                sum_of_criteria: self.sum_of_criteria,
                score: self.score,
                expected,
            });
        }

        if label_for_score(self.score) != Some(self.label) {
            violations.push(SchemaViolation::LabelMismatch {
                score: self.score,
                label: self.label,
            });
        }

        if let Some(confidence) = self.confidence {
            if !(0.0..=100.0).contains(&confidence) {
                violations.push(SchemaViolation::ConfidenceOutOfRange { confidence });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// The same record with `revision_notes` cleared, for comparisons.
    pub fn without_revision_notes(&self) -> Self {
        Self {
            revision_notes: None,
            ..self.clone()
        }
    }
}

/// JSON Schema for [`JudgmentRecord`], embedded in judge prompts.
pub fn judgment_schema() -> serde_json::Value {
    let criterion_schema = serde_json::json!({
        "type": "object",
        "required": ["point", "reason"],
        "properties": {
            "point": { "type": "integer", "enum": [0, 1] },
            "reason": { "type": "string" }
        }
    });
    let criteria: serde_json::Map<String, serde_json::Value> = Criterion::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), criterion_schema.clone()))
        .collect();
    let criteria_names: Vec<&str> = Criterion::ALL.iter().map(|c| c.as_str()).collect();

    serde_json::json!({
        "type": "object",
        "required": ["score", "sum_of_criteria", "label", "criteria"],
        "properties": {
            "score": {
                "type": "integer",
                "enum": [1, 3, 5],
                "description": "Mapped from sum_of_criteria: 5-6 -> 5, 3-4 -> 3, 0-2 -> 1"
            },
            "sum_of_criteria": { "type": "integer", "minimum": 0, "maximum": 6 },
            "label": { "type": "string", "enum": ["poor", "good", "excellent"] },
            "criteria": {
                "type": "object",
                "required": criteria_names,
                "properties": criteria
            },
            "highlights": {
                "type": "array",
                "description": "At least one item whenever any criterion scores 0",
                "items": {
                    "type": "object",
                    "required": ["criterion", "source_span", "candidate_span", "explanation"],
                    "properties": {
                        "criterion": { "type": "string" },
                        "source_span": { "type": "string" },
                        "candidate_span": { "type": "string" },
                        "explanation": { "type": "string" }
                    }
                }
            },
            "suggested_fix": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 100 }
        }
    })
}

/// What the reflection stage recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    #[serde(alias = "Maintain")]
    Maintain,
    #[serde(alias = "Revise")]
    Revise,
}

/// The model's audit of its own judgment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionFindings {
    #[serde(default)]
    pub concerns_identified: Vec<String>,
    #[serde(default)]
    pub confidence_issues: Vec<String>,
    #[serde(default)]
    pub potential_bias_detected: String,
    #[serde(default)]
    pub missed_considerations: Vec<String>,
}

/// Output of the reflection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionResult {
    #[serde(default)]
    pub reflection_findings: ReflectionFindings,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub revision_needed_for: Vec<String>,
}

/// The pair under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationPair {
    pub source_en: String,
    pub candidate_fil: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_fil: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_guidelines: Option<String>,
}

/// The full, auditable result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub initial_evaluation: JudgmentRecord,
    pub reflection_analysis: ReflectionResult,
    pub final_evaluation: JudgmentRecord,
    pub reflection_triggered: bool,
}

/// The stages of the reflection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Initial,
    Reflecting,
    Revising,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "initial",
            Self::Reflecting => "reflecting",
            Self::Revising => "revising",
        })
    }
}
