//! Style checker — surface-level consistency checks for a Filipino
//! translation against its English source.
//!
//! Everything here is a heuristic over plain text; no model is consulted.
//! Glossary entries are read from the guidelines as `term => translation`
//! lines.

use std::collections::HashSet;

use async_trait::async_trait;
use salin_core::error::ToolError;
use salin_core::tool::{Tool, parse_arguments};
use serde::{Deserialize, Serialize};

/// Markers of polite/formal address.
const FORMAL_MARKERS: &[&str] = &["po", "opo", "kayo", "ninyo", "inyo", "niyo"];

/// Markers of familiar address.
const INFORMAL_MARKERS: &[&str] = &["ka", "mo", "ikaw", "iyo"];

const MIN_LENGTH_RATIO: f64 = 0.5;
const MAX_LENGTH_RATIO: f64 = 3.0;

/// Share of candidate words copied from the source above which the
/// candidate is reported as likely untranslated.
const UNTRANSLATED_OVERLAP: f64 = 0.6;

pub struct StyleCheckTool;

#[derive(Debug, Deserialize)]
struct StyleArgs {
    source_en: String,
    candidate_fil: String,
    #[serde(default)]
    style_guidelines: Option<String>,
}

/// Address register detected in the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Formal,
    Informal,
    Mixed,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleCheck {
    EmptyCandidate,
    TerminalPunctuation,
    NumbersPreserved,
    MixedRegister,
    RequestedRegister,
    Glossary,
    LengthRatio,
    Untranslated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct StyleIssue {
    pub check: StyleCheck,
    pub severity: Severity,
    pub message: String,
}

/// Result of [`check_style`].
#[derive(Debug, Clone, Serialize)]
pub struct StyleReport {
    pub consistent: bool,
    pub register: Register,
    pub length_ratio: f64,
    pub issues: Vec<StyleIssue>,
}

impl StyleReport {
    pub fn has(&self, check: StyleCheck) -> bool {
        self.issues.iter().any(|i| i.check == check)
    }
}

#[async_trait]
impl Tool for StyleCheckTool {
    fn name(&self) -> &str {
        "check_style"
    }

    fn description(&self) -> &str {
        "Check a Filipino translation for style consistency with its English source: \
         punctuation, numbers, formal/informal register, glossary terms, length and \
         untranslated text."
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
                    "description": "The Filipino translation to check"
                },
                "style_guidelines": {
                    "type": "string",
                    "description": "Optional style notes. Lines of the form 'term => translation' are treated as glossary entries."
                }
            },
            "required": ["source_en", "candidate_fil"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: StyleArgs = parse_arguments(self.name(), arguments)?;
        let report = check_style(
            &args.source_en,
            &args.candidate_fil,
            args.style_guidelines.as_deref(),
        );
        tracing::debug!(
            issues = report.issues.len(),
            register = ?report.register,
            "Style check complete"
        );
        serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

/// Run every heuristic and collect the findings.
pub fn check_style(source_en: &str, candidate_fil: &str, guidelines: Option<&str>) -> StyleReport {
    let mut issues = Vec::new();
    let source = source_en.trim();
    let candidate = candidate_fil.trim();

    let candidate_words = words(candidate);
    let register = detect_register(&candidate_words);

    if candidate.is_empty() {
        issues.push(issue(
            StyleCheck::EmptyCandidate,
            Severity::Error,
            "candidate translation is empty".into(),
        ));
    } else {
        check_punctuation(source, candidate, &mut issues);
        check_numbers(source, candidate, &mut issues);
        check_untranslated(source, &candidate_words, &mut issues);
    }

    if register == Register::Mixed {
        issues.push(issue(
            StyleCheck::MixedRegister,
            Severity::Warning,
            "mixes formal (po/opo/kayo) and informal (ka/mo/ikaw) address".into(),
        ));
    }

    if let Some(guidelines) = guidelines {
        check_requested_register(guidelines, register, &mut issues);
        check_glossary(guidelines, source, candidate, &mut issues);
    }

    let length_ratio = if source.is_empty() {
        0.0
    } else {
        candidate.chars().count() as f64 / source.chars().count() as f64
    };
    if !source.is_empty()
        && !candidate.is_empty()
        && !(MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&length_ratio)
    {
        issues.push(issue(
            StyleCheck::LengthRatio,
            Severity::Info,
            format!("candidate is {length_ratio:.2}x the source length"),
        ));
    }

    StyleReport {
        consistent: issues.is_empty(),
        register,
        length_ratio: (length_ratio * 100.0).round() / 100.0,
        issues,
    }
}

fn issue(check: StyleCheck, severity: Severity, message: String) -> StyleIssue {
    StyleIssue {
        check,
        severity,
        message,
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn numbers(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|n| !n.is_empty())
        .collect()
}

fn detect_register(candidate_words: &[String]) -> Register {
    let has_any = |markers: &[&str]| {
        candidate_words
            .iter()
            .any(|w| markers.contains(&w.as_str()))
    };
    match (has_any(FORMAL_MARKERS), has_any(INFORMAL_MARKERS)) {
        (true, true) => Register::Mixed,
        (true, false) => Register::Formal,
        (false, true) => Register::Informal,
        (false, false) => Register::Neutral,
    }
}

fn check_punctuation(source: &str, candidate: &str, issues: &mut Vec<StyleIssue>) {
    let terminal = |s: &str| s.chars().last().filter(|c| ['.', '!', '?'].contains(c));
    let (src, cand) = (terminal(source), terminal(candidate));
    if src != cand {
        let show = |c: Option<char>| c.map(|c| c.to_string()).unwrap_or_else(|| "none".into());
        issues.push(issue(
            StyleCheck::TerminalPunctuation,
            Severity::Warning,
            format!(
                "source ends with '{}' but candidate ends with '{}'",
                show(src),
                show(cand)
            ),
        ));
    }
}

fn check_numbers(source: &str, candidate: &str, issues: &mut Vec<StyleIssue>) {
    let present: HashSet<&str> = numbers(candidate).into_iter().collect();
    let missing: Vec<&str> = numbers(source)
        .into_iter()
        .filter(|n| !present.contains(n))
        .collect();
    if !missing.is_empty() {
        issues.push(issue(
            StyleCheck::NumbersPreserved,
            Severity::Warning,
            format!("numbers missing from candidate: {}", missing.join(", ")),
        ));
    }
}

fn check_untranslated(source: &str, candidate_words: &[String], issues: &mut Vec<StyleIssue>) {
    let source_words: HashSet<String> = words(source).into_iter().collect();
    let content: Vec<&String> = candidate_words
        .iter()
        .filter(|w| w.chars().count() > 3 && !w.chars().all(|c| c.is_ascii_digit()))
        .collect();
    if content.is_empty() {
        return;
    }
    let copied = content.iter().filter(|w| source_words.contains(w.as_str())).count();
    let overlap = copied as f64 / content.len() as f64;
    if overlap >= UNTRANSLATED_OVERLAP {
        issues.push(issue(
            StyleCheck::Untranslated,
            Severity::Error,
            format!(
                "{copied} of {} content words are copied from the English source",
                content.len()
            ),
        ));
    }
}

fn check_requested_register(guidelines: &str, register: Register, issues: &mut Vec<StyleIssue>) {
    let guideline_words = words(guidelines);
    let wants = |terms: &[&str]| guideline_words.iter().any(|w| terms.contains(&w.as_str()));

    if wants(&["formal", "pormal", "polite", "magalang"]) && register == Register::Informal {
        issues.push(issue(
            StyleCheck::RequestedRegister,
            Severity::Warning,
            "guidelines ask for formal address but the candidate uses ka/mo/ikaw".into(),
        ));
    } else if wants(&["informal", "casual", "conversational"]) && register == Register::Formal {
        issues.push(issue(
            StyleCheck::RequestedRegister,
            Severity::Info,
            "guidelines ask for casual address but the candidate uses po/opo/kayo".into(),
        ));
    }
}

fn check_glossary(guidelines: &str, source: &str, candidate: &str, issues: &mut Vec<StyleIssue>) {
    let source_lower = source.to_lowercase();
    let candidate_lower = candidate.to_lowercase();

    for (term, translation) in glossary_entries(guidelines) {
        if source_lower.contains(&term.to_lowercase())
            && !candidate_lower.contains(&translation.to_lowercase())
        {
            issues.push(issue(
                StyleCheck::Glossary,
                Severity::Warning,
                format!("'{term}' should be rendered as '{translation}'"),
            ));
        }
    }
}

/// Parse `term => translation` lines, ignoring bullets and blank sides.
fn glossary_entries(guidelines: &str) -> impl Iterator<Item = (&str, &str)> {
    guidelines.lines().filter_map(|line| {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        let (term, translation) = line.split_once("=>")?;
        let (term, translation) = (term.trim(), translation.trim());
        (!term.is_empty() && !translation.is_empty()).then_some((term, translation))
    })
}
