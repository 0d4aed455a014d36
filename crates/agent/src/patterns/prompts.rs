//! Prompt builders for the three judge stages.
//!
//! User-supplied text is embedded as JSON string values so quotes and
//! newlines in the pair cannot break the prompt structure.

use salin_core::judgment::{Criterion, JudgmentRecord, ReflectionResult, TranslationPair, judgment_schema};

const JSON_ONLY: &str = "Respond with exactly one JSON object. Do not add explanations, \
chain-of-thought, markdown or code fences around it.";

/// Stage 1: score the pair against the six criteria.
pub fn initial_prompt(pair: &TranslationPair) -> String {
    let criteria = Criterion::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a translation quality judge for ENGLISH → FILIPINO translations. \
Evaluate one translation pair using exactly these six criteria: {criteria}. \
Each criterion earns 0 or 1 point. Add the points to get sum_of_criteria (0-6), \
then map it to the final score:\n\
 - sum 5-6 → score 5, label \"excellent\"\n\
 - sum 3-4 → score 3, label \"good\"\n\
 - sum 0-2 → score 1, label \"poor\"\n\
When any criterion earns 0, add at least one highlight pointing at the problem span. \
Add a short suggested_fix when the issues are severe, and a confidence from 0 to 100.\n\n\
{JSON_ONLY}\n\n\
INPUT:\n{input}\n\n\
JSON_SCHEMA:\n{schema}",
        input = pair_json(pair),
        schema = pretty(&judgment_schema()),
    )
}

/// Stage 2: audit the initial judgment.
pub fn reflection_prompt(pair: &TranslationPair, initial: &JudgmentRecord) -> String {
    format!(
        "You previously evaluated an English-to-Filipino translation. Critically \
examine your own judgment for errors or oversights.\n\n\
ORIGINAL EVALUATION:\n{initial}\n\n\
TRANSLATION PAIR:\n{input}\n\n\
REFLECTION CHECKLIST:\n\
1. Accuracy: subtle meaning differences missed? Valid alternative readings ignored? \
Was semantic preservation judged properly?\n\
2. Fluency: is the Filipino grammatical and natural? Were idiomatic expressions or \
acceptable regional variants overlooked?\n\
3. Coherence: does the translation flow logically? Were discourse markers and \
connectives checked?\n\
4. Cultural Appropriateness: is the formality level right (po/opo, kayo vs ka)? \
Any missed cultural nuance or social register?\n\
5. Guideline Adherence: were the domain guidelines applied consistently? Any \
specialised terms to reconsider?\n\
6. Completeness: is every source element represented? Any omissions or additions?\n\
BIAS CHECK: a preference for longer or shorter translations? Filipino standards \
applied consistently? More than one valid approach considered?\n\n\
Recommend \"revise\" only if the judgment should change; otherwise \"maintain\".\n\n\
{JSON_ONLY}\n\n\
OUTPUT SHAPE:\n\
{{\n\
  \"reflection_findings\": {{\n\
    \"concerns_identified\": [string],\n\
    \"confidence_issues\": [criterion names with lower confidence],\n\
    \"potential_bias_detected\": string,\n\
    \"missed_considerations\": [string]\n\
  }},\n\
  \"recommendation\": \"maintain\" | \"revise\",\n\
  \"revision_needed_for\": [criterion names to reconsider]\n\
}}",
        initial = pretty(initial),
        input = pair_json(pair),
    )
}

/// Stage 3: produce a corrected judgment from the reflection findings.
pub fn revision_prompt(
    pair: &TranslationPair,
    initial: &JudgmentRecord,
    reflection: &ReflectionResult,
) -> String {
    format!(
        "Based on your reflection, provide a REVISED evaluation of the translation \
pair, addressing the concerns you identified.\n\n\
ORIGINAL EVALUATION:\n{initial}\n\n\
REFLECTION FINDINGS:\n{reflection}\n\n\
TRANSLATION PAIR:\n{input}\n\n\
Use the same JSON schema as the original evaluation and add a \"revision_notes\" \
string explaining what changed and why. The score must match sum_of_criteria: \
5-6 → 5, 3-4 → 3, 0-2 → 1.\n\n\
{JSON_ONLY}\n\n\
JSON_SCHEMA:\n{schema}",
        initial = pretty(initial),
        reflection = pretty(reflection),
        input = pair_json(pair),
        schema = pretty(&revision_schema()),
    )
}

fn pair_json(pair: &TranslationPair) -> String {
    pretty(&serde_json::json!({
        "source_en": pair.source_en,
        "candidate_fil": pair.candidate_fil,
        "reference_fil": pair.reference_fil.as_deref().unwrap_or(""),
        "domain_guidelines": pair.domain_guidelines.as_deref().unwrap_or(""),
    }))
}

fn revision_schema() -> serde_json::Value {
    let mut schema = judgment_schema();
    schema["properties"]["revision_notes"] = serde_json::json!({ "type": "string" });
    if let Some(required) = schema["required"].as_array_mut() {
        required.push(serde_json::json!("revision_notes"));
    }
    schema
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
