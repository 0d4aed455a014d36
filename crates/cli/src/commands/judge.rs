//! `salin judge` — Run the reflection pipeline on one translation pair.

use salin_agent::ReflectionPipeline;
use salin_core::judgment::{JudgmentRecord, PipelineOutput, TranslationPair};

pub async fn run(
    source: String,
    candidate: String,
    reference: Option<String>,
    guidelines: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if source.trim().is_empty() || candidate.trim().is_empty() {
        return Err("--source and --candidate must not be empty".into());
    }

    let config = super::load_config()?;
    let router = salin_providers::build_from_config(&config);
    let provider = router.require_default()?;
    let pipeline = ReflectionPipeline::from_config(provider, &config);

    let pair = TranslationPair {
        source_en: source,
        candidate_fil: candidate,
        reference_fil: reference.filter(|s| !s.trim().is_empty()),
        domain_guidelines: guidelines.filter(|s| !s.trim().is_empty()),
    };

    if !json {
        eprint!("  Judging with {}...", config.judge_model());
    }
    let output = pipeline.evaluate(&pair).await;
    if !json {
        eprint!("\r{}\r", " ".repeat(40));
    }
    let output = output?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&output);
    }
    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    println!();
    print_record("Initial", &output.initial_evaluation);

    let reflection = &output.reflection_analysis;
    println!("  Reflection:   {:?}", reflection.recommendation);
    for concern in &reflection.reflection_findings.concerns_identified {
        println!("    - {concern}");
    }
    if !reflection.revision_needed_for.is_empty() {
        println!("    Revise:     {}", reflection.revision_needed_for.join(", "));
    }
    println!();

    print_record("Final", &output.final_evaluation);
    if let Some(notes) = &output.final_evaluation.revision_notes {
        println!("  Notes:        {notes}");
    }
    if let Some(fix) = &output.final_evaluation.suggested_fix {
        println!("  Suggested:    {fix}");
    }
    println!();
}

fn print_record(stage: &str, record: &JudgmentRecord) {
    println!(
        "  {stage:<12}  score {} ({}), {}/6 criteria",
        record.score, record.label, record.sum_of_criteria
    );
    for (criterion, verdict) in &record.criteria {
        let mark = if verdict.point == 1 { "✓" } else { "✗" };
        println!("    {mark} {:<26} {}", criterion.as_str(), verdict.reason);
    }
}
