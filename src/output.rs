use crate::category::Category;
use crate::models::Criterion;
use crate::report::Report;
use crate::runner::RunSummary;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print the aggregate report in the specified format
pub fn print_report(report: &Report, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_report_plain(report)),
        OutputFormat::Json => print_json(report),
    }
}

/// Print the outcome of a generate or evaluate run
pub fn print_summary(title: &str, summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_summary_plain(title, summary)),
        OutputFormat::Json => print_json(summary),
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

fn fmt_score(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.3}", v),
        None => "n/a".to_string(),
    }
}

fn render_report_plain(report: &Report) -> String {
    let mut out = String::new();

    out.push_str("=== Evaluation Report ===\n\n");
    out.push_str(&format!("Questions: {}\n", report.total_questions));
    out.push_str(&format!("Model evaluations: {}\n\n", report.total_evaluations));

    out.push_str("📊 MODEL PERFORMANCE\n");
    out.push_str("--------------------\n");
    if report.models.is_empty() {
        out.push_str("No statistics available.\n");
    }
    for (model, summary) in &report.models {
        out.push_str(&format!(
            "{} ({} evaluations, overall {})\n",
            model,
            summary.evaluations,
            fmt_score(summary.overall_mean)
        ));
        out.push_str(&format!(
            "  {:<18} {:<8} {:<8} {:<6} {:<6} {:<8}\n",
            "Criterion", "Mean", "Median", "Mode", "N", "Missing"
        ));
        for criterion in Criterion::ALL {
            let Some(stats) = summary.criteria.get(&criterion) else {
                continue;
            };
            let mode = stats
                .mode
                .map(|m| m.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            out.push_str(&format!(
                "  {:<18} {:<8} {:<8} {:<6} {:<6} {:<8}\n",
                criterion.key(),
                fmt_score(stats.mean),
                fmt_score(stats.median),
                mode,
                stats.count,
                stats.missing
            ));
        }
        out.push('\n');
    }

    if !report.ranking.is_empty() {
        out.push_str("🥇 OVERALL RANKING\n");
        out.push_str("------------------\n");
        for (position, (model, mean)) in report.ranking.iter().enumerate() {
            out.push_str(&format!("  {}. {}: {:.3}\n", position + 1, model, mean));
        }
        out.push('\n');
    }

    out.push_str("🏥 CATEGORIES\n");
    out.push_str("-------------\n");
    for (category, summary) in &report.categories {
        out.push_str(&format!(
            "  {:<30} {} ({} questions)\n",
            Category::label(*category),
            fmt_score(summary.mean),
            summary.questions
        ));
    }
    out.push('\n');

    out.push_str(&format!(
        "⚠️  LOW ACCURACY (<= {}): {}\n",
        report.low_accuracy_threshold,
        report.low_accuracy.len()
    ));
    for case in &report.low_accuracy {
        out.push_str(&format!(
            "  Q{} ({}): {}/5\n",
            case.question_id, case.model, case.factual_accuracy
        ));
    }

    if !report.out_of_range.is_empty() {
        out.push_str(&format!(
            "\n🚩 OUT-OF-RANGE SCORES: {}\n",
            report.out_of_range.len()
        ));
        for flagged in &report.out_of_range {
            out.push_str(&format!(
                "  Q{} ({}) {}: {}\n",
                flagged.question_id, flagged.model, flagged.criterion, flagged.value
            ));
        }
    }

    out
}

fn render_summary_plain(title: &str, summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} ===\n", title));
    out.push_str(&format!("Completed: {}\n", summary.completed));
    out.push_str(&format!("Reused:    {}\n", summary.reused));
    out.push_str(&format!("Skipped:   {}\n", summary.skipped.len()));
    out.push_str(&format!("Failed:    {}\n", summary.failed.len()));

    if !summary.skipped.is_empty() {
        out.push_str("\nSkipped pairs:\n");
        for issue in &summary.skipped {
            out.push_str(&format!("  Q{} / {}: {}\n", issue.question_id, issue.model, issue.detail));
        }
    }

    if !summary.failed.is_empty() {
        out.push_str("\nFailed pairs (will be retried on the next run):\n");
        for issue in &summary.failed {
            out.push_str(&format!("  Q{} / {}: {}\n", issue.question_id, issue.model, issue.detail));
        }
    }

    out
}
