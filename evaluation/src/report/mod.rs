//! Human-readable and machine-readable output for a finished run.
//!
//! - [`summary_lines`]: one retention line per method, in configuration order
//! - [`print_report`]: means, threshold, Markdown table and summary lines on stdout
//! - [`save_run`]: pretty JSON envelope with a generation timestamp
//! - [`histogram`]: log-perplexity density plot (PNG)
//! - [`write_outputs`]: results JSON plus the optional histogram

pub mod histogram;

use crate::aggregator::PerplexityStats;
use chrono::{DateTime, Utc};
use pplgate_core::{EvaluationRun, MethodOutcome, OutputConfig, PplGateError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Envelope written by [`save_run`].
#[derive(Debug, Serialize)]
struct RunEnvelope<'a> {
    generated_at: String,
    model_id: &'a str,
    run: &'a EvaluationRun,
}

/// One line per method in configuration order, skipped methods included.
///
/// ```text
/// Proflingo: skipped: Scoring failed for Proflingo: ...
/// IF-SimpleTemplate: Retained 3/4 (75.00%)
/// ```
pub fn summary_lines(run: &EvaluationRun) -> Vec<String> {
    run.outcomes()
        .map(|outcome| match outcome {
            MethodOutcome::Retained(s) => format!(
                "{}: Retained {}/{} ({:.2}%)",
                s.method,
                s.retained_count,
                s.total_count,
                s.retained_ratio * 100.0
            ),
            MethodOutcome::Skipped(s) => format!("{}: skipped: {}", s.method, s.reason),
        })
        .collect()
}

/// Markdown table header.
pub fn table_header() -> String {
    "| Method | N | Mean | Median | Min | Max | Retained | Ratio |".to_string()
}

/// Markdown table separator.
pub fn table_separator() -> String {
    "|--------|---|------|--------|-----|-----|----------|-------|".to_string()
}

/// Format the run as a Markdown table, one row per recorded method.
pub fn format_markdown_table(run: &EvaluationRun) -> String {
    let mut lines = Vec::with_capacity(run.results().len() + 2);
    lines.push(table_header());
    lines.push(table_separator());
    for (result, summary) in run.results().iter().zip(run.retention()) {
        let stats = PerplexityStats::from_result(result);
        lines.push(format!(
            "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {} | {:.2}% |",
            result.method(),
            stats.count,
            stats.mean,
            stats.median,
            stats.min,
            stats.max,
            summary.retained_count,
            summary.retained_ratio * 100.0
        ));
    }
    lines.join("\n")
}

/// Print the full report to stdout.
pub fn print_report(run: &EvaluationRun) {
    println!("\n{}", "=".repeat(60));
    println!("  Perplexity Evaluation Report");
    println!("{}", "=".repeat(60));

    println!();
    for result in run.results() {
        println!("Mean Perplexity for {}: {:.2}", result.method(), result.mean());
    }

    let (a, b) = run.threshold().baselines();
    println!("\nThreshold for filtering: {:.2}", run.threshold().value());
    println!(
        "  policy: {} (baselines {} / {})",
        run.threshold().policy(),
        a,
        b
    );

    println!("\n--- Markdown Table ---");
    println!("{}", format_markdown_table(run));

    println!("\n--- Retention ---");
    for line in summary_lines(run) {
        println!("{line}");
    }
}

/// Save the run as pretty JSON, creating parent directories as needed.
pub fn save_run(run: &EvaluationRun, model_id: &str, path: &Path) -> Result<()> {
    save_run_at(run, model_id, path, Utc::now())
}

fn save_run_at(
    run: &EvaluationRun,
    model_id: &str,
    path: &Path,
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let envelope = RunEnvelope {
        generated_at: generated_at.to_rfc3339(),
        model_id,
        run,
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .map_err(|e| PplGateError::Report(format!("Failed to write {}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "results saved");
    Ok(())
}

/// Files produced by [`write_outputs`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenOutputs {
    /// JSON results file.
    pub results: PathBuf,
    /// Histogram image, `None` when plotting is disabled or rendering failed.
    pub histogram: Option<PathBuf>,
}

/// Save the JSON results, then render the histogram when `plot` is set.
///
/// A rendering failure is logged at `warn` and does not fail the call.
///
/// # Errors
///
/// Returns an error only if the JSON results cannot be written.
pub fn write_outputs(
    run: &EvaluationRun,
    model_id: &str,
    output: &OutputConfig,
    plot: bool,
) -> Result<WrittenOutputs> {
    let results = output.output_dir.join(&output.results_file);
    save_run(run, model_id, &results)?;

    let histogram = if plot {
        let path = output.output_dir.join(&output.histogram_file);
        match histogram::render_histogram(run, &path, &histogram::HistogramOptions::default()) {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "histogram rendering failed");
                None
            }
        }
    } else {
        None
    };

    Ok(WrittenOutputs { results, histogram })
}
