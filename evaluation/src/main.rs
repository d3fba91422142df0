//! Perplexity evaluation runner.
//!
//! Scores every configured method, derives the acceptance threshold from the
//! two baselines, prints the retention report, saves JSON results and renders
//! the log-perplexity histogram. Exits with code 1 on any fatal error.
//!
//! Usage:
//!   cargo run --bin pplgate -- --config evaluation/config/perplexity.yaml
//!   cargo run --bin pplgate -- --config perplexity.yaml --no-plot --threshold-multiplier 2.0

use anyhow::Context;
use clap::Parser;
use pplgate_core::{EvalConfig, EvaluationRun, LoggingConfig};
use pplgate_evaluation::config::load_config;
use pplgate_evaluation::datasets::JsonDatasetExtractor;
use pplgate_evaluation::report;
use pplgate_evaluation::runners::EvaluationRunner;
use pplgate_evaluation::scorer::{CachedScorer, HttpPerplexityScorer};
use pplgate_evaluation::threshold::policy_from_config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pplgate", about = "Perplexity-based naturalness evaluation")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "evaluation/config/perplexity.yaml")]
    config: PathBuf,

    /// Directory for the JSON results and histogram.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip rendering the histogram.
    #[arg(long)]
    no_plot: bool,

    /// Override the threshold multiplier.
    #[arg(long)]
    threshold_multiplier: Option<f64>,

    /// Override the scoring service endpoint.
    #[arg(long)]
    scorer_url: Option<String>,

    /// Log output format: text or json.
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.config).and_then(|c| apply_overrides(c, &cli)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(e) = run(&config).await {
        tracing::error!(error = %e, "evaluation failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn apply_overrides(mut config: EvalConfig, cli: &Cli) -> anyhow::Result<EvalConfig> {
    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.clone();
    }
    if cli.no_plot {
        config.plotting_enabled = false;
    }
    if let Some(multiplier) = cli.threshold_multiplier {
        config.threshold_multiplier = multiplier;
    }
    if let Some(url) = &cli.scorer_url {
        config.scorer.endpoint = url.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: &EvalConfig) -> anyhow::Result<()> {
    let http = HttpPerplexityScorer::new(&config.scorer)?;
    let policy = policy_from_config(&config.threshold_policy, config.threshold_multiplier)?;
    let extractor = JsonDatasetExtractor;

    tracing::info!(endpoint = http.endpoint(), "using scoring service");

    let run = match &config.scorer.cache_path {
        Some(cache_path) => {
            let cached = CachedScorer::load(http, cache_path)
                .with_context(|| format!("Failed to load score cache {}", cache_path.display()))?;
            let outcome = EvaluationRunner::new(config, &extractor, &cached, policy.as_ref())
                .run()
                .await;
            if let Err(e) = cached.save(cache_path) {
                tracing::warn!(error = %e, path = %cache_path.display(), "could not save score cache");
            }
            outcome?
        }
        None => {
            EvaluationRunner::new(config, &extractor, &http, policy.as_ref())
                .run()
                .await?
        }
    };

    write_outputs(config, &run)
}

fn write_outputs(config: &EvalConfig, run: &EvaluationRun) -> anyhow::Result<()> {
    report::print_report(run);

    let written = report::write_outputs(
        run,
        &config.model_id,
        &config.output,
        config.plotting_enabled,
    )?;
    println!("\nResults saved to {}", written.results.display());
    if let Some(plot) = &written.histogram {
        println!("Histogram saved to {}", plot.display());
    }

    Ok(())
}
