//! Core types, traits, and errors for pplgate
//!
//! This crate holds the data model shared by every pplgate component: the
//! per-method perplexity results, the acceptance threshold, retention
//! summaries, the evaluation run that owns them, the collaborator traits
//! (scorer, extractor, threshold policy) and the configuration structures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Samples and scores
// ---------------------------------------------------------------------------

/// A single text sample drawn from a method's dataset.
///
/// Identity is `(method, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Method (sample source) this text belongs to.
    pub method: String,
    /// Position of the sample within the method's sample set.
    pub index: usize,
    /// The text handed to the scorer.
    pub text: String,
}

impl Sample {
    /// Create a new sample.
    pub fn new(method: impl Into<String>, index: usize, text: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            index,
            text: text.into(),
        }
    }
}

/// Output of one scorer call: one perplexity per input text plus their mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBatch {
    /// Per-text perplexities, in input order.
    pub perplexities: Vec<f64>,
    /// Arithmetic mean of `perplexities` as reported by the scorer.
    pub mean_perplexity: f64,
}

impl ScoreBatch {
    /// Build a batch whose mean is computed from the per-text values.
    pub fn from_perplexities(perplexities: Vec<f64>) -> Self {
        let mean_perplexity = if perplexities.is_empty() {
            0.0
        } else {
            perplexities.iter().sum::<f64>() / perplexities.len() as f64
        };
        Self {
            perplexities,
            mean_perplexity,
        }
    }
}

// ---------------------------------------------------------------------------
// Method results
// ---------------------------------------------------------------------------

/// Per-sample perplexities for one method plus the mean reported by the scorer.
///
/// Immutable once built: later stages derive new values from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodResult {
    method: String,
    values: Vec<f64>,
    mean: f64,
}

impl MethodResult {
    /// Validate and build a result.
    ///
    /// # Errors
    ///
    /// - [`PplGateError::EmptySampleSet`] when `values` is empty.
    /// - [`PplGateError::InvalidScore`] when any value or the mean is NaN or infinite.
    pub fn new(method: impl Into<String>, values: Vec<f64>, mean: f64) -> Result<Self> {
        let method = method.into();
        if values.is_empty() {
            return Err(PplGateError::EmptySampleSet { method });
        }
        if let Some((index, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(PplGateError::InvalidScore {
                method,
                detail: format!("sample {index} has perplexity {value}"),
            });
        }
        if !mean.is_finite() {
            return Err(PplGateError::InvalidScore {
                method,
                detail: format!("mean perplexity is {mean}"),
            });
        }
        Ok(Self {
            method,
            values,
            mean,
        })
    }

    /// Method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Per-sample perplexities in scorer order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mean perplexity as reported by the scorer.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Number of scored samples.
    pub fn total_count(&self) -> usize {
        self.values.len()
    }
}

// ---------------------------------------------------------------------------
// Threshold and retention
// ---------------------------------------------------------------------------

/// Acceptance threshold derived from the two baseline methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threshold {
    value: f64,
    policy: String,
    baseline_a: String,
    baseline_b: String,
}

impl Threshold {
    /// Create a threshold produced by `policy` from the named baselines.
    pub fn new(
        value: f64,
        policy: impl Into<String>,
        baseline_a: impl Into<String>,
        baseline_b: impl Into<String>,
    ) -> Self {
        Self {
            value,
            policy: policy.into(),
            baseline_a: baseline_a.into(),
            baseline_b: baseline_b.into(),
        }
    }

    /// Threshold value in perplexity units.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Name of the policy that produced this threshold.
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// Baseline method names, in the order they were passed to the policy.
    pub fn baselines(&self) -> (&str, &str) {
        (&self.baseline_a, &self.baseline_b)
    }
}

/// How many of a method's samples fall at or below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionSummary {
    /// Method name.
    pub method: String,
    /// Samples with perplexity `<=` threshold.
    pub retained_count: usize,
    /// Total number of samples.
    pub total_count: usize,
    /// `retained_count / total_count`, always within `[0.0, 1.0]`.
    pub retained_ratio: f64,
}

impl RetentionSummary {
    /// Number of rejected samples.
    pub fn rejected_count(&self) -> usize {
        self.total_count - self.retained_count
    }
}

/// A non-baseline method that was left out of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMethod {
    /// Method name.
    pub method: String,
    /// Human-readable reason.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Evaluation run
// ---------------------------------------------------------------------------

/// Incrementally collects method results while scoring is in progress.
#[derive(Debug, Default)]
pub struct EvaluationRunBuilder {
    results: Vec<MethodResult>,
    skipped: Vec<SkippedMethod>,
    order: Vec<String>,
}

impl EvaluationRunBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the result for one method.
    ///
    /// # Errors
    ///
    /// Returns [`PplGateError::Config`] if the method already has a result.
    pub fn insert(&mut self, result: MethodResult) -> Result<()> {
        if self.get(result.method()).is_some() {
            return Err(PplGateError::Config(format!(
                "duplicate result for method '{}'",
                result.method()
            )));
        }
        self.order.push(result.method().to_string());
        self.results.push(result);
        Ok(())
    }

    /// Record that a method was skipped.
    pub fn skip(&mut self, method: impl Into<String>, reason: impl Into<String>) {
        let method = method.into();
        self.order.push(method.clone());
        self.skipped.push(SkippedMethod {
            method,
            reason: reason.into(),
        });
    }

    /// Look up a recorded result by method name.
    pub fn get(&self, method: &str) -> Option<&MethodResult> {
        self.results.iter().find(|r| r.method() == method)
    }

    /// Recorded results in insertion order.
    pub fn results(&self) -> &[MethodResult] {
        &self.results
    }

    /// Skipped methods in the order they were skipped.
    pub fn skipped(&self) -> &[SkippedMethod] {
        &self.skipped
    }

    /// Seal the run with its threshold and per-method retention summaries.
    ///
    /// `retention` must hold exactly one summary per recorded result, in the
    /// same order.
    ///
    /// # Errors
    ///
    /// Returns [`PplGateError::Config`] if the summaries do not line up with the results.
    pub fn seal(
        self,
        threshold: Threshold,
        retention: Vec<RetentionSummary>,
    ) -> Result<EvaluationRun> {
        if retention.len() != self.results.len() {
            return Err(PplGateError::Config(format!(
                "expected {} retention summaries, got {}",
                self.results.len(),
                retention.len()
            )));
        }
        for (result, summary) in self.results.iter().zip(&retention) {
            if result.method() != summary.method || result.total_count() != summary.total_count
            {
                return Err(PplGateError::Config(format!(
                    "retention summary for '{}' does not match result for '{}'",
                    summary.method,
                    result.method()
                )));
            }
        }
        Ok(EvaluationRun {
            results: self.results,
            threshold,
            retention,
            skipped: self.skipped,
            method_order: self.order,
        })
    }
}

/// What happened to one method of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MethodOutcome<'a> {
    /// Scored and filtered.
    Retained(&'a RetentionSummary),
    /// Left out of the run.
    Skipped(&'a SkippedMethod),
}

/// A completed, read-only evaluation.
///
/// Results and retention summaries are kept in configuration order;
/// `method_order` interleaves recorded and skipped methods the same way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRun {
    results: Vec<MethodResult>,
    threshold: Threshold,
    retention: Vec<RetentionSummary>,
    skipped: Vec<SkippedMethod>,
    method_order: Vec<String>,
}

impl EvaluationRun {
    /// All recorded method results.
    pub fn results(&self) -> &[MethodResult] {
        &self.results
    }

    /// Result for a single method.
    pub fn result(&self, method: &str) -> Option<&MethodResult> {
        self.results.iter().find(|r| r.method() == method)
    }

    /// The acceptance threshold.
    pub fn threshold(&self) -> &Threshold {
        &self.threshold
    }

    /// Retention summaries, one per recorded method.
    pub fn retention(&self) -> &[RetentionSummary] {
        &self.retention
    }

    /// Retention summary for a single method.
    pub fn retention_for(&self, method: &str) -> Option<&RetentionSummary> {
        self.retention.iter().find(|r| r.method == method)
    }

    /// Methods that were skipped, with reasons.
    pub fn skipped(&self) -> &[SkippedMethod] {
        &self.skipped
    }

    /// Every method's outcome, recorded and skipped alike, in configuration order.
    pub fn outcomes(&self) -> impl Iterator<Item = MethodOutcome<'_>> + '_ {
        self.method_order.iter().filter_map(move |name| {
            self.retention_for(name)
                .map(MethodOutcome::Retained)
                .or_else(|| {
                    self.skipped
                        .iter()
                        .find(|s| &s.method == name)
                        .map(MethodOutcome::Skipped)
                })
        })
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// External perplexity scoring service.
#[async_trait]
pub trait PerplexityScorer: Send + Sync {
    /// Score every text in `texts` with `model_id`.
    ///
    /// Must return one score per text or fail the whole batch.
    async fn score(&self, texts: &[String], model_id: &str, max_length: usize)
        -> Result<ScoreBatch>;

    /// Scorer name used in logs.
    fn name(&self) -> &'static str;
}

/// Source of sample texts for a method.
pub trait SampleExtractor: Send + Sync {
    /// Return the texts of the first `count` records of `source`.
    fn extract(&self, source: &Path, count: usize) -> Result<Vec<String>>;
}

/// Rule that turns two baseline results into an acceptance threshold.
pub trait ThresholdPolicy: Send + Sync {
    /// Compute the threshold.
    fn compute(&self, baseline_a: &MethodResult, baseline_b: &MethodResult) -> Result<Threshold>;

    /// Policy name recorded on the threshold.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Top-level evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Model identifier passed to the scorer.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Maximum token length accepted by the scorer.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// First baseline method name.
    pub baseline_a: String,
    /// Second baseline method name.
    pub baseline_b: String,
    /// Factor applied to the baseline statistic.
    #[serde(default = "default_threshold_multiplier")]
    pub threshold_multiplier: f64,
    /// Which threshold policy to use.
    #[serde(default)]
    pub threshold_policy: ThresholdPolicyConfig,
    /// Render the histogram image.
    #[serde(default = "default_true")]
    pub plotting_enabled: bool,
    /// Scoring service settings.
    #[serde(default)]
    pub scorer: ScorerConfig,
    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Methods to evaluate, in evaluation and report order.
    pub methods: Vec<MethodConfig>,
}

impl EvalConfig {
    /// Whether `method` is one of the two baselines.
    pub fn is_baseline(&self, method: &str) -> bool {
        method == self.baseline_a || method == self.baseline_b
    }

    /// Check structural invariants before any scoring happens.
    ///
    /// # Errors
    ///
    /// Returns [`PplGateError::Config`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.methods.is_empty() {
            return Err(PplGateError::Config("no methods configured".to_string()));
        }
        for (i, method) in self.methods.iter().enumerate() {
            if method.name.trim().is_empty() {
                return Err(PplGateError::Config(format!(
                    "method #{i} has an empty name"
                )));
            }
            if method.sample_count == 0 {
                return Err(PplGateError::Config(format!(
                    "method '{}' has sample_count 0",
                    method.name
                )));
            }
            if self.methods[..i].iter().any(|m| m.name == method.name) {
                return Err(PplGateError::Config(format!(
                    "method '{}' is configured more than once",
                    method.name
                )));
            }
        }
        if self.baseline_a == self.baseline_b {
            return Err(PplGateError::Config(format!(
                "baselines must be distinct, both are '{}'",
                self.baseline_a
            )));
        }
        for baseline in [&self.baseline_a, &self.baseline_b] {
            if !self.methods.iter().any(|m| &m.name == baseline) {
                return Err(PplGateError::Config(format!(
                    "baseline '{baseline}' is not among the configured methods"
                )));
            }
        }
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier <= 0.0 {
            return Err(PplGateError::Config(format!(
                "threshold_multiplier must be positive, got {}",
                self.threshold_multiplier
            )));
        }
        if self.max_length == 0 {
            return Err(PplGateError::Config("max_length must be positive".to_string()));
        }
        Ok(())
    }

    /// Resolve relative dataset and cache paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for method in &mut self.methods {
            if method.dataset.is_relative() {
                method.dataset = base.join(&method.dataset);
            }
        }
        if let Some(cache) = self.scorer.cache_path.as_mut() {
            if cache.is_relative() {
                *cache = base.join(&*cache);
            }
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            max_length: default_max_length(),
            baseline_a: "Dolly_EN".to_string(),
            baseline_b: "Alpaca_EN".to_string(),
            threshold_multiplier: default_threshold_multiplier(),
            threshold_policy: ThresholdPolicyConfig::default(),
            plotting_enabled: true,
            scorer: ScorerConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            methods: Vec::new(),
        }
    }
}

/// One method to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    /// Method label used in reports.
    pub name: String,
    /// Dataset file holding the method's records.
    pub dataset: PathBuf,
    /// Number of leading records to score.
    pub sample_count: usize,
}

impl MethodConfig {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, dataset: impl Into<PathBuf>, sample_count: usize) -> Self {
        Self {
            name: name.into(),
            dataset: dataset.into(),
            sample_count,
        }
    }
}

/// Threshold policy selection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdPolicyConfig {
    /// Average of the two baseline means times the multiplier.
    #[default]
    BaselineMean,
    /// Percentile of the pooled baseline values times the multiplier.
    PooledPercentile {
        /// Percentile in `[0, 100]`.
        percentile: f64,
    },
}

/// Scoring service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// HTTP endpoint of the scoring service.
    #[serde(default = "default_scorer_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_scorer_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Ask the scorer to prepend a BOS token.
    #[serde(default)]
    pub add_start_token: bool,
    /// Optional JSON file used to memoize scores across runs.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scorer_endpoint(),
            timeout_seconds: default_scorer_timeout_seconds(),
            add_start_token: false,
            cache_path: None,
        }
    }
}

/// Output file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving all artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Histogram image file name.
    #[serde(default = "default_histogram_file")]
    pub histogram_file: String,
    /// JSON results file name.
    #[serde(default = "default_results_file")]
    pub results_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            histogram_file: default_histogram_file(),
            results_file: default_results_file(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_model_id() -> String {
    "gpt2".to_string()
}

fn default_max_length() -> usize {
    1024
}

fn default_threshold_multiplier() -> f64 {
    1.5
}

fn default_true() -> bool {
    true
}

fn default_scorer_endpoint() -> String {
    "http://127.0.0.1:8080/perplexity".to_string()
}

fn default_scorer_timeout_seconds() -> u64 {
    300
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_histogram_file() -> String {
    "PPL.png".to_string()
}

fn default_results_file() -> String {
    "perplexity_results.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum PplGateError {
    /// The scorer produced a non-finite perplexity.
    #[error("Invalid score for {method}: {detail}")]
    InvalidScore {
        /// Method whose scores were rejected.
        method: String,
        /// Which value was bad.
        detail: String,
    },

    /// A baseline mean cannot anchor a threshold.
    #[error("Invalid baseline {method}: mean perplexity {mean} must be positive")]
    InvalidBaseline {
        /// Baseline method name.
        method: String,
        /// The offending mean.
        mean: f64,
    },

    /// A method has no samples.
    #[error("Empty sample set for {method}")]
    EmptySampleSet {
        /// Method name.
        method: String,
    },

    /// The scorer could not process a method's batch.
    #[error("Scoring failed for {method}: {cause}")]
    ScoringFailure {
        /// Method name.
        method: String,
        /// Collaborator error message.
        cause: String,
    },

    /// A baseline method failed, so no threshold can be computed.
    #[error("Baseline {baseline} failed: {source}")]
    BaselineFailed {
        /// Baseline method name.
        baseline: String,
        /// Underlying failure.
        #[source]
        source: Box<PplGateError>,
    },

    /// Scoring service error.
    #[error("Scorer error: {0}")]
    Scorer(String),

    /// Dataset read or parse error.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report rendering error.
    #[error("Report error: {0}")]
    Report(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PplGateError {
    /// Wrap an error raised while processing `baseline`.
    pub fn baseline_failed(baseline: impl Into<String>, source: PplGateError) -> Self {
        Self::BaselineFailed {
            baseline: baseline.into(),
            source: Box::new(source),
        }
    }
}

/// Convenience alias for `std::result::Result<T, PplGateError>`.
pub type Result<T> = std::result::Result<T, PplGateError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn result(method: &str, values: &[f64]) -> MethodResult {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        MethodResult::new(method, values.to_vec(), mean).unwrap()
    }

    fn config_with(methods: &[&str]) -> EvalConfig {
        EvalConfig {
            methods: methods
                .iter()
                .map(|m| MethodConfig::new(*m, format!("{m}.json"), 10))
                .collect(),
            ..EvalConfig::default()
        }
    }

    #[test]
    fn test_method_result_preserves_order() {
        let r = result("XSUM", &[3.0, 1.0, 2.0]);
        assert_eq!(r.values(), &[3.0, 1.0, 2.0]);
        assert_eq!(r.total_count(), 3);
        assert_eq!(r.method(), "XSUM");
    }

    #[test]
    fn test_method_result_rejects_nan() {
        let err = MethodResult::new("HashChain", vec![1.0, f64::NAN], 1.0).unwrap_err();
        assert!(matches!(err, PplGateError::InvalidScore { ref method, .. } if method == "HashChain"));
        assert!(err.to_string().contains("sample 1"));
    }

    #[test]
    fn test_method_result_rejects_infinite_mean() {
        let err = MethodResult::new("HashChain", vec![1.0], f64::INFINITY).unwrap_err();
        assert!(matches!(err, PplGateError::InvalidScore { .. }));
    }

    #[test]
    fn test_method_result_rejects_empty() {
        let err = MethodResult::new("AGNEWS", Vec::new(), 1.0).unwrap_err();
        assert!(matches!(err, PplGateError::EmptySampleSet { .. }));
    }

    #[test]
    fn test_score_batch_mean() {
        let batch = ScoreBatch::from_perplexities(vec![10.0, 20.0, 30.0]);
        assert!((batch.mean_perplexity - 20.0).abs() < f64::EPSILON);
        assert_eq!(ScoreBatch::from_perplexities(Vec::new()).mean_perplexity, 0.0);
    }

    #[test]
    fn test_builder_rejects_duplicate() {
        let mut builder = EvaluationRunBuilder::new();
        builder.insert(result("XSUM", &[1.0])).unwrap();
        assert!(builder.insert(result("XSUM", &[2.0])).is_err());
        assert_eq!(builder.results().len(), 1);
    }

    #[test]
    fn test_seal_checks_alignment() {
        let mut builder = EvaluationRunBuilder::new();
        builder.insert(result("XSUM", &[1.0, 2.0])).unwrap();
        let threshold = Threshold::new(10.0, "baseline_mean", "Dolly_EN", "Alpaca_EN");
        let wrong = vec![RetentionSummary {
            method: "AGNEWS".to_string(),
            retained_count: 2,
            total_count: 2,
            retained_ratio: 1.0,
        }];
        assert!(builder.seal(threshold, wrong).is_err());
    }

    #[test]
    fn test_seal_builds_read_only_run() {
        let mut builder = EvaluationRunBuilder::new();
        builder.insert(result("XSUM", &[1.0, 2.0])).unwrap();
        builder.skip("Proflingo", "scorer unavailable");
        let threshold = Threshold::new(10.0, "baseline_mean", "Dolly_EN", "Alpaca_EN");
        let run = builder
            .seal(
                threshold,
                vec![RetentionSummary {
                    method: "XSUM".to_string(),
                    retained_count: 2,
                    total_count: 2,
                    retained_ratio: 1.0,
                }],
            )
            .unwrap();
        assert_eq!(run.threshold().value(), 10.0);
        assert_eq!(run.threshold().baselines(), ("Dolly_EN", "Alpaca_EN"));
        assert_eq!(run.retention_for("XSUM").unwrap().rejected_count(), 0);
        assert_eq!(run.skipped()[0].method, "Proflingo");
        assert!(run.result("Proflingo").is_none());
    }

    #[test]
    fn test_outcomes_follow_insertion_order() {
        let mut builder = EvaluationRunBuilder::new();
        builder.skip("Proflingo", "scorer unavailable");
        builder.insert(result("Dolly_EN", &[20.0])).unwrap();
        builder.skip("XSUM", "empty dataset");
        builder.insert(result("Alpaca_EN", &[30.0])).unwrap();
        let summary = |method: &str, value: f64| RetentionSummary {
            method: method.to_string(),
            retained_count: 1,
            total_count: 1,
            retained_ratio: value,
        };
        let run = builder
            .seal(
                Threshold::new(37.5, "baseline_mean", "Dolly_EN", "Alpaca_EN"),
                vec![summary("Dolly_EN", 1.0), summary("Alpaca_EN", 1.0)],
            )
            .unwrap();

        let names: Vec<&str> = run
            .outcomes()
            .map(|o| match o {
                MethodOutcome::Retained(s) => s.method.as_str(),
                MethodOutcome::Skipped(s) => s.method.as_str(),
            })
            .collect();
        assert_eq!(names, vec!["Proflingo", "Dolly_EN", "XSUM", "Alpaca_EN"]);
        assert!(matches!(
            run.outcomes().next(),
            Some(MethodOutcome::Skipped(s)) if s.reason == "scorer unavailable"
        ));
    }

    #[test]
    fn test_config_validate_ok() {
        let cfg = config_with(&["Dolly_EN", "Alpaca_EN", "XSUM"]);
        assert!(cfg.validate().is_ok());
        assert!(cfg.is_baseline("Alpaca_EN"));
        assert!(!cfg.is_baseline("XSUM"));
    }

    #[test]
    fn test_config_validate_missing_baseline() {
        let cfg = config_with(&["Dolly_EN", "XSUM"]);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Alpaca_EN"));
    }

    #[test]
    fn test_config_validate_duplicate_method() {
        let cfg = config_with(&["Dolly_EN", "Alpaca_EN", "Dolly_EN"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_samples() {
        let mut cfg = config_with(&["Dolly_EN", "Alpaca_EN"]);
        cfg.methods[0].sample_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_validate_bad_multiplier() {
        let mut cfg = config_with(&["Dolly_EN", "Alpaca_EN"]);
        cfg.threshold_multiplier = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let mut cfg = config_with(&["Dolly_EN", "Alpaca_EN"]);
        cfg.methods[1].dataset = PathBuf::from("/abs/alpaca.json");
        cfg.scorer.cache_path = Some(PathBuf::from("cache/scores.json"));
        cfg.resolve_paths(Path::new("/configs"));
        assert_eq!(cfg.methods[0].dataset, PathBuf::from("/configs/Dolly_EN.json"));
        assert_eq!(cfg.methods[1].dataset, PathBuf::from("/abs/alpaca.json"));
        assert_eq!(
            cfg.scorer.cache_path,
            Some(PathBuf::from("/configs/cache/scores.json"))
        );
    }

    #[test]
    fn test_config_defaults_from_yaml() {
        let yaml = r#"
baseline_a: Dolly_EN
baseline_b: Alpaca_EN
methods:
  - { name: Dolly_EN, dataset: dolly.json, sample_count: 500 }
  - { name: Alpaca_EN, dataset: alpaca.json, sample_count: 500 }
"#;
        let cfg: EvalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.model_id, "gpt2");
        assert_eq!(cfg.max_length, 1024);
        assert!((cfg.threshold_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(cfg.threshold_policy, ThresholdPolicyConfig::BaselineMean);
        assert!(cfg.plotting_enabled);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_policy_config_tagged() {
        let yaml = "kind: pooled_percentile\npercentile: 90.0\n";
        let policy: ThresholdPolicyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            policy,
            ThresholdPolicyConfig::PooledPercentile { percentile: 90.0 }
        );
    }

    #[test]
    fn test_baseline_failed_names_baseline() {
        let err = PplGateError::baseline_failed(
            "Dolly_EN",
            PplGateError::ScoringFailure {
                method: "Dolly_EN".to_string(),
                cause: "sequence longer than 1024 tokens".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("Baseline Dolly_EN failed"));
        assert!(msg.contains("1024 tokens"));
    }
}
