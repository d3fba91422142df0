//! Evaluation runner driving the per-method scoring loop.
//!
//! For every configured method, in configuration order:
//! 1. Extract the first `sample_count` texts from the method's dataset
//! 2. Score them with the configured [`PerplexityScorer`]
//! 3. Record the scores as a [`MethodResult`]
//!
//! Once every method has been visited, the threshold policy runs on the two
//! baselines and the retention filter runs on every recorded method,
//! baselines included.
//!
//! # Failure policy
//!
//! | Where | Baseline method | Other method |
//! |-------|-----------------|--------------|
//! | extract / score / record | abort the run (`BaselineFailed`) | skip, report reason |
//! | threshold policy | abort the run | n/a |
//!
//! Nothing is retried.

use crate::aggregator;
use crate::datasets::DatasetLoader;
use crate::retention;
use pplgate_core::{
    EvalConfig, EvaluationRun, EvaluationRunBuilder, MethodConfig, MethodResult,
    PerplexityScorer, PplGateError, Result, SampleExtractor, ThresholdPolicy,
};
use std::time::Instant;

/// Runs one evaluation over a validated configuration.
pub struct EvaluationRunner<'a> {
    config: &'a EvalConfig,
    extractor: &'a dyn SampleExtractor,
    scorer: &'a dyn PerplexityScorer,
    policy: &'a dyn ThresholdPolicy,
}

impl<'a> EvaluationRunner<'a> {
    /// Create a runner from its collaborators.
    pub fn new(
        config: &'a EvalConfig,
        extractor: &'a dyn SampleExtractor,
        scorer: &'a dyn PerplexityScorer,
        policy: &'a dyn ThresholdPolicy,
    ) -> Self {
        Self {
            config,
            extractor,
            scorer,
            policy,
        }
    }

    /// Run the evaluation to completion.
    ///
    /// # Errors
    ///
    /// - [`PplGateError::Config`] if the configuration is invalid.
    /// - [`PplGateError::BaselineFailed`] if a baseline could not be scored or recorded.
    /// - Any error from the threshold policy (e.g. `InvalidBaseline`).
    pub async fn run(&self) -> Result<EvaluationRun> {
        self.config.validate()?;
        let start = Instant::now();

        tracing::info!(
            methods = self.config.methods.len(),
            model_id = %self.config.model_id,
            scorer = self.scorer.name(),
            policy = self.policy.name(),
            "starting perplexity evaluation"
        );

        let mut builder = EvaluationRunBuilder::new();
        for method in &self.config.methods {
            match self.evaluate_method(method).await {
                Ok(result) => builder.insert(result)?,
                Err(e) if self.config.is_baseline(&method.name) => {
                    tracing::error!(method = %method.name, error = %e, "baseline failed");
                    return Err(PplGateError::baseline_failed(&method.name, e));
                }
                Err(e) => {
                    tracing::warn!(method = %method.name, error = %e, "skipping method");
                    builder.skip(&method.name, e.to_string());
                }
            }
        }

        let (baseline_a, baseline_b) = self.baselines(&builder)?;
        let threshold = self.policy.compute(baseline_a, baseline_b)?;
        tracing::info!(
            threshold = threshold.value(),
            policy = threshold.policy(),
            "Threshold for filtering: {:.2}",
            threshold.value()
        );

        let retention = builder
            .results()
            .iter()
            .map(|result| retention::filter(result, &threshold))
            .collect::<Result<Vec<_>>>()?;

        let run = builder.seal(threshold, retention)?;
        tracing::info!(
            recorded = run.results().len(),
            skipped = run.skipped().len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "evaluation complete"
        );
        Ok(run)
    }

    async fn evaluate_method(&self, method: &MethodConfig) -> Result<MethodResult> {
        let texts = self
            .extractor
            .extract(&method.dataset, method.sample_count)?;
        if texts.is_empty() {
            return Err(PplGateError::EmptySampleSet {
                method: method.name.clone(),
            });
        }

        for sample in DatasetLoader::to_samples(&method.name, &texts) {
            tracing::trace!(
                method = %sample.method,
                index = sample.index,
                chars = sample.text.chars().count(),
                "sample"
            );
        }

        let batch = self
            .scorer
            .score(&texts, &self.config.model_id, self.config.max_length)
            .await
            .map_err(|e| PplGateError::ScoringFailure {
                method: method.name.clone(),
                cause: e.to_string(),
            })?;

        if batch.perplexities.len() != texts.len() {
            return Err(PplGateError::ScoringFailure {
                method: method.name.clone(),
                cause: format!(
                    "scorer returned {} scores for {} texts",
                    batch.perplexities.len(),
                    texts.len()
                ),
            });
        }

        aggregator::record(&method.name, batch.perplexities, batch.mean_perplexity)
    }

    fn baselines<'b>(
        &self,
        builder: &'b EvaluationRunBuilder,
    ) -> Result<(&'b MethodResult, &'b MethodResult)> {
        let lookup = |name: &str| {
            builder.get(name).ok_or_else(|| {
                PplGateError::baseline_failed(
                    name,
                    PplGateError::Config("baseline has no recorded result".to_string()),
                )
            })
        };
        Ok((
            lookup(&self.config.baseline_a)?,
            lookup(&self.config.baseline_b)?,
        ))
    }
}
