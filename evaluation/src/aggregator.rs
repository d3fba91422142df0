//! Per-method perplexity aggregation.
//!
//! [`record`] turns a scorer batch into an immutable [`MethodResult`];
//! [`PerplexityStats`] derives descriptive statistics from one for reporting.

use pplgate_core::{MethodResult, Result};
use serde::{Deserialize, Serialize};

/// Record one method's scores.
///
/// Input order is preserved. Fails with `InvalidScore` on any NaN or infinite
/// value (or mean) and with `EmptySampleSet` when `values` is empty.
pub fn record(method: &str, values: Vec<f64>, mean: f64) -> Result<MethodResult> {
    let result = MethodResult::new(method, values, mean)?;
    tracing::info!(
        method,
        samples = result.total_count(),
        mean = result.mean(),
        "Mean Perplexity for {}: {:.2}",
        method,
        result.mean()
    );
    Ok(result)
}

/// Descriptive statistics over one method's perplexities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerplexityStats {
    /// Number of samples.
    pub count: usize,
    /// Mean reported by the scorer.
    pub mean: f64,
    /// Median of the values.
    pub median: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl PerplexityStats {
    /// Compute statistics for a recorded result.
    pub fn from_result(result: &MethodResult) -> Self {
        let values = result.values();
        let count = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        let sample_mean = values.iter().sum::<f64>() / count as f64;
        let variance = values
            .iter()
            .map(|v| (v - sample_mean).powi(2))
            .sum::<f64>()
            / count as f64;

        Self {
            count,
            mean: result.mean(),
            median,
            min: sorted[0],
            max: sorted[count - 1],
            std_dev: variance.sqrt(),
        }
    }
}
