//! Retention filter: which samples survive the perplexity threshold.
//!
//! The boundary is inclusive. A sample whose perplexity equals the threshold
//! exactly is retained, compared with plain `<=` on the `f64` values.

use pplgate_core::{MethodResult, PplGateError, Result, RetentionSummary, Threshold};

/// Whether a single perplexity passes the threshold.
pub fn is_retained(value: f64, threshold: &Threshold) -> bool {
    value <= threshold.value()
}

/// Count samples at or below `threshold` and compute the retention ratio.
///
/// # Errors
///
/// Returns [`PplGateError::EmptySampleSet`] if the result has no samples.
pub fn filter(method_result: &MethodResult, threshold: &Threshold) -> Result<RetentionSummary> {
    let total_count = method_result.total_count();
    // Unreachable through MethodResult::new, which rejects empty values.
    if total_count == 0 {
        return Err(PplGateError::EmptySampleSet {
            method: method_result.method().to_string(),
        });
    }

    let retained_count = method_result
        .values()
        .iter()
        .filter(|v| is_retained(**v, threshold))
        .count();

    Ok(RetentionSummary {
        method: method_result.method().to_string(),
        retained_count,
        total_count,
        retained_ratio: retained_count as f64 / total_count as f64,
    })
}
