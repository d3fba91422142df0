//! Acceptance threshold derivation from the two baseline corpora.
//!
//! Two [`ThresholdPolicy`] implementations are provided:
//!
//! | Policy | Threshold |
//! |--------|-----------|
//! | [`BaselineMeanPolicy`] | `((mean_a + mean_b) / 2) * multiplier` |
//! | [`PooledPercentilePolicy`] | `percentile(values_a ∪ values_b) * multiplier` |
//!
//! Both are symmetric in their baseline arguments and deterministic.

use pplgate_core::{
    MethodResult, PplGateError, Result, Threshold, ThresholdPolicy, ThresholdPolicyConfig,
};

/// Multiplier applied to the baseline statistic unless configured otherwise.
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Compute the threshold with the default baseline-mean policy.
///
/// # Errors
///
/// Returns [`PplGateError::InvalidBaseline`] if either baseline mean is not positive.
pub fn compute_threshold(
    baseline_a: &MethodResult,
    baseline_b: &MethodResult,
    multiplier: f64,
) -> Result<Threshold> {
    BaselineMeanPolicy::new(multiplier)?.compute(baseline_a, baseline_b)
}

/// Build the policy selected in configuration.
pub fn policy_from_config(
    config: &ThresholdPolicyConfig,
    multiplier: f64,
) -> Result<Box<dyn ThresholdPolicy>> {
    Ok(match config {
        ThresholdPolicyConfig::BaselineMean => Box::new(BaselineMeanPolicy::new(multiplier)?),
        ThresholdPolicyConfig::PooledPercentile { percentile } => {
            Box::new(PooledPercentilePolicy::new(*percentile, multiplier)?)
        }
    })
}

fn validate_multiplier(multiplier: f64) -> Result<()> {
    if multiplier.is_finite() && multiplier > 0.0 {
        Ok(())
    } else {
        Err(PplGateError::Config(format!(
            "threshold multiplier must be positive, got {multiplier}"
        )))
    }
}

fn ensure_positive_mean(baseline: &MethodResult) -> Result<()> {
    if baseline.mean() > 0.0 {
        Ok(())
    } else {
        Err(PplGateError::InvalidBaseline {
            method: baseline.method().to_string(),
            mean: baseline.mean(),
        })
    }
}

/// Average of the two baseline means, scaled by `multiplier`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineMeanPolicy {
    multiplier: f64,
}

impl BaselineMeanPolicy {
    /// Create the policy.
    ///
    /// # Errors
    ///
    /// Returns [`PplGateError::Config`] for a non-positive or non-finite multiplier.
    pub fn new(multiplier: f64) -> Result<Self> {
        validate_multiplier(multiplier)?;
        Ok(Self { multiplier })
    }

    /// Configured multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for BaselineMeanPolicy {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl ThresholdPolicy for BaselineMeanPolicy {
    fn compute(&self, baseline_a: &MethodResult, baseline_b: &MethodResult) -> Result<Threshold> {
        ensure_positive_mean(baseline_a)?;
        ensure_positive_mean(baseline_b)?;
        let base = (baseline_a.mean() + baseline_b.mean()) / 2.0;
        Ok(Threshold::new(
            base * self.multiplier,
            self.name(),
            baseline_a.method(),
            baseline_b.method(),
        ))
    }

    fn name(&self) -> &'static str {
        "baseline_mean"
    }
}

/// Percentile of both baselines' pooled values, scaled by `multiplier`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PooledPercentilePolicy {
    percentile: f64,
    multiplier: f64,
}

impl PooledPercentilePolicy {
    /// Create the policy. `percentile` is in `[0, 100]`.
    pub fn new(percentile: f64, multiplier: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(PplGateError::Config(format!(
                "percentile must be within [0, 100], got {percentile}"
            )));
        }
        validate_multiplier(multiplier)?;
        Ok(Self {
            percentile,
            multiplier,
        })
    }
}

impl ThresholdPolicy for PooledPercentilePolicy {
    fn compute(&self, baseline_a: &MethodResult, baseline_b: &MethodResult) -> Result<Threshold> {
        ensure_positive_mean(baseline_a)?;
        ensure_positive_mean(baseline_b)?;
        let mut pooled: Vec<f64> = baseline_a
            .values()
            .iter()
            .chain(baseline_b.values())
            .copied()
            .collect();
        pooled.sort_by(|a, b| a.total_cmp(b));
        Ok(Threshold::new(
            percentile(&pooled, self.percentile) * self.multiplier,
            self.name(),
            baseline_a.method(),
            baseline_b.method(),
        ))
    }

    fn name(&self) -> &'static str {
        "pooled_percentile"
    }
}

/// Linearly interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(method: &str, values: &[f64], mean: f64) -> MethodResult {
        MethodResult::new(method, values.to_vec(), mean).unwrap()
    }

    #[test]
    fn test_dolly_alpaca_scenario() {
        let dolly = baseline("Dolly_EN", &[20.0], 20.0);
        let alpaca = baseline("Alpaca_EN", &[30.0], 30.0);
        let t = compute_threshold(&dolly, &alpaca, 1.5).unwrap();
        assert_eq!(t.value(), 37.5);
        assert_eq!(t.policy(), "baseline_mean");
        assert_eq!(t.baselines(), ("Dolly_EN", "Alpaca_EN"));
    }

    #[test]
    fn test_symmetric() {
        let a = baseline("Dolly_EN", &[11.3, 19.0], 15.15);
        let b = baseline("Alpaca_EN", &[27.1, 44.9, 31.0], 34.333);
        let ab = compute_threshold(&a, &b, 1.5).unwrap();
        let ba = compute_threshold(&b, &a, 1.5).unwrap();
        assert_eq!(ab.value().to_bits(), ba.value().to_bits());

        let policy = PooledPercentilePolicy::new(75.0, 1.5).unwrap();
        let ab = policy.compute(&a, &b).unwrap();
        let ba = policy.compute(&b, &a).unwrap();
        assert_eq!(ab.value().to_bits(), ba.value().to_bits());
    }

    #[test]
    fn test_negative_mean_rejected() {
        let a = baseline("Dolly_EN", &[1.0], -1.0);
        let b = baseline("Alpaca_EN", &[30.0], 30.0);
        let err = compute_threshold(&a, &b, 1.5).unwrap_err();
        assert!(
            matches!(err, PplGateError::InvalidBaseline { ref method, mean } if method == "Dolly_EN" && mean == -1.0)
        );
    }

    #[test]
    fn test_zero_mean_rejected() {
        let a = baseline("Dolly_EN", &[20.0], 20.0);
        let b = baseline("Alpaca_EN", &[0.0], 0.0);
        let err = compute_threshold(&a, &b, 1.5).unwrap_err();
        assert!(matches!(err, PplGateError::InvalidBaseline { .. }));
    }

    #[test]
    fn test_bad_multiplier_rejected() {
        assert!(BaselineMeanPolicy::new(0.0).is_err());
        assert!(BaselineMeanPolicy::new(-1.5).is_err());
        assert!(BaselineMeanPolicy::new(f64::NAN).is_err());
        assert_eq!(BaselineMeanPolicy::default().multiplier(), DEFAULT_MULTIPLIER);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 0.0), 10.0);
        assert_eq!(percentile(&sorted, 100.0), 40.0);
        assert!((percentile(&sorted, 50.0) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_pooled_percentile_policy() {
        let a = baseline("Dolly_EN", &[10.0, 30.0], 20.0);
        let b = baseline("Alpaca_EN", &[40.0, 20.0], 30.0);
        let policy = PooledPercentilePolicy::new(50.0, 2.0).unwrap();
        let t = policy.compute(&a, &b).unwrap();
        assert!((t.value() - 50.0).abs() < 1e-12);
        assert_eq!(t.policy(), "pooled_percentile");
    }

    #[test]
    fn test_percentile_out_of_range() {
        assert!(PooledPercentilePolicy::new(101.0, 1.5).is_err());
        assert!(PooledPercentilePolicy::new(-0.1, 1.5).is_err());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = policy_from_config(&ThresholdPolicyConfig::BaselineMean, 1.5).unwrap();
        assert_eq!(policy.name(), "baseline_mean");
        let policy = policy_from_config(
            &ThresholdPolicyConfig::PooledPercentile { percentile: 90.0 },
            1.0,
        )
        .unwrap();
        assert_eq!(policy.name(), "pooled_percentile");
    }
}
