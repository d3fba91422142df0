//! Clients for the external perplexity scoring service.
//!
//! - [`HttpPerplexityScorer`]: batches texts into one JSON request per method
//! - [`CachedScorer`]: memoizes per-text scores in front of any scorer
//!
//! # Wire format
//!
//! ```text
//! POST {endpoint}
//! {"texts": ["..."], "model_id": "gpt2", "max_length": 1024, "add_start_token": false}
//!
//! 200 OK
//! {"perplexities": [12.3, ...], "mean_perplexity": 12.3}
//! ```
//!
//! Services that only expose token log-probabilities may answer with
//! `{"token_logprobs": [[-2.1, -0.4, ...], ...]}` instead; perplexities and
//! their mean are then derived locally.

mod cache;

pub use cache::CachedScorer;

use async_trait::async_trait;
use pplgate_core::{PerplexityScorer, PplGateError, Result, ScoreBatch, ScorerConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Perplexity from per-token log-probabilities: `exp(-mean(logprobs))`.
///
/// Returns `None` for an empty slice or when the result is not finite.
pub fn perplexity_from_logprobs(logprobs: &[f64]) -> Option<f64> {
    if logprobs.is_empty() {
        return None;
    }
    let mean = logprobs.iter().sum::<f64>() / logprobs.len() as f64;
    Some((-mean).exp()).filter(|ppl| ppl.is_finite())
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    texts: &'a [String],
    model_id: &'a str,
    max_length: usize,
    add_start_token: bool,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    perplexities: Option<Vec<f64>>,
    #[serde(default)]
    mean_perplexity: Option<f64>,
    #[serde(default)]
    token_logprobs: Option<Vec<Vec<f64>>>,
}

impl ScoreResponse {
    fn into_batch(self) -> Result<ScoreBatch> {
        match (self.perplexities, self.token_logprobs) {
            (Some(perplexities), _) => Ok(match self.mean_perplexity {
                Some(mean_perplexity) => ScoreBatch {
                    perplexities,
                    mean_perplexity,
                },
                None => ScoreBatch::from_perplexities(perplexities),
            }),
            (None, Some(logprobs)) => {
                let perplexities = logprobs
                    .iter()
                    .enumerate()
                    .map(|(i, lp)| {
                        perplexity_from_logprobs(lp).ok_or_else(|| {
                            PplGateError::Scorer(format!(
                                "text {i} has no finite perplexity from its token log-probabilities"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ScoreBatch::from_perplexities(perplexities))
            }
            (None, None) => Err(PplGateError::Scorer(
                "scoring response has neither perplexities nor token_logprobs".to_string(),
            )),
        }
    }
}

/// Scorer backed by an HTTP scoring service.
pub struct HttpPerplexityScorer {
    client: reqwest::Client,
    endpoint: String,
    add_start_token: bool,
}

impl HttpPerplexityScorer {
    /// Build a scorer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PplGateError::Scorer`] if the HTTP client cannot be built.
    pub fn new(config: &ScorerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PplGateError::Scorer(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            add_start_token: config.add_start_token,
        })
    }

    /// Endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PerplexityScorer for HttpPerplexityScorer {
    async fn score(
        &self,
        texts: &[String],
        model_id: &str,
        max_length: usize,
    ) -> Result<ScoreBatch> {
        let request = ScoreRequest {
            texts,
            model_id,
            max_length,
            add_start_token: self.add_start_token,
        };

        tracing::debug!(endpoint = %self.endpoint, texts = texts.len(), model_id, "scoring batch");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| PplGateError::Scorer(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PplGateError::Scorer(format!(
                "scoring service returned {status}: {body}"
            )));
        }

        let batch = response
            .json::<ScoreResponse>()
            .await
            .map_err(|e| PplGateError::Scorer(format!("malformed scoring response: {e}")))?
            .into_batch()?;

        if batch.perplexities.len() != texts.len() {
            return Err(PplGateError::Scorer(format!(
                "expected {} scores, got {}",
                texts.len(),
                batch.perplexities.len()
            )));
        }

        Ok(batch)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perplexity_from_logprobs() {
        let ppl = perplexity_from_logprobs(&[-1.0, -1.0, -1.0]).unwrap();
        assert!((ppl - std::f64::consts::E).abs() < 1e-12);
        assert_eq!(perplexity_from_logprobs(&[0.0]), Some(1.0));
        assert_eq!(perplexity_from_logprobs(&[]), None);
        assert_eq!(perplexity_from_logprobs(&[-800.0, -900.0]), None);
        assert_eq!(perplexity_from_logprobs(&[f64::NEG_INFINITY]), None);
    }

    #[test]
    fn test_response_with_perplexities() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"perplexities": [10.0, 30.0], "mean_perplexity": 20.0}"#)
                .unwrap();
        let batch = response.into_batch().unwrap();
        assert_eq!(batch.perplexities, vec![10.0, 30.0]);
        assert_eq!(batch.mean_perplexity, 20.0);
    }

    #[test]
    fn test_response_mean_derived_when_missing() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"perplexities": [10.0, 30.0]}"#).unwrap();
        assert_eq!(response.into_batch().unwrap().mean_perplexity, 20.0);
    }

    #[test]
    fn test_response_from_logprobs() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"token_logprobs": [[0.0, 0.0], [-1.0]]}"#).unwrap();
        let batch = response.into_batch().unwrap();
        assert_eq!(batch.perplexities[0], 1.0);
        assert!((batch.perplexities[1] - std::f64::consts::E).abs() < 1e-12);
    }

    #[test]
    fn test_response_empty_logprobs_rejected() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"token_logprobs": [[-1.0], []]}"#).unwrap();
        let err = response.into_batch().unwrap_err();
        assert!(err.to_string().contains("text 1"));
    }

    #[test]
    fn test_response_overflowing_logprobs_rejected() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"token_logprobs": [[-1.0], [-750.0, -760.0]]}"#).unwrap();
        let err = response.into_batch().unwrap_err();
        assert!(matches!(err, PplGateError::Scorer(_)));
        assert!(err.to_string().contains("text 1"));
    }

    #[test]
    fn test_response_without_scores_rejected() {
        let response: ScoreResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_batch().is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let texts = vec!["hello".to_string()];
        let request = ScoreRequest {
            texts: &texts,
            model_id: "gpt2",
            max_length: 1024,
            add_start_token: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["texts"][0], "hello");
        assert_eq!(json["model_id"], "gpt2");
        assert_eq!(json["max_length"], 1024);
        assert_eq!(json["add_start_token"], false);
    }

    #[test]
    fn test_new_uses_config_endpoint() {
        let config = ScorerConfig {
            endpoint: "http://scorer.internal:9000/ppl".to_string(),
            ..ScorerConfig::default()
        };
        let scorer = HttpPerplexityScorer::new(&config).unwrap();
        assert_eq!(scorer.endpoint(), "http://scorer.internal:9000/ppl");
        assert_eq!(scorer.name(), "http");
    }
}
