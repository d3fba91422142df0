//! Memoizing wrapper around any [`PerplexityScorer`].

use async_trait::async_trait;
use pplgate_core::{PerplexityScorer, PplGateError, Result, ScoreBatch};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

type CacheKey = (String, usize, String);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    model_id: String,
    max_length: usize,
    text: String,
    perplexity: Option<f64>,
}

/// Caches per-text perplexities keyed by `(model_id, max_length, text)`.
///
/// Only texts missing from the cache are forwarded to the inner scorer. The
/// returned mean is the arithmetic mean of the batch. Non-finite scores are
/// returned to the caller but never cached.
pub struct CachedScorer<S> {
    inner: S,
    entries: Mutex<HashMap<CacheKey, f64>>,
}

impl<S: PerplexityScorer> CachedScorer<S> {
    /// Wrap `inner` with an empty cache.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Wrap `inner` with entries loaded from `path`. A missing file yields an empty cache.
    ///
    /// Entries without a finite perplexity are dropped.
    pub fn load(inner: S, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(inner));
        }
        let content = std::fs::read_to_string(path)?;
        let stored: Vec<CacheEntry> = serde_json::from_str(&content)?;
        let total = stored.len();
        let entries: HashMap<CacheKey, f64> = stored
            .into_iter()
            .filter_map(|e| {
                let perplexity = e.perplexity.filter(|p| p.is_finite())?;
                Some(((e.model_id, e.max_length, e.text), perplexity))
            })
            .collect();
        if entries.len() < total {
            tracing::warn!(
                path = %path.display(),
                dropped = total - entries.len(),
                "ignored cache entries without a finite perplexity"
            );
        }
        tracing::debug!(path = %path.display(), "loaded score cache");
        Ok(Self {
            inner,
            entries: Mutex::new(entries),
        })
    }

    /// Write all cached scores to `path` as JSON, sorted for stable diffs.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut stored: Vec<CacheEntry> = self
            .lock()
            .iter()
            .map(|((model_id, max_length, text), perplexity)| CacheEntry {
                model_id: model_id.clone(),
                max_length: *max_length,
                text: text.clone(),
                perplexity: Some(*perplexity),
            })
            .collect();
        stored.sort_by(|a, b| {
            (&a.model_id, a.max_length, &a.text).cmp(&(&b.model_id, b.max_length, &b.text))
        });
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    /// Number of cached scores.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, f64>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<S: PerplexityScorer> PerplexityScorer for CachedScorer<S> {
    async fn score(
        &self,
        texts: &[String],
        model_id: &str,
        max_length: usize,
    ) -> Result<ScoreBatch> {
        let key = |text: &str| (model_id.to_string(), max_length, text.to_string());

        let misses: Vec<String> = {
            let entries = self.lock();
            let mut seen = HashSet::new();
            texts
                .iter()
                .filter(|t| !entries.contains_key(&key(t.as_str())) && seen.insert(t.as_str()))
                .cloned()
                .collect()
        };

        tracing::debug!(
            requested = texts.len(),
            misses = misses.len(),
            "score cache lookup"
        );

        let mut fresh: HashMap<&str, f64> = HashMap::new();
        if !misses.is_empty() {
            let batch = self.inner.score(&misses, model_id, max_length).await?;
            if batch.perplexities.len() != misses.len() {
                return Err(PplGateError::Scorer(format!(
                    "expected {} scores, got {}",
                    misses.len(),
                    batch.perplexities.len()
                )));
            }
            let mut entries = self.lock();
            for (text, ppl) in misses.iter().zip(batch.perplexities) {
                if ppl.is_finite() {
                    entries.insert(key(text.as_str()), ppl);
                }
                fresh.insert(text.as_str(), ppl);
            }
        }

        let entries = self.lock();
        let perplexities = texts
            .iter()
            .map(|t| {
                fresh
                    .get(t.as_str())
                    .or_else(|| entries.get(&key(t.as_str())))
                    .copied()
                    .ok_or_else(|| {
                        PplGateError::Scorer("score missing from cache after scoring".to_string())
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ScoreBatch::from_perplexities(perplexities))
    }

    fn name(&self) -> &'static str {
        "cached"
    }
}
