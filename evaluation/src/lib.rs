//! pplgate evaluation harness
//!
//! Measures how natural the fingerprint texts of several fingerprinting
//! methods look to a language model. Each method's samples are scored for
//! perplexity, an acceptance threshold is derived from two natural-language
//! baseline corpora, and the share of each method's samples at or below the
//! threshold is reported.
//!
//! # Modules
//!
//! - [`datasets`]: instruction-record dataset loading and sample extraction
//! - [`scorer`]: HTTP scoring client and score cache
//! - [`aggregator`]: per-method results and descriptive statistics
//! - [`threshold`]: threshold policies over the two baselines
//! - [`retention`]: per-method retention filter
//! - [`runners`]: evaluation orchestration
//! - [`report`]: console report, JSON results and histogram
//! - [`config`]: YAML configuration loading

pub mod aggregator;
pub mod config;
pub mod datasets;
pub mod report;
pub mod retention;
pub mod runners;
pub mod scorer;
pub mod threshold;

/// Re-export commonly used types for embedding the evaluation in other tools.
pub mod prelude {
    pub use crate::aggregator::{self, PerplexityStats};
    pub use crate::config::load_config;
    pub use crate::datasets::{DatasetLoader, InstructionRecord, JsonDatasetExtractor};
    pub use crate::report::histogram::{render_histogram, HistogramOptions};
    pub use crate::report::{print_report, save_run, summary_lines, write_outputs};
    pub use crate::retention;
    pub use crate::runners::EvaluationRunner;
    pub use crate::scorer::{CachedScorer, HttpPerplexityScorer};
    pub use crate::threshold::{
        compute_threshold, policy_from_config, BaselineMeanPolicy, PooledPercentilePolicy,
    };
    pub use pplgate_core::{EvalConfig, EvaluationRun, PplGateError};
}
