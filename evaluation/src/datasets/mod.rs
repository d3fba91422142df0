//! Dataset loading and sample extraction for perplexity evaluation.
//!
//! Every method's samples live in a JSON array of instruction-style records,
//! the format shared by the Alpaca and Dolly corpora and by the fingerprint
//! datasets under evaluation.
//!
//! # Record format
//!
//! | Field | Required | Meaning |
//! |-------|----------|---------|
//! | `instruction` | yes | Prompt text |
//! | `input` | no (default `""`) | Optional context appended on a new line |
//! | `output` | no (default `""`) | Reference answer, not scored |

use pplgate_core::{PplGateError, Result, Sample, SampleExtractor};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single instruction-format dataset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// The instruction text.
    pub instruction: String,
    /// Optional input/context for the instruction.
    #[serde(default)]
    pub input: String,
    /// Reference output.
    #[serde(default)]
    pub output: String,
}

impl InstructionRecord {
    /// Text handed to the scorer: `instruction`, plus `"\n" + input` when input is non-empty.
    pub fn to_text(&self) -> String {
        if self.input.is_empty() {
            self.instruction.clone()
        } else {
            format!("{}\n{}", self.instruction, self.input)
        }
    }
}

/// Loads instruction datasets from JSON files.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load a dataset from a JSON file path.
    ///
    /// # Errors
    ///
    /// Returns [`PplGateError::Dataset`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Vec<InstructionRecord>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PplGateError::Dataset(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PplGateError::Dataset(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load from a JSON string directly.
    pub fn load_from_str(json: &str) -> Result<Vec<InstructionRecord>> {
        serde_json::from_str(json)
            .map_err(|e| PplGateError::Dataset(format!("Failed to parse JSON: {e}")))
    }

    /// Texts of the first `count` records (fewer if the dataset is shorter).
    pub fn extract_texts(records: &[InstructionRecord], count: usize) -> Vec<String> {
        records
            .iter()
            .take(count)
            .map(InstructionRecord::to_text)
            .collect()
    }

    /// Label extracted texts with their method and position.
    pub fn to_samples(method: &str, texts: &[String]) -> Vec<Sample> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| Sample::new(method, index, text.as_str()))
            .collect()
    }
}

/// [`SampleExtractor`] reading instruction records from JSON files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDatasetExtractor;

impl SampleExtractor for JsonDatasetExtractor {
    fn extract(&self, source: &Path, count: usize) -> Result<Vec<String>> {
        let records = DatasetLoader::load_from_file(source)?;
        if records.len() < count {
            tracing::debug!(
                path = %source.display(),
                requested = count,
                available = records.len(),
                "dataset shorter than requested sample count"
            );
        }
        Ok(DatasetLoader::extract_texts(&records, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RECORDS: &str = r#"[
        {"instruction": "Give three tips for staying healthy.", "input": "", "output": "Eat well."},
        {"instruction": "Translate the sentence.", "input": "Bonjour le monde", "output": "Hello world"},
        {"instruction": "Name a colour.", "category": "open_qa"}
    ]"#;

    #[test]
    fn test_text_without_input() {
        let records = DatasetLoader::load_from_str(RECORDS).unwrap();
        assert_eq!(records[0].to_text(), "Give three tips for staying healthy.");
    }

    #[test]
    fn test_text_with_input_joins_on_newline() {
        let records = DatasetLoader::load_from_str(RECORDS).unwrap();
        assert_eq!(records[1].to_text(), "Translate the sentence.\nBonjour le monde");
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let records = DatasetLoader::load_from_str(RECORDS).unwrap();
        assert_eq!(records[2].input, "");
        assert_eq!(records[2].output, "");
    }

    #[test]
    fn test_extract_takes_leading_records() {
        let records = DatasetLoader::load_from_str(RECORDS).unwrap();
        let texts = DatasetLoader::extract_texts(&records, 2);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "Give three tips for staying healthy.");
        assert_eq!(DatasetLoader::extract_texts(&records, 50).len(), 3);
    }

    #[test]
    fn test_to_samples_indexes() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let samples = DatasetLoader::to_samples("XSUM", &texts);
        assert_eq!(samples[1], Sample::new("XSUM", 1, "b"));
    }

    #[test]
    fn test_missing_instruction_fails() {
        let err = DatasetLoader::load_from_str(r#"[{"input": "x"}]"#).unwrap_err();
        assert!(matches!(err, PplGateError::Dataset(_)));
    }

    #[test]
    fn test_extractor_reads_file() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(RECORDS.as_bytes()).unwrap();
        let texts = JsonDatasetExtractor.extract(f.path(), 1).unwrap();
        assert_eq!(texts, vec!["Give three tips for staying healthy.".to_string()]);
    }

    #[test]
    fn test_extractor_missing_file() {
        let err = JsonDatasetExtractor
            .extract(Path::new("/nonexistent/dolly.json"), 5)
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dolly.json"));
    }
}
