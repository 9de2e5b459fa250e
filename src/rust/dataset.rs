//! Loader for labelled training data stored as a JSON array of `{ "content", "tag" }`
//! records.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::classifier::ClassifierError;

#[derive(Debug, Clone, Deserialize)]
struct Record {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

/// Documents and their labels, index-aligned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub documents: Vec<String>,
    pub labels: Vec<String>,
}

impl Dataset {
    /// Parses a dataset. Missing or null fields read as empty strings, and records
    /// without a tag are skipped.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        let total = records.len();

        let mut dataset = Dataset::default();
        for record in records {
            let tag = record.tag.unwrap_or_default();
            if tag.is_empty() {
                continue;
            }
            dataset.documents.push(record.content.unwrap_or_default());
            dataset.labels.push(tag);
        }

        let skipped = total - dataset.len();
        if skipped > 0 {
            log::warn!("Skipped {} records without a tag", skipped);
        }
        Ok(dataset)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ClassifierError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Dataset file not found: {}", path.display()),
            )));
        }
        let dataset = Self::from_json(&fs::read_to_string(path)?)?;

        log::info!("Dataset loaded: {} samples", dataset.len());
        for (class, count) in dataset.class_distribution() {
            log::info!("  {}: {}", class, count);
        }
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of samples per label
    pub fn class_distribution(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
