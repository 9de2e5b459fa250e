use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::normalize_vector;

/// Parameters controlling how raw text is turned into TF-IDF features.
///
/// Field names follow the conventional TF-IDF vocabulary so the values persisted in
/// model metadata read naturally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Inclusive range of word n-gram sizes to extract
    pub ngram_range: (usize, usize),
    /// Terms appearing in fewer documents than this are ignored
    pub min_df: usize,
    /// Terms appearing in more than this fraction of documents are ignored
    pub max_df: f32,
    /// Keep only the most frequent terms across the corpus
    pub max_features: Option<usize>,
    pub lowercase: bool,
    /// Replace raw term counts with `1 + ln(count)`
    pub sublinear_tf: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_range: (1, 1),
            min_df: 1,
            max_df: 1.0,
            max_features: None,
            lowercase: true,
            sublinear_tf: false,
        }
    }
}

impl VectorizerConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        let (lo, hi) = self.ngram_range;
        if lo == 0 || lo > hi {
            return Err(ClassifierError::TrainingError(format!(
                "Invalid ngram_range ({}, {})",
                lo, hi
            )));
        }
        if self.min_df == 0 {
            return Err(ClassifierError::TrainingError("min_df must be at least 1".into()));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(ClassifierError::TrainingError(format!(
                "max_df must be in (0, 1], got {}",
                self.max_df
            )));
        }
        if self.max_features == Some(0) {
            return Err(ClassifierError::TrainingError("max_features must be positive".into()));
        }
        Ok(())
    }
}

/// A fitted text-to-vector transform.
///
/// Output vectors have one component per vocabulary term and are L2-normalised, so the
/// dot product of two transformed documents is their cosine similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    config: VectorizerConfig,
    vocabulary: BTreeMap<String, usize>,
    idf: Array1<f32>,
}

impl TfidfVectorizer {
    /// Learns the vocabulary and inverse document frequencies of `documents`.
    ///
    /// # Errors
    /// - `TrainingError` if the config is invalid, `documents` is empty, or no term
    ///   survives the document-frequency pruning
    pub fn fit(documents: &[String], config: &VectorizerConfig) -> Result<Self, ClassifierError> {
        config.validate()?;
        if documents.is_empty() {
            return Err(ClassifierError::TrainingError("Cannot fit vectorizer on empty corpus".into()));
        }

        let n_docs = documents.len();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_count: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let terms = analyze(doc, config);
            let unique: HashSet<&String> = terms.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *term_count.entry(term).or_insert(0) += 1;
            }
        }

        let max_doc_count = config.max_df * n_docs as f32;
        let mut kept: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= config.min_df && (*df as f32) <= max_doc_count)
            .collect();

        if let Some(limit) = config.max_features {
            kept.sort_by(|(a, _), (b, _)| {
                term_count[b].cmp(&term_count[a]).then_with(|| a.cmp(b))
            });
            kept.truncate(limit);
        }
        kept.sort_by(|(a, _), (b, _)| a.cmp(b));

        if kept.is_empty() {
            return Err(ClassifierError::TrainingError(
                "Empty vocabulary; perhaps the documents only contain stop words or min_df/max_df prune every term".into(),
            ));
        }

        let mut vocabulary = BTreeMap::new();
        let mut idf = Array1::zeros(kept.len());
        for (index, (term, df)) in kept.into_iter().enumerate() {
            idf[index] = ((1.0 + n_docs as f32) / (1.0 + df as f32)).ln() + 1.0;
            vocabulary.insert(term, index);
        }

        Ok(Self {
            config: config.clone(),
            vocabulary,
            idf,
        })
    }

    /// Transforms a single document. Terms outside the vocabulary are ignored, so an
    /// entirely unknown document maps to the zero vector.
    pub fn transform(&self, text: &str) -> Array1<f32> {
        let mut tf = Array1::<f32>::zeros(self.vocabulary.len());
        for term in analyze(text, &self.config) {
            if let Some(&index) = self.vocabulary.get(&term) {
                tf[index] += 1.0;
            }
        }
        if self.config.sublinear_tf {
            tf.mapv_inplace(|c| if c > 0.0 { 1.0 + c.ln() } else { 0.0 });
        }
        normalize_vector(&(tf * &self.idf))
    }

    /// Transforms a batch of documents into a `(documents, vocabulary)` matrix.
    pub fn transform_batch(&self, documents: &[String]) -> Array2<f32> {
        let mut features = Array2::zeros((documents.len(), self.vocabulary.len()));
        for (mut row, doc) in features.rows_mut().into_iter().zip(documents) {
            row.assign(&self.transform(doc));
        }
        features
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Checks a deserialized transform: every term owns a distinct slot of the idf
    /// weights and every slot has a term.
    ///
    /// # Errors
    /// - `ArtifactCorrupt` if the vocabulary and the weights disagree or the stored
    ///   config is invalid
    pub fn check_consistency(&self) -> Result<(), ClassifierError> {
        self.config.validate().map_err(|e| {
            ClassifierError::ArtifactCorrupt(format!("Invalid vectorizer config: {}", e))
        })?;
        let dimension = self.idf.len();
        if self.vocabulary.len() != dimension {
            return Err(ClassifierError::ArtifactCorrupt(format!(
                "Vocabulary has {} terms but {} idf weights",
                self.vocabulary.len(),
                dimension
            )));
        }
        let mut seen = vec![false; dimension];
        for (term, &index) in &self.vocabulary {
            if index >= dimension || std::mem::replace(&mut seen[index], true) {
                return Err(ClassifierError::ArtifactCorrupt(format!(
                    "Term {:?} has invalid index {}",
                    term, index
                )));
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }
}

/// Splits text into word tokens (alphanumeric runs of at least two characters) and
/// expands them into the configured n-grams.
fn analyze(text: &str, config: &VectorizerConfig) -> Vec<String> {
    let text = if config.lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .collect();

    let (lo, hi) = config.ngram_range;
    let mut terms = Vec::new();
    for n in lo..=hi {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenization_drops_single_chars_and_punctuation() {
        let terms = analyze("A cheap, CHEAP offer!", &VectorizerConfig::default());
        assert_eq!(terms, vec!["cheap", "cheap", "offer"]);
    }

    #[test]
    fn test_bigrams() {
        let config = VectorizerConfig {
            ngram_range: (1, 2),
            ..Default::default()
        };
        let terms = analyze("buy now today", &config);
        assert_eq!(terms, vec!["buy", "now", "today", "buy now", "now today"]);
    }

    #[test]
    fn test_fit_builds_sorted_vocabulary() -> Result<(), ClassifierError> {
        let vectorizer = TfidfVectorizer::fit(&docs(&["buy now", "cheap offer", "buy cheap"]), &VectorizerConfig::default())?;
        assert_eq!(vectorizer.vocabulary_size(), 4);
        let terms: Vec<&String> = vectorizer.vocabulary.keys().collect();
        assert_eq!(terms, vec!["buy", "cheap", "now", "offer"]);
        Ok(())
    }

    #[test]
    fn test_transform_is_normalized() -> Result<(), ClassifierError> {
        let vectorizer = TfidfVectorizer::fit(&docs(&["buy now", "cheap offer"]), &VectorizerConfig::default())?;
        let v = vectorizer.transform("buy cheap now");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_unknown_text_maps_to_zero() -> Result<(), ClassifierError> {
        let vectorizer = TfidfVectorizer::fit(&docs(&["buy now", "cheap offer"]), &VectorizerConfig::default())?;
        assert!(vectorizer.transform("zzz qqq").iter().all(|&x| x == 0.0));
        Ok(())
    }

    #[test]
    fn test_min_df_prunes_everything() {
        let config = VectorizerConfig {
            min_df: 2,
            ..Default::default()
        };
        let result = TfidfVectorizer::fit(&docs(&["buy now", "cheap offer"]), &config);
        assert!(matches!(result, Err(ClassifierError::TrainingError(_))));
    }

    #[test]
    fn test_max_df_drops_common_terms() -> Result<(), ClassifierError> {
        let config = VectorizerConfig {
            max_df: 0.5,
            ..Default::default()
        };
        let vectorizer = TfidfVectorizer::fit(&docs(&["the offer", "the meeting"]), &config)?;
        assert!(!vectorizer.vocabulary.contains_key("the"));
        assert_eq!(vectorizer.vocabulary_size(), 2);
        Ok(())
    }

    #[test]
    fn test_max_features_keeps_most_frequent() -> Result<(), ClassifierError> {
        let config = VectorizerConfig {
            max_features: Some(1),
            ..Default::default()
        };
        let vectorizer = TfidfVectorizer::fit(&docs(&["spam spam eggs", "spam ham"]), &config)?;
        assert!(vectorizer.vocabulary.contains_key("spam"));
        assert_eq!(vectorizer.vocabulary_size(), 1);
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = VectorizerConfig {
            ngram_range: (2, 1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_transform_batch_shape() -> Result<(), ClassifierError> {
        let corpus = docs(&["buy now", "cheap offer", "meeting at noon"]);
        let vectorizer = TfidfVectorizer::fit(&corpus, &VectorizerConfig::default())?;
        let features = vectorizer.transform_batch(&corpus);
        assert_eq!(features.dim(), (3, vectorizer.vocabulary_size()));
        Ok(())
    }

    #[test]
    fn test_consistency_check() -> Result<(), ClassifierError> {
        let vectorizer = TfidfVectorizer::fit(&docs(&["buy now", "cheap offer"]), &VectorizerConfig::default())?;
        vectorizer.check_consistency()?;

        let mut out_of_range = vectorizer.clone();
        out_of_range.vocabulary.insert("buy".into(), 999);
        assert!(matches!(
            out_of_range.check_consistency(),
            Err(ClassifierError::ArtifactCorrupt(_))
        ));

        let mut extra_term = vectorizer.clone();
        extra_term.vocabulary.insert("zzword".into(), 0);
        assert!(extra_term.check_consistency().is_err());

        let mut shared_slot = vectorizer;
        let first = shared_slot.vocabulary["buy"];
        shared_slot.vocabulary.insert("cheap".into(), first);
        assert!(shared_slot.check_consistency().is_err());
        Ok(())
    }
}
