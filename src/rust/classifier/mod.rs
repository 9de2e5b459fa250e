use std::fmt::Debug;
use std::path::Path;

use serde::{Deserialize, Serialize};

mod error;
mod estimator;
mod model;
mod utils;
pub mod centroid;
pub mod factory;
pub mod logistic;
pub mod svm;
pub mod vectorizer;

pub use error::ClassifierError;
pub use estimator::{Decision, DecisionModel, Estimator, LinearModel};
pub use factory::{ClassifierFactory, Constructor};
pub use model::Classifier;
pub use vectorizer::{TfidfVectorizer, VectorizerConfig};

/// Classifier using the linear SVM family
pub type SvmClassifier = Classifier<svm::SvmEstimator>;
/// Classifier using the multinomial logistic regression family
pub type LogisticClassifier = Classifier<logistic::LogisticEstimator>;
/// Classifier using the nearest-centroid family
pub type CentroidClassifier = Classifier<centroid::CentroidEstimator>;

/// The outcome of classifying one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The predicted class label
    #[serde(rename = "tagClass")]
    pub label: String,
    /// Confidence in the predicted label, between 0.0 and 1.0
    #[serde(rename = "score")]
    pub confidence: f32,
    /// Algorithm family that produced the prediction
    pub model_used: String,
}

/// Descriptive statistics produced when a classifier is trained and persisted with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Algorithm family, as registered with the [`ClassifierFactory`]
    pub algorithm: String,
    /// Number of documents the classifier was trained on
    pub training_samples: usize,
    pub num_classes: usize,
    /// Sorted class labels
    pub classes: Vec<String>,
    /// Accuracy measured on the training set itself. This is a sanity check, not an
    /// estimate of performance on unseen text.
    pub accuracy: f32,
    /// Number of terms in the fitted TF-IDF vocabulary
    pub vocabulary_size: usize,
    pub vectorizer_params: VectorizerConfig,
    /// Effective hyperparameters of the decision model
    pub model_params: serde_json::Value,
    /// Unix timestamp (seconds) of the end of training
    pub trained_at: u64,
}

/// The capability set every algorithm family provides: train, predict, save and load.
///
/// Instances start untrained. A successful [`train`](TextClassifier::train) or
/// [`load`](TextClassifier::load) makes them trained, and they stay trained for the rest
/// of their life; failed calls leave the instance exactly as it was.
///
/// Prediction takes `&self`, so a trained classifier can be shared across threads behind
/// an `Arc` and queried concurrently.
pub trait TextClassifier: Debug + Send + Sync {
    /// Identifier of the algorithm family (the factory key)
    fn algorithm(&self) -> &str;

    fn is_trained(&self) -> bool;

    /// Metadata of the trained model, `None` while untrained
    fn metadata(&self) -> Option<&TrainingMetadata>;

    /// Fits the feature transform and decision model on `documents` and `labels`.
    ///
    /// # Errors
    /// - `TrainingError` if the inputs are empty or of different lengths, if fewer than
    ///   two distinct labels are present, or if the underlying fit fails
    fn train(
        &mut self,
        documents: &[String],
        labels: &[String],
        config: &VectorizerConfig,
    ) -> Result<TrainingMetadata, ClassifierError>;

    /// Predicts the label of `text` with a confidence in `[0, 1]`.
    ///
    /// # Errors
    /// - `InvalidState` if the classifier has not been trained or loaded
    fn predict(&self, text: &str) -> Result<Prediction, ClassifierError>;

    fn predict_batch(&self, texts: &[String]) -> Result<Vec<Prediction>, ClassifierError> {
        texts.iter().map(|text| self.predict(text)).collect()
    }

    /// Writes the decision model, feature transform and metadata to `location`,
    /// replacing any artifact already there as a single unit.
    ///
    /// # Errors
    /// - `NotTrained` if the classifier has not been trained or loaded
    /// - `IoError` / `SerializationError` if writing fails
    fn save(&self, location: &Path) -> Result<(), ClassifierError>;

    /// Restores a previously saved classifier from `location`.
    ///
    /// # Errors
    /// - `ArtifactNotFound` if any of the three parts is missing
    /// - `ArtifactCorrupt` if a part fails its checksum or belongs to another family
    fn load(&mut self, location: &Path) -> Result<(), ClassifierError>;
}
