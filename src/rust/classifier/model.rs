use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::estimator::{DecisionModel, Estimator};
use super::vectorizer::{TfidfVectorizer, VectorizerConfig};
use super::{Prediction, TextClassifier, TrainingMetadata};
use crate::artifact::{
    self, MetadataDocument, ARTIFACT_PARTS, METADATA_FILE, MODEL_FILE, TRANSFORM_FILE,
};

/// A TF-IDF text classifier backed by the algorithm family `E`.
///
/// The fitted transform, decision model and metadata are held together in a single
/// optional field, so a classifier is either completely untrained or completely usable.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use tagclass::{SvmClassifier, TextClassifier, VectorizerConfig};
///
/// let documents: Vec<String> = ["buy now", "cheap offer", "meeting at noon", "project deadline"]
///     .iter().map(|s| s.to_string()).collect();
/// let labels: Vec<String> = ["spam", "spam", "ham", "ham"]
///     .iter().map(|s| s.to_string()).collect();
///
/// let mut classifier = SvmClassifier::new();
/// classifier.train(&documents, &labels, &VectorizerConfig::default())?;
///
/// let prediction = classifier.predict("cheap offer today")?;
/// println!("{} ({:.2})", prediction.label, prediction.confidence);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Classifier<E: Estimator> {
    estimator: E,
    fitted: Option<Fitted<E::Model>>,
}

#[derive(Debug)]
struct Fitted<M> {
    vectorizer: TfidfVectorizer,
    model: M,
    classes: Vec<String>,
    metadata: TrainingMetadata,
}

#[derive(Serialize)]
struct ModelPartRef<'a, M> {
    classes: &'a [String],
    model: &'a M,
}

#[derive(Deserialize)]
struct ModelPart<M> {
    classes: Vec<String>,
    model: M,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<super::SvmClassifier>();
        assert_send_sync::<super::LogisticClassifier>();
        assert_send_sync::<super::CentroidClassifier>();
    }
};

impl<E: Estimator> Default for Classifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Estimator> Classifier<E> {
    /// Creates an untrained classifier with the family's default hyperparameters
    pub fn new() -> Self {
        Self::with_estimator(E::default())
    }

    /// Creates an untrained classifier with custom hyperparameters
    pub fn with_estimator(estimator: E) -> Self {
        Self {
            estimator,
            fitted: None,
        }
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    fn fitted(&self) -> Option<&Fitted<E::Model>> {
        self.fitted.as_ref()
    }
}

/// Validates the training inputs and maps labels to indices into the sorted label set.
fn encode_labels(
    documents: &[String],
    labels: &[String],
) -> Result<(Vec<String>, Vec<usize>), ClassifierError> {
    if documents.is_empty() {
        return Err(ClassifierError::TrainingError("Training data cannot be empty".into()));
    }
    if documents.len() != labels.len() {
        return Err(ClassifierError::TrainingError(format!(
            "Found input variables with inconsistent numbers of samples: {} documents, {} labels",
            documents.len(),
            labels.len()
        )));
    }

    let classes: Vec<String> = labels
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if classes.len() < 2 {
        return Err(ClassifierError::TrainingError(format!(
            "The number of classes has to be greater than one; got {} class",
            classes.len()
        )));
    }

    let index: HashMap<&str, usize> = classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let targets = labels.iter().map(|l| index[l.as_str()]).collect();
    Ok((classes, targets))
}

/// Cross-checks the separately stored parts of an artifact against its metadata.
fn check_parts_agree(
    classes: &[String],
    vectorizer: &TfidfVectorizer,
    metadata: &TrainingMetadata,
) -> Result<(), ClassifierError> {
    if classes.len() < 2 || classes != metadata.classes.as_slice() || metadata.num_classes != classes.len() {
        return Err(ClassifierError::ArtifactCorrupt(format!(
            "Model classes {:?} disagree with metadata classes {:?}",
            classes, metadata.classes
        )));
    }
    if metadata.vocabulary_size != vectorizer.vocabulary_size() {
        return Err(ClassifierError::ArtifactCorrupt(format!(
            "Vectorizer has {} terms, metadata records {}",
            vectorizer.vocabulary_size(),
            metadata.vocabulary_size
        )));
    }
    Ok(())
}

fn training_accuracy<M: DecisionModel>(model: &M, features: &Array2<f32>, targets: &[usize]) -> f32 {
    let correct = features
        .rows()
        .into_iter()
        .zip(targets)
        .filter(|(row, &target)| model.decide(row.view()).resolve().map(|(c, _)| c) == Some(target))
        .count();
    correct as f32 / targets.len() as f32
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl<E: Estimator> TextClassifier for Classifier<E> {
    fn algorithm(&self) -> &str {
        E::NAME
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn metadata(&self) -> Option<&TrainingMetadata> {
        self.fitted().map(|f| &f.metadata)
    }

    fn train(
        &mut self,
        documents: &[String],
        labels: &[String],
        config: &VectorizerConfig,
    ) -> Result<TrainingMetadata, ClassifierError> {
        let (classes, targets) = encode_labels(documents, labels)?;
        info!(
            "Training {} classifier on {} samples, {} classes",
            E::NAME,
            documents.len(),
            classes.len()
        );

        let vectorizer = TfidfVectorizer::fit(documents, config)?;
        let features = vectorizer.transform_batch(documents);
        debug!("Feature matrix shape: {:?}", features.dim());

        let model = self.estimator.fit(&features, &targets, classes.len())?;
        let accuracy = training_accuracy(&model, &features, &targets);

        let metadata = TrainingMetadata {
            algorithm: E::NAME.to_string(),
            training_samples: documents.len(),
            num_classes: classes.len(),
            classes: classes.clone(),
            accuracy,
            vocabulary_size: vectorizer.vocabulary_size(),
            vectorizer_params: config.clone(),
            model_params: self.estimator.params(),
            trained_at: unix_now(),
        };
        info!("Training completed. Training-set accuracy: {:.3}", accuracy);

        self.fitted = Some(Fitted {
            vectorizer,
            model,
            classes,
            metadata: metadata.clone(),
        });
        Ok(metadata)
    }

    fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let fitted = self.fitted().ok_or_else(|| {
            ClassifierError::InvalidState("Model must be trained before making predictions".into())
        })?;

        let features = fitted.vectorizer.transform(text);
        let (index, confidence) = fitted
            .model
            .decide(features.view())
            .resolve()
            .ok_or_else(|| ClassifierError::InvalidState("Decision model produced no scores".into()))?;
        let label = fitted.classes.get(index).cloned().ok_or_else(|| {
            ClassifierError::InvalidState(format!(
                "Decision model chose class {} but only {} classes are known",
                index,
                fitted.classes.len()
            ))
        })?;

        Ok(Prediction {
            label,
            confidence,
            model_used: E::NAME.to_string(),
        })
    }

    fn save(&self, location: &Path) -> Result<(), ClassifierError> {
        let fitted = self.fitted().ok_or_else(|| {
            ClassifierError::NotTrained(format!("{} model must be trained before saving", E::NAME))
        })?;

        let model_bytes = serde_json::to_vec(&ModelPartRef {
            classes: &fitted.classes,
            model: &fitted.model,
        })?;
        let transform_bytes = serde_json::to_vec(&fitted.vectorizer)?;
        let document = MetadataDocument::new(
            fitted.metadata.clone(),
            &[
                (MODEL_FILE, model_bytes.as_slice()),
                (TRANSFORM_FILE, transform_bytes.as_slice()),
            ],
        );
        let metadata_bytes = serde_json::to_vec_pretty(&document)?;

        artifact::write_parts(
            location,
            &[
                (MODEL_FILE, model_bytes.as_slice()),
                (TRANSFORM_FILE, transform_bytes.as_slice()),
                (METADATA_FILE, metadata_bytes.as_slice()),
            ],
        )?;
        info!("Model saved to {:?}", location);
        Ok(())
    }

    fn load(&mut self, location: &Path) -> Result<(), ClassifierError> {
        if let Some(missing) = ARTIFACT_PARTS
            .iter()
            .map(|part| location.join(part))
            .find(|path| !path.is_file())
        {
            return Err(ClassifierError::ArtifactNotFound(missing));
        }

        let model_bytes = artifact::read_part(location, MODEL_FILE)?;
        let transform_bytes = artifact::read_part(location, TRANSFORM_FILE)?;
        let metadata_bytes = artifact::read_part(location, METADATA_FILE)?;

        let document: MetadataDocument = serde_json::from_slice(&metadata_bytes)?;
        document.verify(MODEL_FILE, &model_bytes)?;
        document.verify(TRANSFORM_FILE, &transform_bytes)?;
        if document.metadata.algorithm != E::NAME {
            return Err(ClassifierError::ArtifactCorrupt(format!(
                "Artifact at {:?} was trained with '{}', cannot load it as '{}'",
                location,
                document.metadata.algorithm,
                E::NAME
            )));
        }

        let part: ModelPart<E::Model> = serde_json::from_slice(&model_bytes)?;
        let vectorizer: TfidfVectorizer = serde_json::from_slice(&transform_bytes)?;
        check_parts_agree(&part.classes, &vectorizer, &document.metadata)?;
        vectorizer.check_consistency()?;
        part.model.check_shape(part.classes.len(), vectorizer.vocabulary_size())?;

        self.fitted = Some(Fitted {
            vectorizer,
            model: part.model,
            classes: part.classes,
            metadata: document.metadata,
        });
        info!("Model loaded from {:?}", location);
        Ok(())
    }
}
