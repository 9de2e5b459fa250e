use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use log::debug;

use super::error::ClassifierError;
use super::estimator::Estimator;
use super::model::Classifier;
use super::{centroid, logistic, svm, TextClassifier};

/// Builds a fresh, untrained classifier.
pub type Constructor = Arc<dyn Fn() -> Box<dyn TextClassifier> + Send + Sync>;

/// Registry mapping algorithm identifiers to classifier constructors.
///
/// The registry is open: new families (or existing families with different
/// hyperparameters) are added with [`register`](ClassifierFactory::register) at startup,
/// without touching the code that creates or manages classifiers.
///
/// ```rust
/// use tagclass::{ClassifierFactory, SvmClassifier, TextClassifier};
/// use tagclass::svm::SvmEstimator;
///
/// let mut factory = ClassifierFactory::with_builtin();
/// factory.register("svm-strict", || {
///     Box::new(SvmClassifier::with_estimator(SvmEstimator {
///         alpha: 1e-3,
///         ..Default::default()
///     }))
/// });
///
/// let classifier = factory.create("svm-strict").unwrap();
/// assert!(!classifier.is_trained());
/// ```
#[derive(Clone, Default)]
pub struct ClassifierFactory {
    constructors: HashMap<String, Constructor>,
}

impl fmt::Debug for ClassifierFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierFactory")
            .field("types", &self.list_types())
            .finish()
    }
}

impl ClassifierFactory {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in families: `svm`, `logistic` and `centroid`
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register_family::<svm::SvmEstimator>();
        factory.register_family::<logistic::LogisticEstimator>();
        factory.register_family::<centroid::CentroidEstimator>();
        factory
    }

    /// Registers `constructor` under `model_type`, replacing any previous entry
    pub fn register<F>(&mut self, model_type: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn TextClassifier> + Send + Sync + 'static,
    {
        let model_type = model_type.into();
        debug!("Registering classifier type '{}'", model_type);
        self.constructors.insert(model_type, Arc::new(constructor));
    }

    /// Registers an estimator family under its own name with default hyperparameters
    pub fn register_family<E: Estimator>(&mut self) {
        self.register(E::NAME, || Box::new(Classifier::<E>::new()));
    }

    /// Constructs a new untrained classifier of the given type.
    ///
    /// # Errors
    /// - `UnsupportedModelType` if nothing is registered under `model_type`
    pub fn create(&self, model_type: &str) -> Result<Box<dyn TextClassifier>, ClassifierError> {
        let constructor = self.constructors.get(model_type).ok_or_else(|| {
            ClassifierError::UnsupportedModelType {
                requested: model_type.to_string(),
                available: self.list_types().into_iter().collect(),
            }
        })?;
        Ok(constructor())
    }

    pub fn contains(&self, model_type: &str) -> bool {
        self.constructors.contains_key(model_type)
    }

    /// Registered type identifiers
    pub fn list_types(&self) -> BTreeSet<String> {
        self.constructors.keys().cloned().collect()
    }
}
