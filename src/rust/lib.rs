//! A text classification core: TF-IDF linear classifiers behind a common trait, and a
//! thread-safe manager that trains, persists, caches and evicts them by model type.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tagclass::{ClassifierFactory, TextClassifier, VectorizerConfig};
//!
//! let documents: Vec<String> = ["win a free cruise", "claim your prize", "lunch at noon?", "notes from the standup"]
//!     .iter().map(|s| s.to_string()).collect();
//! let labels: Vec<String> = ["spam", "spam", "ham", "ham"]
//!     .iter().map(|s| s.to_string()).collect();
//!
//! let factory = ClassifierFactory::with_builtin();
//! let mut classifier = factory.create("svm")?;
//! classifier.train(&documents, &labels, &VectorizerConfig::default())?;
//!
//! let prediction = classifier.predict("claim a free prize")?;
//! println!("Predicted class: {} ({:.2})", prediction.label, prediction.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! # Model Lifecycle
//!
//! [`ModelManager`] persists trained classifiers under a models directory and keeps
//! loaded ones in memory. It is cheap to clone and safe to share across tasks:
//!
//! ```rust
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tagclass::{ModelManager, ModelState, VectorizerConfig};
//!
//! let dir = tempfile::tempdir()?;
//! let manager = ModelManager::new(dir.path())?;
//!
//! let documents = vec!["win a free cruise".to_string(), "lunch at noon?".to_string()];
//! let labels = vec!["spam".to_string(), "ham".to_string()];
//! manager.train("demo", "svm", documents, labels, VectorizerConfig::default()).await?;
//! assert_eq!(manager.status("demo").await, ModelState::Loaded);
//!
//! let mut handles = vec![];
//! for _ in 0..3 {
//!     let manager = manager.clone();
//!     handles.push(tokio::spawn(async move {
//!         let classifier = manager.load("demo", false).await?;
//!         Ok::<_, tagclass::ModelError>(classifier.predict("free cruise")?.label)
//!     }));
//! }
//! for handle in handles {
//!     handle.await??;
//! }
//!
//! assert!(manager.delete("demo").await?);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod model_manager;

pub use artifact::ArtifactStore;
pub use classifier::{centroid, logistic, svm, vectorizer};
pub use classifier::{
    CentroidClassifier, Classifier, ClassifierError, ClassifierFactory, LogisticClassifier,
    Prediction, SvmClassifier, TextClassifier, TrainingMetadata, VectorizerConfig,
};
pub use config::{ConfigError, ServiceConfig};
pub use dataset::Dataset;
pub use model_manager::{ErrorKind, ModelError, ModelManager, ModelState};

pub fn init_logger() {
    env_logger::init();
}
