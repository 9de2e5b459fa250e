use std::collections::{BTreeSet, HashMap};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::artifact::{self, ArtifactStore};
use crate::classifier::{ClassifierError, ClassifierFactory, TextClassifier, TrainingMetadata, VectorizerConfig};

/// Environment variable overriding the default models directory
pub const MODELS_DIR_ENV: &str = "TAGCLASS_MODELS_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("No saved model found for type: {0}")]
    ArtifactNotFound(String),
    #[error("Cannot save untrained model as '{0}'")]
    NotTrained(String),
    #[error("Invalid model type identifier: {0:?}")]
    InvalidModelType(String),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Coarse error categories for request handlers mapping failures to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedModelType,
    ArtifactNotFound,
    ArtifactCorrupt,
    NotTrained,
    InvalidState,
    TrainingError,
    InvalidModelType,
    IoFailure,
    Internal,
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::ArtifactNotFound(_) => ErrorKind::ArtifactNotFound,
            ModelError::NotTrained(_) => ErrorKind::NotTrained,
            ModelError::InvalidModelType(_) => ErrorKind::InvalidModelType,
            ModelError::IoError(_) => ErrorKind::IoFailure,
            ModelError::TaskFailed(_) => ErrorKind::Internal,
            ModelError::Classifier(e) => match e {
                ClassifierError::UnsupportedModelType { .. } => ErrorKind::UnsupportedModelType,
                ClassifierError::InvalidState(_) => ErrorKind::InvalidState,
                ClassifierError::NotTrained(_) => ErrorKind::NotTrained,
                ClassifierError::TrainingError(_) => ErrorKind::TrainingError,
                ClassifierError::ArtifactNotFound(_) => ErrorKind::ArtifactNotFound,
                ClassifierError::ArtifactCorrupt(_) | ClassifierError::SerializationError(_) => {
                    ErrorKind::ArtifactCorrupt
                }
                ClassifierError::IoError(_) => ErrorKind::IoFailure,
            },
        }
    }
}

/// Where a model type currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Neither cached nor persisted
    Absent,
    /// A complete artifact exists but nothing is cached
    Persisted,
    /// A trained instance is cached in memory
    Loaded,
}

type Cache = HashMap<String, Arc<dyn TextClassifier>>;
type KeyLocks = HashMap<String, Arc<Mutex<()>>>;

/// Exclusive access to one model type. Dropping it releases the lock and removes the
/// lock from the registry once nobody else holds or waits for it.
struct KeyGuard {
    locks: Arc<StdMutex<KeyLocks>>,
    key: String,
    lock: Option<Arc<Mutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // References are only given up while the registry is locked
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.guard.take();
        if let Some(lock) = self.lock.take() {
            let idle = Arc::strong_count(&lock) == 2
                && locks.get(&self.key).is_some_and(|l| Arc::ptr_eq(l, &lock));
            drop(lock);
            if idle {
                locks.remove(&self.key);
            }
        }
    }
}

/// Owns the in-memory cache of trained classifiers and the on-disk artifacts they are
/// loaded from.
///
/// Clones share the same cache and locks. Cache hits only take a shared read lock, so
/// predictions on loaded models never wait for a load, save or train of another model.
/// Operations that change what is stored for a model type run one at a time per type.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), tagclass::ModelError> {
/// use tagclass::{ModelManager, VectorizerConfig};
///
/// let manager = ModelManager::new_default()?;
/// let documents = vec!["win a prize".to_string(), "lunch at noon".to_string()];
/// let labels = vec!["spam".to_string(), "ham".to_string()];
/// manager.train("demo", "svm", documents, labels, VectorizerConfig::default()).await?;
///
/// let classifier = manager.load("demo", false).await?;
/// let prediction = classifier.predict("claim your prize")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ModelManager {
    store: ArtifactStore,
    factory: Arc<ClassifierFactory>,
    cache: Arc<RwLock<Cache>>,
    key_locks: Arc<StdMutex<KeyLocks>>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<ModelManager>();
    }
};

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(MODELS_DIR_ENV) {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("tagclass").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("tagclass").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("tagclass").join("models")
    }

    /// Creates a manager over `models_dir` with the built-in classifier families
    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        Self::with_factory(models_dir, ClassifierFactory::with_builtin())
    }

    pub fn with_factory<P: AsRef<Path>>(models_dir: P, factory: ClassifierFactory) -> io::Result<Self> {
        let store = ArtifactStore::new(models_dir)?;
        log::info!("Model manager using {:?}", store.root());
        Ok(Self {
            store,
            factory: Arc::new(factory),
            cache: Arc::new(RwLock::new(HashMap::new())),
            key_locks: Arc::new(StdMutex::new(HashMap::new())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        self.store.root()
    }

    pub fn factory(&self) -> &ClassifierFactory {
        &self.factory
    }

    fn check_model_type(model_type: &str) -> Result<(), ModelError> {
        if artifact::is_valid_model_type(model_type) {
            Ok(())
        } else {
            Err(ModelError::InvalidModelType(model_type.to_string()))
        }
    }

    /// Lock guarding every mutation of one model type's artifact and cache entry
    async fn lock_key(&self, model_type: &str) -> KeyGuard {
        let lock = {
            let mut locks = self
                .key_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(model_type.to_string()).or_default())
        };
        let mut key_guard = KeyGuard {
            locks: Arc::clone(&self.key_locks),
            key: model_type.to_string(),
            lock: Some(Arc::clone(&lock)),
            guard: None,
        };
        key_guard.guard = Some(lock.lock_owned().await);
        key_guard
    }

    /// Reads the metadata document of a complete artifact on a blocking worker.
    async fn read_metadata(&self, model_type: &str) -> Result<TrainingMetadata, ModelError> {
        let store = self.store.clone();
        let key = model_type.to_string();
        tokio::task::spawn_blocking(move || {
            if !store.exists(&key) {
                return Err(ModelError::ArtifactNotFound(key));
            }
            Ok(store.read_metadata(&key)?)
        })
        .await?
    }

    async fn cached(&self, model_type: &str) -> Option<Arc<dyn TextClassifier>> {
        self.cache.read().await.get(model_type).cloned()
    }

    /// Whether a complete artifact for `model_type` exists on disk.
    pub fn is_available(&self, model_type: &str) -> bool {
        self.store.exists(model_type)
    }

    pub async fn is_loaded(&self, model_type: &str) -> bool {
        self.cache.read().await.contains_key(model_type)
    }

    /// Model types currently cached in memory
    pub async fn loaded_models(&self) -> BTreeSet<String> {
        self.cache.read().await.keys().cloned().collect()
    }

    pub async fn status(&self, model_type: &str) -> ModelState {
        if self.is_loaded(model_type).await {
            ModelState::Loaded
        } else if self.is_available(model_type) {
            ModelState::Persisted
        } else {
            ModelState::Absent
        }
    }

    /// Returns the trained classifier for `model_type`, loading it from disk on a cache
    /// miss. With `force_reload` the artifact is read again and replaces the cached
    /// instance; holders of the old instance keep using it.
    ///
    /// # Errors
    /// - `ArtifactNotFound` if nothing is persisted under `model_type`
    /// - `Classifier` if the artifact is corrupt or its family is not registered
    pub async fn load(
        &self,
        model_type: &str,
        force_reload: bool,
    ) -> Result<Arc<dyn TextClassifier>, ModelError> {
        Self::check_model_type(model_type)?;
        if !force_reload {
            if let Some(classifier) = self.cached(model_type).await {
                return Ok(classifier);
            }
        }

        let _guard = self.lock_key(model_type).await;

        // Another task may have loaded it while we waited
        if !force_reload {
            if let Some(classifier) = self.cached(model_type).await {
                log::debug!("Model '{}' was loaded concurrently", model_type);
                return Ok(classifier);
            }
        }

        let metadata = self.read_metadata(model_type).await?;
        let mut classifier = self.factory.create(&metadata.algorithm)?;
        let location = self.store.location(model_type);
        log::info!(
            "Loading model '{}' ({}) from {:?}",
            model_type,
            metadata.algorithm,
            location
        );

        let classifier = tokio::task::spawn_blocking(move || -> Result<_, ClassifierError> {
            classifier.load(&location)?;
            Ok(classifier)
        })
        .await??;

        let classifier: Arc<dyn TextClassifier> = Arc::from(classifier);
        self.cache
            .write()
            .await
            .insert(model_type.to_string(), Arc::clone(&classifier));
        Ok(classifier)
    }

    /// Persists `classifier` under `model_type`, replacing any previous artifact, and
    /// caches it. Returns the artifact location.
    ///
    /// # Errors
    /// - `NotTrained` if the classifier has not been trained; nothing is written
    pub async fn save(
        &self,
        classifier: Arc<dyn TextClassifier>,
        model_type: &str,
    ) -> Result<PathBuf, ModelError> {
        Self::check_model_type(model_type)?;
        if !classifier.is_trained() {
            return Err(ModelError::NotTrained(model_type.to_string()));
        }

        let _guard = self.lock_key(model_type).await;
        self.save_locked(classifier, model_type).await
    }

    // Caller holds the key lock for `model_type`
    async fn save_locked(
        &self,
        classifier: Arc<dyn TextClassifier>,
        model_type: &str,
    ) -> Result<PathBuf, ModelError> {
        let location = self.store.location(model_type);
        let writer = Arc::clone(&classifier);
        let target = location.clone();
        tokio::task::spawn_blocking(move || writer.save(&target)).await??;

        self.cache
            .write()
            .await
            .insert(model_type.to_string(), classifier);
        log::info!("Model '{}' saved to {:?}", model_type, location);
        Ok(location)
    }

    /// Trains a new `algorithm` classifier, persists it under `model_type` and caches it.
    ///
    /// On failure the previously stored and cached model for `model_type`, if any, is
    /// left untouched.
    pub async fn train(
        &self,
        model_type: &str,
        algorithm: &str,
        documents: Vec<String>,
        labels: Vec<String>,
        config: VectorizerConfig,
    ) -> Result<TrainingMetadata, ModelError> {
        Self::check_model_type(model_type)?;
        let mut classifier = self.factory.create(algorithm)?;

        let _guard = self.lock_key(model_type).await;

        log::info!(
            "Training model '{}' with {} on {} documents",
            model_type,
            algorithm,
            documents.len()
        );
        let (classifier, metadata) = tokio::task::spawn_blocking(move || {
            let metadata = classifier.train(&documents, &labels, &config)?;
            Ok::<_, ClassifierError>((classifier, metadata))
        })
        .await??;

        self.save_locked(Arc::from(classifier), model_type).await?;
        Ok(metadata)
    }

    /// Removes `model_type` from disk and from the cache. Returns true if anything was
    /// removed; deleting an unknown type is not an error.
    pub async fn delete(&self, model_type: &str) -> Result<bool, ModelError> {
        if !artifact::is_valid_model_type(model_type) {
            return Ok(false);
        }

        let _guard = self.lock_key(model_type).await;

        let store = self.store.clone();
        let key = model_type.to_string();
        let removed = tokio::task::spawn_blocking(move || store.delete(&key)).await??;
        let evicted = self.cache.write().await.remove(model_type).is_some();
        if removed || evicted {
            log::info!("Deleted model '{}'", model_type);
        }
        Ok(removed || evicted)
    }

    /// Metadata of `model_type`, from the cached instance if there is one and from the
    /// artifact otherwise. Never loads the model into the cache.
    pub async fn get_model_info(&self, model_type: &str) -> Result<TrainingMetadata, ModelError> {
        Self::check_model_type(model_type)?;
        if let Some(classifier) = self.cached(model_type).await {
            if let Some(metadata) = classifier.metadata() {
                return Ok(metadata.clone());
            }
        }

        self.read_metadata(model_type).await
    }

    /// Model types with a complete artifact on disk
    pub async fn list_available(&self) -> Result<BTreeSet<String>, ModelError> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.list()).await??)
    }
}
