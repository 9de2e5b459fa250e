//! Service configuration: defaults, an optional JSON file, then environment overrides.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierError, VectorizerConfig};
use crate::model_manager::{ModelManager, MODELS_DIR_ENV};

/// Environment variable overriding the default training algorithm
pub const ALGORITHM_ENV: &str = "TAGCLASS_ALGORITHM";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Per-algorithm training settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Feature transform settings used when training this algorithm
    #[serde(default)]
    pub vectorizer: Option<VectorizerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Artifact root; falls back to [`ModelManager::get_default_models_dir`]
    pub models_dir: Option<PathBuf>,
    /// Algorithm used by `train` when none is given
    pub default_algorithm: String,
    /// Feature transform settings for algorithms without their own entry
    pub vectorizer: VectorizerConfig,
    /// Per-algorithm overrides. A file that sets this table replaces the built-in one.
    pub algorithms: BTreeMap<String, AlgorithmConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        // Word unigrams and bigrams, ignoring terms that are rare or nearly everywhere
        let svm = AlgorithmConfig {
            vectorizer: Some(VectorizerConfig {
                ngram_range: (1, 2),
                min_df: 2,
                max_df: 0.9,
                ..Default::default()
            }),
        };
        Self {
            models_dir: None,
            default_algorithm: "svm".to_string(),
            vectorizer: VectorizerConfig::default(),
            algorithms: BTreeMap::from([("svm".to_string(), svm)]),
        }
    }
}

impl ServiceConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Builds the effective configuration: `path` (or the defaults), then environment
    /// overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading configuration from {:?}", path);
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(dir) = env::var(MODELS_DIR_ENV) {
            self.models_dir = Some(PathBuf::from(dir));
        }
        if let Ok(algorithm) = env::var(ALGORITHM_ENV) {
            self.default_algorithm = algorithm;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_algorithm.trim().is_empty() {
            return Err(ConfigError::Invalid("default_algorithm cannot be empty".into()));
        }
        let invalid = |e: ClassifierError| ConfigError::Invalid(e.to_string());
        self.vectorizer.validate().map_err(invalid)?;
        for (name, algorithm) in &self.algorithms {
            if let Some(vectorizer) = &algorithm.vectorizer {
                vectorizer
                    .validate()
                    .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))?;
            }
        }
        Ok(())
    }

    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(ModelManager::get_default_models_dir)
    }

    /// Feature transform settings for training `algorithm`
    pub fn vectorizer_for(&self, algorithm: &str) -> VectorizerConfig {
        self.algorithms
            .get(algorithm)
            .and_then(|a| a.vectorizer.clone())
            .unwrap_or_else(|| self.vectorizer.clone())
    }
}
