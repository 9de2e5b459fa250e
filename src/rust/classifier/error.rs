use std::fmt;
use std::io;
use std::path::PathBuf;

/// Represents the different types of errors that can occur in a text classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// The requested algorithm family is not registered with the factory
    UnsupportedModelType {
        requested: String,
        available: Vec<String>,
    },
    /// Prediction was attempted on a classifier that has not been trained or loaded
    InvalidState(String),
    /// Saving was attempted on a classifier that has not been trained or loaded
    NotTrained(String),
    /// The training data was malformed or degenerate
    TrainingError(String),
    /// One or more parts of a persisted artifact are missing
    ArtifactNotFound(PathBuf),
    /// A persisted artifact exists but its parts do not match their recorded checksums
    ArtifactCorrupt(String),
    /// Reading or writing durable storage failed
    IoError(io::Error),
    /// A persisted part could not be encoded or decoded
    SerializationError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedModelType { requested, available } => write!(
                f,
                "Unsupported model type: {}. Available models: {:?}",
                requested, available
            ),
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Self::NotTrained(msg) => write!(f, "Model not trained: {}", msg),
            Self::TrainingError(msg) => write!(f, "Training error: {}", msg),
            Self::ArtifactNotFound(path) => write!(f, "Artifact not found: {}", path.display()),
            Self::ArtifactCorrupt(msg) => write!(f, "Artifact corrupt: {}", msg),
            Self::IoError(err) => write!(f, "IO error: {}", err),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ClassifierError {
    fn from(err: io::Error) -> Self {
        ClassifierError::IoError(err)
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::SerializationError(err.to_string())
    }
}
