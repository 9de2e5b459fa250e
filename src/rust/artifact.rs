//! Durable storage of trained classifiers.
//!
//! Every artifact is a directory named after its model type holding three parts: the
//! serialized decision model, the serialized feature transform and a metadata document.
//! An artifact only counts as present when all three parts exist.
//!
//! Writes never modify a live artifact directory in place. The parts are written into a
//! hidden staging directory next to the target and then swapped in with renames, so a
//! concurrent reader sees either the complete old artifact, the complete new one, or (for
//! the instant between the two renames) no artifact at all.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::{ClassifierError, TrainingMetadata};

pub const MODEL_FILE: &str = "model.json";
pub const TRANSFORM_FILE: &str = "vectorizer.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const ARTIFACT_PARTS: [&str; 3] = [MODEL_FILE, TRANSFORM_FILE, METADATA_FILE];

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The persisted metadata document: training metadata plus checksums of the other parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MetadataDocument {
    #[serde(flatten)]
    pub metadata: TrainingMetadata,
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

impl MetadataDocument {
    pub fn new(metadata: TrainingMetadata, parts: &[(&str, &[u8])]) -> Self {
        let checksums = parts
            .iter()
            .map(|(name, bytes)| (name.to_string(), sha256_hex(bytes)))
            .collect();
        Self { metadata, checksums }
    }

    /// Checks `bytes` against the recorded checksum for `part`. A part without a recorded
    /// checksum is as corrupt as one that does not match.
    pub fn verify(&self, part: &str, bytes: &[u8]) -> Result<(), ClassifierError> {
        let expected = self.checksums.get(part).ok_or_else(|| {
            ClassifierError::ArtifactCorrupt(format!("No checksum recorded for {}", part))
        })?;
        let actual = sha256_hex(bytes);
        if &actual != expected {
            return Err(ClassifierError::ArtifactCorrupt(format!(
                "Hash mismatch for {}: expected {}, got {}",
                part, expected, actual
            )));
        }
        Ok(())
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Returns true when every part of the artifact at `location` exists.
pub fn is_complete(location: &Path) -> bool {
    ARTIFACT_PARTS.iter().all(|part| location.join(part).is_file())
}

/// Reads one part, reporting a missing file as `ArtifactNotFound`.
pub fn read_part(location: &Path, part: &str) -> Result<Vec<u8>, ClassifierError> {
    let path = location.join(part);
    fs::read(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ClassifierError::ArtifactNotFound(path)
        } else {
            ClassifierError::IoError(e)
        }
    })
}

/// Replaces the artifact at `location` with `parts` as a single unit.
pub fn write_parts(location: &Path, parts: &[(&str, &[u8])]) -> io::Result<()> {
    let parent = location.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Artifact location has no parent directory")
    })?;
    let name = location
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Artifact location has no name"))?;
    fs::create_dir_all(parent)?;

    let nonce = format!(
        "{}-{}",
        std::process::id(),
        STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let staging = parent.join(format!(".{}.staging-{}", name, nonce));
    let retired = parent.join(format!(".{}.retired-{}", name, nonce));

    debug!("Staging artifact parts in {:?}", staging);
    if let Err(e) = stage_parts(&staging, parts) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    let had_previous = location.exists();
    if had_previous {
        if let Err(e) = fs::rename(location, &retired) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    }

    if let Err(e) = fs::rename(&staging, location) {
        if had_previous {
            let _ = fs::rename(&retired, location);
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    if had_previous {
        if let Err(e) = fs::remove_dir_all(&retired) {
            warn!("Failed to remove retired artifact {:?}: {}", retired, e);
        }
    }
    Ok(())
}

fn stage_parts(staging: &Path, parts: &[(&str, &[u8])]) -> io::Result<()> {
    fs::create_dir(staging)?;
    for (part, bytes) in parts {
        let mut file = File::create(staging.join(part))?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    Ok(())
}

/// Model types double as directory names, so they are restricted to a safe alphabet.
pub fn is_valid_model_type(model_type: &str) -> bool {
    !model_type.is_empty()
        && !model_type.starts_with('.')
        && model_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Maps model types to artifact directories under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location(&self, model_type: &str) -> PathBuf {
        self.root.join(model_type)
    }

    /// True iff all three parts exist. Nothing is deserialized.
    pub fn exists(&self, model_type: &str) -> bool {
        is_valid_model_type(model_type) && is_complete(&self.location(model_type))
    }

    /// Reads the metadata document of a complete artifact without loading the model.
    pub fn read_metadata(&self, model_type: &str) -> Result<TrainingMetadata, ClassifierError> {
        let location = self.location(model_type);
        if !self.exists(model_type) {
            return Err(ClassifierError::ArtifactNotFound(location));
        }
        let bytes = read_part(&location, METADATA_FILE)?;
        let document: MetadataDocument = serde_json::from_slice(&bytes)?;
        Ok(document.metadata)
    }

    /// Removes the artifact directory and everything in it. Returns false when there
    /// was nothing to remove.
    ///
    /// The directory is first renamed to a hidden tombstone, so the artifact disappears
    /// as a whole even if removing the files afterwards fails part way.
    pub fn delete(&self, model_type: &str) -> io::Result<bool> {
        if !is_valid_model_type(model_type) {
            return Ok(false);
        }
        let location = self.location(model_type);
        let tombstone = self.root.join(format!(
            ".{}.deleted-{}-{}",
            model_type,
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        match fs::rename(&location, &tombstone) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        }
        if let Err(e) = fs::remove_dir_all(&tombstone) {
            warn!("Failed to remove deleted artifact {:?}: {}", tombstone, e);
        }
        Ok(true)
    }

    /// Model types whose artifacts are complete. Staging and retired directories are
    /// hidden and never listed.
    pub fn list(&self) -> io::Result<BTreeSet<String>> {
        let mut available = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_valid_model_type(name) && is_complete(&entry.path()) {
                    available.insert(name.to_string());
                }
            }
        }
        Ok(available)
    }
}
