//! Durable storage for fitted models
//!
//! Every artifact is an independent file holding a bincode envelope
//! `{ kind, sha256(payload), payload }`. Files are replaced atomically
//! (temp file, fsync, rename) so a reader sees either the previous artifact
//! or the new one, never a partial write.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use strum::{Display, EnumIter};
use tracing::{debug, error, info};

use crate::forecast::ForecastError;

/// Upper bound on any artifact file; guards decoding against bogus length prefixes
const MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactName {
    GbmModel,
    GbmScaler,
    FeatureSchema,
    SeasonalModel,
}

impl ArtifactName {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::GbmModel => "gbm_model.bin",
            Self::GbmScaler => "gbm_scaler.bin",
            Self::FeatureSchema => "feature_schema.bin",
            Self::SeasonalModel => "seasonal_model.bin",
        }
    }
}

/// Result of loading an artifact for serving: corrupt files count as absent
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact<T> {
    Present(T),
    Absent,
}

impl<T> Artifact<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    kind: String,
    checksum: String,
    payload: Vec<u8>,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ARTIFACT_BYTES)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: ArtifactName) -> PathBuf {
        self.dir.join(name.file_name())
    }

    /// Serialize `value` and atomically replace the artifact stored under `name`
    pub fn save<T: Serialize>(&self, name: ArtifactName, value: &T) -> Result<PathBuf, ForecastError> {
        let payload = codec()
            .serialize(value)
            .map_err(|e| ForecastError::model(format!("failed to encode {name}: {e}")))?;
        let envelope = Envelope {
            kind: name.to_string(),
            checksum: sha256_hex(&payload),
            payload,
        };
        let bytes = codec()
            .serialize(&envelope)
            .map_err(|e| ForecastError::model(format!("failed to encode {name} envelope: {e}")))?;

        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let tmp_path = self
            .dir
            .join(format!("{}.{}.tmp", name.file_name(), uuid::Uuid::new_v4()));

        if let Err(e) = write_atomic(&tmp_path, &path, &bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        info!(artifact = %name, path = %path.display(), bytes = bytes.len(), "artifact saved");
        Ok(path)
    }

    /// Load for serving; missing and corrupt artifacts are both [`Artifact::Absent`]
    pub fn load<T: DeserializeOwned>(&self, name: ArtifactName) -> Artifact<T> {
        match self.try_load(name) {
            Ok(Some(value)) => Artifact::Present(value),
            Ok(None) => {
                debug!(artifact = %name, "artifact absent");
                Artifact::Absent
            }
            Err(e) => {
                error!(artifact = %name, error = %e, "failed to load artifact, treating as absent");
                Artifact::Absent
            }
        }
    }

    /// Load distinguishing missing (`Ok(None)`) from corrupt (`Err(ArtifactCorrupt)`)
    pub fn try_load<T: DeserializeOwned>(&self, name: ArtifactName) -> Result<Option<T>, ForecastError> {
        let path = self.path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| ForecastError::ArtifactCorrupt {
            name: name.to_string(),
            reason,
        };

        let envelope: Envelope = codec()
            .deserialize(&bytes)
            .map_err(|e| corrupt(format!("unreadable envelope: {e}")))?;
        if envelope.kind != name.to_string() {
            return Err(corrupt(format!(
                "expected kind '{}', found '{}'",
                name, envelope.kind
            )));
        }
        if sha256_hex(&envelope.payload) != envelope.checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let value = codec()
            .deserialize(&envelope.payload)
            .map_err(|e| corrupt(format!("unreadable payload: {e}")))?;
        debug!(artifact = %name, path = %path.display(), "artifact loaded");
        Ok(Some(value))
    }
}

fn write_atomic(tmp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    {
        let mut file = fs::File::create(tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
}
