//! Artifact persistence.
//!
//! One fixed file per artifact kind under the output directory; the latest
//! capture of a kind overwrites the previous one. Each payload gets a JSON
//! sidecar recording provenance (originating symbol, digest, timestamp, run
//! id) for the downstream artifact builder.
//!
//! The store is the only writer of on-disk artifact state. Persistence
//! failures are reported to the caller but the caller is expected to log
//! and continue; nothing here unwinds a hook callback.

use chrono::{DateTime, Utc};
use kt_common::{CapturedArtifact, Error, Result, RunId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Provenance sidecar written next to each artifact payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSidecar {
    pub kind: kt_common::ArtifactKind,
    pub symbol: String,
    pub sha256: String,
    pub bytes: usize,
    pub captured_at: DateTime<Utc>,
    pub run_id: RunId,
}

/// Writes captured artifacts to a fixed, well-known location.
pub struct ArtifactStore {
    dir: PathBuf,
    run_id: RunId,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, run_id: RunId) -> Self {
        Self {
            dir: dir.into(),
            run_id,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact of `kind` persists to.
    pub fn path_for(&self, kind: kt_common::ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Persist an artifact, overwriting any prior capture of the same kind.
    pub fn persist(&self, artifact: &CapturedArtifact) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Persist(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.path_for(artifact.kind);
        std::fs::write(&path, &artifact.bytes)
            .map_err(|e| Error::Persist(format!("{}: {}", path.display(), e)))?;

        let sidecar = ArtifactSidecar {
            kind: artifact.kind,
            symbol: artifact.symbol.clone(),
            sha256: artifact.sha256_hex(),
            bytes: artifact.bytes.len(),
            captured_at: artifact.captured_at,
            run_id: self.run_id.clone(),
        };
        let sidecar_path = self.dir.join(artifact.kind.sidecar_name());
        let json = serde_json::to_string_pretty(&sidecar)?;
        std::fs::write(&sidecar_path, json)
            .map_err(|e| Error::Persist(format!("{}: {}", sidecar_path.display(), e)))?;

        info!(
            kind = %artifact.kind,
            symbol = %artifact.symbol,
            bytes = artifact.bytes.len(),
            sha256 = %sidecar.sha256,
            path = %path.display(),
            "artifact persisted"
        );
        Ok(path)
    }
}
