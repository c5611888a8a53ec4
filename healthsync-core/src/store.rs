//! Local artifact namespace
//!
//! Every chunk is written to `<data-root>/healthCSVFolder/{container}_{index}.csv`
//! before it is uploaded, and removed only once the sink accepts it. Whatever
//! is left in the folder after a run is exactly the set of chunks that still
//! need delivering.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::{Category, ChunkArtifact};

/// Name of the artifact folder under the data root
pub const ARTIFACT_DIR: &str = "healthCSVFolder";

/// Result of removing an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// An artifact still waiting for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifact {
    pub category: Category,
    pub index: usize,
    pub path: PathBuf,
}

/// File-backed store for chunk artifacts
#[derive(Debug, Clone)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    /// Open the store under `data_root`, creating the artifact folder if needed
    pub fn open(data_root: &Path) -> Result<Self> {
        let dir = data_root.join(ARTIFACT_DIR);
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened artifact store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, category: Category, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", category.container(), index))
    }

    /// Write `body` as the artifact for `(category, index)`, replacing any previous one
    pub fn persist(&self, category: Category, index: usize, body: &str) -> Result<ChunkArtifact> {
        let path = self.artifact_path(category, index);
        fs::write(&path, body.as_bytes())?;

        let sha256 = hex::encode(Sha256::digest(body.as_bytes()));
        tracing::debug!(
            category = %category,
            index,
            path = %path.display(),
            bytes = body.len(),
            "Persisted chunk artifact"
        );

        Ok(ChunkArtifact {
            category,
            index,
            path,
            bytes: body.len() as u64,
            sha256,
        })
    }

    /// Read an artifact back, or `None` if it does not exist
    pub fn read(&self, category: Category, index: usize) -> Result<Option<String>> {
        match fs::read_to_string(self.artifact_path(category, index)) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the artifact for `(category, index)`.
    ///
    /// A missing artifact is logged and reported as [`RemoveOutcome::NotFound`].
    pub fn remove(&self, category: Category, index: usize) -> Result<RemoveOutcome> {
        let path = self.artifact_path(category, index);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(category = %category, index, "Removed chunk artifact");
                Ok(RemoveOutcome::Removed)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    category = %category,
                    index,
                    path = %path.display(),
                    "Artifact to remove was not found"
                );
                Ok(RemoveOutcome::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List artifacts still on disk, ordered by category then index
    pub fn pending(&self) -> Result<Vec<PendingArtifact>> {
        let pattern = format!(
            "{}/*.csv",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );

        let paths = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("invalid artifact pattern: {}", e)))?;

        let mut pending = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read artifact entry");
                    continue;
                }
            };

            match parse_artifact_name(&path) {
                Some((category, index)) => pending.push(PendingArtifact {
                    category,
                    index,
                    path,
                }),
                None => {
                    tracing::warn!(path = %path.display(), "Skipping unrecognized file in artifact folder");
                }
            }
        }

        pending.sort_by_key(|a| (a.category, a.index));
        Ok(pending)
    }
}

/// Parse `{container}_{index}.csv` into its key
fn parse_artifact_name(path: &Path) -> Option<(Category, usize)> {
    let stem = path.file_stem()?.to_str()?;
    let (container, index) = stem.rsplit_once('_')?;
    let category = Category::from_container(container)?;
    let index = index.parse().ok()?;
    Some((category, index))
}
