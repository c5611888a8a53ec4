//! Upload-then-delete for chunk artifacts
//!
//! [`Uploader::upload`] sends one chunk and, only on a 2xx response, removes
//! the matching artifact from the store. Calls are awaited one at a time by
//! the pipeline, so chunk `k` goes out only after chunk `k-1` has completed.

use crate::config::Config;
use crate::error::Result;
use crate::store::{ChunkStore, RemoveOutcome};
use crate::types::Category;

use super::client::SinkClient;

/// Result of uploading one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Sink accepted the chunk; `removed` tells whether an artifact was deleted
    Delivered { status: u16, removed: bool },
    /// Sink answered with a non-2xx status; the artifact is kept
    Rejected { status: u16, body: String },
    /// Request did not complete; the artifact is kept
    Transport(String),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Delivered { .. })
    }
}

/// Outcome of re-uploading one leftover artifact
#[derive(Debug, Clone)]
pub struct ResumeReport {
    pub category: Category,
    pub index: usize,
    pub outcome: UploadOutcome,
}

/// Sends chunks to the sink and clears their artifacts on success
pub struct Uploader {
    client: SinkClient,
    store: ChunkStore,
}

impl Uploader {
    pub fn new(client: SinkClient, store: ChunkStore) -> Self {
        Self { client, store }
    }

    /// Build an uploader from the `[sink]` and `[store]` sections
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = SinkClient::new(&config.sink)?;
        let store = ChunkStore::open(&config.store.data_root())?;
        Ok(Self::new(client, store))
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn client(&self) -> &SinkClient {
        &self.client
    }

    /// Upload one chunk payload for `(category, index)`
    pub async fn upload(&self, category: Category, index: usize, payload: &str) -> UploadOutcome {
        self.send(category, index, payload, true).await
    }

    /// Upload a chunk whose artifact could not be written.
    ///
    /// The store is left untouched on success, so an older artifact under the
    /// same key is not mistaken for this chunk and deleted.
    pub async fn upload_unpersisted(
        &self,
        category: Category,
        index: usize,
        payload: &str,
    ) -> UploadOutcome {
        self.send(category, index, payload, false).await
    }

    async fn send(
        &self,
        category: Category,
        index: usize,
        payload: &str,
        remove_artifact: bool,
    ) -> UploadOutcome {
        let response = match self.client.send_chunk(category, payload).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    index,
                    error = %e,
                    "Failed to send chunk, keeping artifact"
                );
                return UploadOutcome::Transport(e.to_string());
            }
        };

        if !response.is_success() {
            tracing::warn!(
                category = %category,
                index,
                status = response.status,
                body = %response.body,
                "Sink rejected chunk, keeping artifact"
            );
            return UploadOutcome::Rejected {
                status: response.status,
                body: response.body,
            };
        }

        let removed = if !remove_artifact {
            false
        } else {
            match self.store.remove(category, index) {
                Ok(RemoveOutcome::Removed) => true,
                Ok(RemoveOutcome::NotFound) => false,
                Err(e) => {
                    tracing::error!(
                        category = %category,
                        index,
                        error = %e,
                        "Chunk delivered but artifact could not be removed"
                    );
                    false
                }
            }
        };

        tracing::info!(
            category = %category,
            index,
            status = response.status,
            "Chunk delivered"
        );

        UploadOutcome::Delivered {
            status: response.status,
            removed,
        }
    }

    /// Re-upload every artifact left in the store, in category and index order.
    ///
    /// Returns `Err` only if the store cannot be listed. Artifacts that cannot
    /// be read are skipped and stay on disk.
    pub async fn resume(&self) -> Result<Vec<ResumeReport>> {
        let pending = self.store.pending()?;
        let mut reports = Vec::with_capacity(pending.len());

        tracing::info!(pending = pending.len(), "Resuming upload of leftover artifacts");

        for artifact in pending {
            let payload = match self.store.read(artifact.category, artifact.index) {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        path = %artifact.path.display(),
                        error = %e,
                        "Failed to read artifact, skipping"
                    );
                    continue;
                }
            };

            let outcome = self
                .upload(artifact.category, artifact.index, &payload)
                .await;
            reports.push(ResumeReport {
                category: artifact.category,
                index: artifact.index,
                outcome,
            });
        }

        Ok(reports)
    }
}

/// Synchronous wrapper for Uploader
///
/// Re-uploads leftover artifacts without a data source or pipeline.
pub struct SyncUploader {
    inner: Uploader,
    runtime: tokio::runtime::Runtime,
}

impl SyncUploader {
    pub fn new(config: &Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let inner = Uploader::from_config(config)?;
        Ok(Self { inner, runtime })
    }

    /// Re-upload leftover artifacts (blocking)
    pub fn resume(&self) -> Result<Vec<ResumeReport>> {
        self.runtime.block_on(self.inner.resume())
    }

    pub fn uploader(&self) -> &Uploader {
        &self.inner
    }
}
