//! Acquisition-to-upload pipeline
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌─────────────┐   ┌────────────┐   ┌──────────┐
//! │ DataSource │ ─►│ CategoryCollector│ ─►│ ChunkWriter │ ─►│ ChunkStore │ ─►│ Uploader │
//! └────────────┘   └──────────────────┘   └─────────────┘   └────────────┘   └──────────┘
//!                     RecordBuffer            chunk 0..n       persist          POST, then
//!                     (per run)                                                 remove on 2xx
//! ```
//!
//! [`Pipeline::run_category`] awaits the query, chunks the records, then
//! persists and uploads each chunk in index order. It never fails: every
//! outcome is reported in the returned [`CategoryReport`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Local};
use tracing::Instrument;
use uuid::Uuid;

use crate::chunk;
use crate::collect::{CategoryCollector, CollectOutcome, RecordBuffer};
use crate::config::Config;
use crate::error::Result;
use crate::source::DataSource;
use crate::types::{Category, ChunkArtifact, Window};
use crate::upload::{ResumeReport, UploadOutcome, Uploader};

/// Whether a chunk's artifact was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    Persisted(ChunkArtifact),
    Failed(String),
}

impl PersistStatus {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistStatus::Persisted(_))
    }
}

/// What happened to one chunk
#[derive(Debug, Clone)]
pub struct ChunkReport {
    pub index: usize,
    pub record_count: usize,
    pub persist: PersistStatus,
    pub upload: UploadOutcome,
}

/// What happened during one category run
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub run_id: Uuid,
    pub category: Category,
    /// Window actually queried, after the category's window policy
    pub window: Window,
    pub collect: CollectOutcome,
    /// Records produced by collection, sentinels included
    pub records: usize,
    pub chunks: Vec<ChunkReport>,
}

impl CategoryReport {
    /// Number of chunks the sink accepted
    pub fn delivered(&self) -> usize {
        self.chunks.iter().filter(|c| c.upload.is_success()).count()
    }

    /// Number of chunks that were not delivered
    pub fn failed(&self) -> usize {
        self.chunks.len() - self.delivered()
    }

    /// Number of chunks whose artifact could not be written
    pub fn persist_failures(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| !c.persist.is_persisted())
            .count()
    }

    /// Every chunk was persisted and delivered
    pub fn is_complete(&self) -> bool {
        self.failed() == 0 && self.persist_failures() == 0
    }
}

/// Runs the pipeline for one or more categories
pub struct Pipeline {
    collector: CategoryCollector,
    uploader: Uploader,
    /// Fixed day alignment; `None` follows the local time zone, DST included
    offset: Option<FixedOffset>,
}

impl Pipeline {
    /// Create a pipeline; days are aligned to local midnight
    pub fn new(source: Arc<dyn DataSource>, uploader: Uploader) -> Self {
        Self {
            collector: CategoryCollector::new(source),
            uploader,
            offset: None,
        }
    }

    /// Build a pipeline from configuration
    pub fn from_config(config: &Config, source: Arc<dyn DataSource>) -> Result<Self> {
        config.pipeline.validate()?;
        let pipeline = Self::new(source, Uploader::from_config(config)?)
            .with_query_timeout(config.pipeline.query_timeout());
        Ok(pipeline)
    }

    /// Record a failure sentinel for queries slower than `timeout`
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.collector = self.collector.with_timeout(timeout);
        self
    }

    /// Align days to `offset` instead of the local time zone
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Query window for `category`, with days taken from each bound's own date
    pub fn resolve_window(&self, category: Category, requested: &Window) -> Window {
        let policy = category.window_policy();
        match &self.offset {
            Some(offset) => policy.resolve(requested, offset),
            None => policy.resolve(requested, &Local),
        }
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Collect, chunk, persist and upload one category
    pub async fn run_category(&self, category: Category, requested: Window) -> CategoryReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("category_run", %run_id, %category);
        self.run_category_inner(run_id, category, requested)
            .instrument(span)
            .await
    }

    async fn run_category_inner(
        &self,
        run_id: Uuid,
        category: Category,
        requested: Window,
    ) -> CategoryReport {
        let window = self.resolve_window(category, &requested);
        tracing::info!(%window, "Starting category run");

        let mut buffer = RecordBuffer::new(category);
        let collect = self.collector.collect(&mut buffer, window).await;
        let records = buffer.len();

        let chunks = chunk::encode(category, buffer.records());
        let mut reports = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let persist = match self
                .uploader
                .store()
                .persist(category, chunk.index, &chunk.body)
            {
                Ok(artifact) => PersistStatus::Persisted(artifact),
                Err(e) => {
                    tracing::error!(
                        index = chunk.index,
                        error = %e,
                        "Failed to persist chunk artifact"
                    );
                    PersistStatus::Failed(e.to_string())
                }
            };

            let upload = if persist.is_persisted() {
                self.uploader.upload(category, chunk.index, &chunk.body).await
            } else {
                self.uploader
                    .upload_unpersisted(category, chunk.index, &chunk.body)
                    .await
            };

            reports.push(ChunkReport {
                index: chunk.index,
                record_count: chunk.record_count,
                persist,
                upload,
            });
        }

        buffer.clear();

        let report = CategoryReport {
            run_id,
            category,
            window,
            collect,
            records,
            chunks: reports,
        };

        tracing::info!(
            records = report.records,
            chunks = report.chunks.len(),
            delivered = report.delivered(),
            failed = report.failed(),
            "Finished category run"
        );

        report
    }

    /// Run every category in turn over the same requested window
    pub async fn run_all(&self, requested: Window) -> Vec<CategoryReport> {
        self.run_categories(&Category::ALL, requested).await
    }

    /// Run the given categories in turn over the same requested window
    pub async fn run_categories(
        &self,
        categories: &[Category],
        requested: Window,
    ) -> Vec<CategoryReport> {
        let mut reports = Vec::with_capacity(categories.len());
        for &category in categories {
            reports.push(self.run_category(category, requested).await);
        }
        reports
    }

    /// Re-upload artifacts left behind by earlier runs
    pub async fn resume(&self) -> Result<Vec<ResumeReport>> {
        self.uploader.resume().await
    }
}

/// Synchronous wrapper for Pipeline
///
/// Provides blocking methods for use in synchronous code.
pub struct SyncPipeline {
    inner: Pipeline,
    runtime: tokio::runtime::Runtime,
}

impl SyncPipeline {
    /// Create a sync pipeline from configuration
    pub fn new(config: &Config, source: Arc<dyn DataSource>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let inner = Pipeline::from_config(config, source)?;
        Ok(Self { inner, runtime })
    }

    /// Wrap an already built pipeline
    pub fn from_pipeline(inner: Pipeline) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { inner, runtime })
    }

    /// Run one category (blocking)
    pub fn run_category(&self, category: Category, requested: Window) -> CategoryReport {
        self.runtime
            .block_on(self.inner.run_category(category, requested))
    }

    /// Run the given categories (blocking)
    pub fn run_categories(&self, categories: &[Category], requested: Window) -> Vec<CategoryReport> {
        self.runtime
            .block_on(self.inner.run_categories(categories, requested))
    }

    /// Run all categories (blocking)
    pub fn run_all(&self, requested: Window) -> Vec<CategoryReport> {
        self.runtime.block_on(self.inner.run_all(requested))
    }

    /// Re-upload leftover artifacts (blocking)
    pub fn resume(&self) -> Result<Vec<ResumeReport>> {
        self.runtime.block_on(self.inner.resume())
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner
    }
}
