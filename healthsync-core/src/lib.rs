//! # healthsync-core
//!
//! Core library for healthsync - a health metric collector that ships data
//! to a oneM2M sink.
//!
//! This library provides:
//! - Domain types for categories, samples, records and chunks
//! - The [`DataSource`] seam and a JSON Lines export source
//! - Collection, chunking, artifact storage and upload
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Each category run flows through four stages:
//! - **Collect:** one query per category; failures and empty results become sentinel records
//! - **Chunk:** records are split into batches of at most 4000
//! - **Persist:** every chunk is written to the local artifact folder
//! - **Upload:** every chunk is posted to the sink; its artifact is deleted on a 2xx response
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use healthsync_core::{Category, Config, ExportSource, SyncPipeline, Window};
//!
//! let config = Config::load().expect("failed to load config");
//! let source = Arc::new(ExportSource::new("/path/to/export"));
//! let pipeline = SyncPipeline::new(&config, source).expect("failed to build pipeline");
//!
//! let window = Window::from_epoch(1_714_521_600, 1_714_608_000).unwrap();
//! let report = pipeline.run_category(Category::Steps, window);
//! println!("delivered {} of {} chunks", report.delivered(), report.chunks.len());
//! ```

// Re-export commonly used items at the crate root
pub use chunk::{ChunkWriter, CHUNK_RECORD_LIMIT};
pub use collect::{CategoryCollector, CollectOutcome, RecordBuffer};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{CategoryReport, ChunkReport, PersistStatus, Pipeline, SyncPipeline};
pub use source::{DataSource, ExportSource};
pub use store::{ChunkStore, PendingArtifact, RemoveOutcome};
pub use types::*;
pub use upload::{ResumeReport, SinkClient, SyncUploader, UploadOutcome, Uploader};
pub use window::WindowPolicy;

// Public modules
pub mod chunk;
pub mod collect;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod types;
pub mod upload;
pub mod window;
