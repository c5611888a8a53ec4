//! Upload of chunks to the remote sink
//!
//! The sink is a oneM2M (Mobius) server. Each chunk is posted as one content
//! instance under the user's `health` container:
//!
//! ```text
//! POST <server_url>/Mobius/<user_id>/health/<category>
//! {"m2m:cin":{"con":"<chunk payload>"}}
//! ```
//!
//! ## Architecture
//!
//! The uploader follows a "local-first" principle:
//! - Chunks are always written to the artifact store before upload
//! - A chunk's artifact is deleted only after a 2xx response
//! - Failures leave the artifact in place for [`Uploader::resume`]; nothing is retried automatically
//!
//! ## Usage
//!
//! Configure the sink in `~/.config/healthsync/config.toml`:
//!
//! ```toml
//! [sink]
//! server_url = "http://114.71.220.59:7579"
//! user_id = "S1234"
//! ```

mod client;
mod envelope;
mod uploader;

pub use client::{SinkClient, SinkResponse, RESOURCE_ROOT};
pub use envelope::{ContentInstance, CONTENT_TYPE};
pub use uploader::{ResumeReport, SyncUploader, UploadOutcome, Uploader};
