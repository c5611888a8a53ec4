//! Data sources for health samples
//!
//! The pipeline never talks to a sensor store directly. It goes through the
//! [`DataSource`] trait, which returns every sample of a category whose start
//! falls in the query window, or fails.
//!
//! ## Implementations
//!
//! - [`ExportSource`]: reads JSON Lines exports from a directory

mod export;

pub use export::ExportSource;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Category, RawSample, Window};

/// Asynchronous provider of raw samples.
///
/// A returned `Err` is a query failure (transport, permission, missing data
/// store). An empty `Vec` is a successful query with no samples. The two are
/// recorded differently downstream, so implementations must not collapse them.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch samples for `category` whose start lies in `window`
    async fn query(&self, category: Category, window: Window) -> Result<Vec<RawSample>>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}
