//! JSON Lines export reader
//!
//! Each category lives in `<root>/<category>.jsonl`, one [`RawSample`] per line:
//!
//! ```text
//! {"start":"2024-05-01T08:00:00Z","end":"2024-05-01T08:10:00Z","device":"iPhone","value":120}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{Category, RawSample, Window};

use super::DataSource;

/// [`DataSource`] backed by a directory of exported samples
#[derive(Debug, Clone)]
pub struct ExportSource {
    root: PathBuf,
}

impl ExportSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the export file for a category
    pub fn export_path(&self, category: Category) -> PathBuf {
        self.root.join(format!("{}.jsonl", category.as_str()))
    }
}

#[async_trait]
impl DataSource for ExportSource {
    async fn query(&self, category: Category, window: Window) -> Result<Vec<RawSample>> {
        let path = self.export_path(category);

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::query(
                category.as_str(),
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;

        parse_export(category, &content, &window)
    }

    fn name(&self) -> &str {
        "export"
    }
}

/// Parse export lines, keeping samples that start inside `window`
fn parse_export(category: Category, content: &str, window: &Window) -> Result<Vec<RawSample>> {
    let mut samples = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let sample: RawSample = serde_json::from_str(line).map_err(|e| {
            Error::query(
                category.as_str(),
                format!("line {}: invalid sample: {}", line_no + 1, e),
            )
        })?;

        if window.contains(sample.start) {
            samples.push(sample);
        }
    }

    tracing::debug!(
        category = %category,
        samples = samples.len(),
        "Read samples from export"
    );

    Ok(samples)
}
