//! Chunking of normalized records
//!
//! A [`ChunkWriter`] accumulates records and emits a [`ChunkPayload`] every
//! time it holds `limit` of them. Chunk `k` therefore holds records
//! `[limit·k, min(limit·(k+1), N))`, joined by `,` in input order.

use crate::error::{Error, Result};
use crate::types::{Category, ChunkPayload, NormalizedRecord};

/// Maximum number of records in one chunk
pub const CHUNK_RECORD_LIMIT: usize = 4000;

/// Builds bounded chunks for a single category run
#[derive(Debug)]
pub struct ChunkWriter {
    category: Category,
    limit: usize,
    next_index: usize,
    pending: usize,
    body: String,
}

impl ChunkWriter {
    /// Writer with the fixed pipeline bound
    pub fn new(category: Category) -> Self {
        Self {
            category,
            limit: CHUNK_RECORD_LIMIT,
            next_index: 0,
            pending: 0,
            body: String::new(),
        }
    }

    /// Writer with a custom bound; `limit` must be non-zero
    pub fn with_limit(category: Category, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Chunk("chunk record limit must be non-zero".to_string()));
        }
        Ok(Self {
            limit,
            ..Self::new(category)
        })
    }

    /// Append a record, returning a full chunk when the bound is reached
    pub fn push(&mut self, record: &NormalizedRecord) -> Option<ChunkPayload> {
        if self.pending > 0 {
            self.body.push(',');
        }
        self.body.push_str(&record.to_string());
        self.pending += 1;

        if self.pending == self.limit {
            Some(self.emit())
        } else {
            None
        }
    }

    /// Emit the trailing partial chunk, if any
    pub fn finish(mut self) -> Option<ChunkPayload> {
        if self.pending == 0 {
            None
        } else {
            Some(self.emit())
        }
    }

    fn emit(&mut self) -> ChunkPayload {
        let chunk = ChunkPayload {
            category: self.category,
            index: self.next_index,
            record_count: self.pending,
            body: std::mem::take(&mut self.body),
        };
        self.next_index += 1;
        self.pending = 0;
        chunk
    }
}

/// Split `records` into chunks of at most [`CHUNK_RECORD_LIMIT`] records
pub fn encode(category: Category, records: &[NormalizedRecord]) -> Vec<ChunkPayload> {
    let mut writer = ChunkWriter::new(category);
    let mut chunks: Vec<ChunkPayload> = records.iter().filter_map(|r| writer.push(r)).collect();
    chunks.extend(writer.finish());
    chunks
}
