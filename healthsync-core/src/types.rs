//! Core domain types for healthsync
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Category** | One of the five fixed health metrics (steps, calories, distance, sleep, heart rate) |
//! | **Window** | Half-open time range `[start, end)` a query covers |
//! | **RawSample** | A sample as delivered by a [`DataSource`](crate::source::DataSource) |
//! | **Record** | One normalized CSV line `start,end,device,value` |
//! | **Sentinel** | A synthetic record standing in for a failed (`-1`) or empty (`0`) query |
//! | **Chunk** | Up to 4000 records joined by `,`; the unit of persistence and upload |
//! | **Artifact** | The on-disk form of a chunk, kept until the sink accepts it |

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;

/// Device label used for sentinel records.
pub const SENTINEL_DEVICE: &str = "iPhone";

/// Device label used when a sample does not name its source device.
pub const UNKNOWN_DEVICE: &str = "Error";

/// Sentinel value for a query that failed.
pub const FAILED_SENTINEL: i64 = -1;

/// Sentinel value for a query that succeeded without samples.
pub const EMPTY_SENTINEL: i64 = 0;

// ============================================
// Category
// ============================================

/// A health metric processed by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Steps,
    Calories,
    Distance,
    Sleep,
    HeartRate,
}

impl Category {
    /// Every category, in processing order
    pub const ALL: [Category; 5] = [
        Category::Steps,
        Category::Calories,
        Category::Distance,
        Category::Sleep,
        Category::HeartRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Steps => "steps",
            Category::Calories => "calories",
            Category::Distance => "distance",
            Category::Sleep => "sleep",
            Category::HeartRate => "heart_rate",
        }
    }

    /// Segment used in the sink URL and in artifact file names
    pub fn container(&self) -> &'static str {
        match self {
            Category::Steps => "steps",
            Category::Calories => "calories",
            Category::Distance => "distance",
            Category::Sleep => "sleep",
            Category::HeartRate => "HR",
        }
    }

    /// Parent container on the sink
    pub fn group(&self) -> &'static str {
        "health"
    }

    /// Look up a category by its container segment (`HR`, `steps`, ...)
    pub fn from_container(container: &str) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|category| category.container() == container)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steps" => Ok(Category::Steps),
            "calories" => Ok(Category::Calories),
            "distance" => Ok(Category::Distance),
            "sleep" => Ok(Category::Sleep),
            "heart_rate" | "HR" | "hr" => Ok(Category::HeartRate),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

// ============================================
// Window
// ============================================

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Build a window from epoch seconds.
    ///
    /// Returns `None` if either bound is out of chrono's range.
    pub fn from_epoch(start: i64, end: i64) -> Option<Self> {
        Some(Self {
            start: Utc.timestamp_opt(start, 0).single()?,
            end: Utc.timestamp_opt(end, 0).single()?,
        })
    }

    pub fn start_epoch(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_epoch(&self) -> i64 {
        self.end.timestamp()
    }

    /// Whether `ts` falls inside `[start, end)`
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

// ============================================
// Samples and records
// ============================================

/// A sample as returned by a data source.
///
/// `value` is in the unit the source reports: count, kcal, m or count/min.
/// For sleep it carries the coded stage flag rather than a measurement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSample {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub device: Option<String>,
    pub value: f64,
}

/// Accepts RFC 3339 strings or integer epoch seconds
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Epoch(i64),
        Text(DateTime<Utc>),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Text(ts) => Ok(ts),
        Timestamp::Epoch(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", secs))),
    }
}

/// One normalized CSV line: `start_epoch,end_epoch,device,value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub start: i64,
    pub end: i64,
    pub device: String,
    pub value: i64,
}

impl NormalizedRecord {
    /// Sentinel for a query that failed
    pub fn failed(window: &Window) -> Self {
        Self::sentinel(window, FAILED_SENTINEL)
    }

    /// Sentinel for a query that returned no samples
    pub fn empty(window: &Window) -> Self {
        Self::sentinel(window, EMPTY_SENTINEL)
    }

    fn sentinel(window: &Window, value: i64) -> Self {
        Self {
            start: window.start_epoch(),
            end: window.end_epoch(),
            device: SENTINEL_DEVICE.to_string(),
            value,
        }
    }

    /// Whether this record could be a sentinel.
    ///
    /// Real samples can also carry `0` (e.g. a zero-step interval), so this
    /// is a hint for callers scanning emitted data, not proof.
    pub fn is_sentinel(&self) -> bool {
        self.device == SENTINEL_DEVICE
            && (self.value == FAILED_SENTINEL || self.value == EMPTY_SENTINEL)
    }
}

impl fmt::Display for NormalizedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.start, self.end, self.device, self.value)
    }
}

// ============================================
// Chunks and artifacts
// ============================================

/// A bounded batch of records ready to persist and upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPayload {
    pub category: Category,
    /// Sequence index within the category run, starting at 0
    pub index: usize,
    /// Number of records joined into `body`
    pub record_count: usize,
    /// Records joined by `,`
    pub body: String,
}

/// A chunk persisted in the local artifact namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkArtifact {
    pub category: Category,
    pub index: usize,
    pub path: PathBuf,
    /// Size of the written payload in bytes
    pub bytes: u64,
    /// Hex SHA-256 of the written payload
    pub sha256: String,
}
