//! Per-category sample collection
//!
//! [`CategoryCollector`] issues one query per call and appends the result to a
//! caller-owned [`RecordBuffer`]:
//!
//! - query failed → one `-1` sentinel spanning the window
//! - query returned nothing → one `0` sentinel spanning the window
//! - otherwise → one record per sample, with the category's value transform
//!
//! The collector never clears or deduplicates the buffer. Reusing a buffer
//! across runs without [`RecordBuffer::clear`] duplicates records.

use std::sync::Arc;
use std::time::Duration;

use crate::source::DataSource;
use crate::types::{Category, NormalizedRecord, RawSample, Window, SENTINEL_DEVICE, UNKNOWN_DEVICE};

/// Records collected for one category during one run
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    category: Category,
    records: Vec<NormalizedRecord>,
}

impl RecordBuffer {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            records: Vec::new(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn push(&mut self, record: NormalizedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// What a single collection produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Query returned this many samples
    Samples(usize),
    /// Query succeeded with no samples; a `0` sentinel was recorded
    Empty,
    /// Query failed; a `-1` sentinel was recorded
    Failed(String),
}

impl CollectOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CollectOutcome::Failed(_))
    }
}

/// Drives one data source query per category and window
pub struct CategoryCollector {
    source: Arc<dyn DataSource>,
    query_timeout: Option<Duration>,
}

impl CategoryCollector {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            query_timeout: None,
        }
    }

    /// Treat queries that take longer than `timeout` as failed
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Query `window` for the buffer's category and append the result
    pub async fn collect(&self, buffer: &mut RecordBuffer, window: Window) -> CollectOutcome {
        let category = buffer.category();
        let query = self.source.query(category, window);

        let result = match self.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, query).await {
                Ok(result) => result,
                Err(_) => {
                    let message = format!("query timed out after {:?}", timeout);
                    return record_failure(buffer, &window, message);
                }
            },
            None => query.await,
        };

        match result {
            Err(e) => record_failure(buffer, &window, e.to_string()),
            Ok(samples) if samples.is_empty() => {
                tracing::info!(
                    category = %category,
                    window_start = window.start_epoch(),
                    window_end = window.end_epoch(),
                    "Query returned no samples, recording empty sentinel"
                );
                buffer.push(NormalizedRecord::empty(&window));
                CollectOutcome::Empty
            }
            Ok(samples) => {
                tracing::debug!(
                    category = %category,
                    samples = samples.len(),
                    source = self.source.name(),
                    "Normalizing samples"
                );
                for sample in &samples {
                    buffer.push(normalize(category, sample));
                }
                CollectOutcome::Samples(samples.len())
            }
        }
    }
}

fn record_failure(buffer: &mut RecordBuffer, window: &Window, message: String) -> CollectOutcome {
    tracing::warn!(
        category = %buffer.category(),
        window_start = window.start_epoch(),
        window_end = window.end_epoch(),
        error = %message,
        "Query failed, recording failure sentinel"
    );
    buffer.push(NormalizedRecord::failed(window));
    CollectOutcome::Failed(message)
}

/// Convert one sample into a record using the category's value transform
pub fn normalize(category: Category, sample: &RawSample) -> NormalizedRecord {
    let start = sample.start.timestamp();
    let end = sample.end.timestamp();

    let (device, value) = match category {
        Category::Sleep => (sleep_device(sample.value), end - start),
        _ => {
            let device = sample
                .device
                .clone()
                .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());
            (device, quantity_value(category, sample.value))
        }
    };

    NormalizedRecord {
        start,
        end,
        device,
        value,
    }
}

/// Integer value for quantity categories, truncated toward zero
fn quantity_value(category: Category, value: f64) -> i64 {
    match category {
        // kcal -> cal
        Category::Calories => (value * 1000.0) as i64,
        // m -> mm
        Category::Distance => (value * 1000.0) as i64,
        Category::Steps | Category::HeartRate | Category::Sleep => value as i64,
    }
}

/// Sleep samples carry their recording device as a coded flag
fn sleep_device(flag: f64) -> String {
    match flag as i64 {
        0 => SENTINEL_DEVICE.to_string(),
        1 => "Watch".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    enum Reply {
        Fail,
        Samples(Vec<RawSample>),
        Hang,
    }

    struct FakeSource(Reply);

    #[async_trait]
    impl DataSource for FakeSource {
        async fn query(&self, category: Category, _window: Window) -> Result<Vec<RawSample>> {
            match &self.0 {
                Reply::Fail => Err(Error::query(category.as_str(), "not authorized")),
                Reply::Samples(samples) => Ok(samples.clone()),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn collector(reply: Reply) -> CategoryCollector {
        CategoryCollector::new(Arc::new(FakeSource(reply)))
    }

    fn window() -> Window {
        Window::from_epoch(1_714_521_600, 1_714_608_000).unwrap()
    }

    fn sample(start: i64, end: i64, device: Option<&str>, value: f64) -> RawSample {
        RawSample {
            start: Utc.timestamp_opt(start, 0).unwrap(),
            end: Utc.timestamp_opt(end, 0).unwrap(),
            device: device.map(str::to_string),
            value,
        }
    }

    #[tokio::test]
    async fn test_failure_yields_single_failed_sentinel() {
        for category in Category::ALL {
            let mut buffer = RecordBuffer::new(category);
            let outcome = collector(Reply::Fail).collect(&mut buffer, window()).await;

            assert!(outcome.is_failed());
            assert_eq!(buffer.records(), &[NormalizedRecord::failed(&window())]);
            assert_eq!(buffer.records()[0].start, window().start_epoch());
            assert_eq!(buffer.records()[0].end, window().end_epoch());
        }
    }

    #[tokio::test]
    async fn test_empty_yields_single_empty_sentinel() {
        for category in Category::ALL {
            let mut buffer = RecordBuffer::new(category);
            let outcome = collector(Reply::Samples(vec![]))
                .collect(&mut buffer, window())
                .await;

            assert_eq!(outcome, CollectOutcome::Empty);
            assert_eq!(buffer.len(), 1);
            assert_eq!(buffer.records()[0].value, 0);
        }
    }

    #[tokio::test]
    async fn test_empty_sleep_query_record_text() {
        let t0 = 1_714_521_600;
        let window = Window::from_epoch(t0, t0 + 86_400).unwrap();
        let mut buffer = RecordBuffer::new(Category::Sleep);
        collector(Reply::Samples(vec![]))
            .collect(&mut buffer, window)
            .await;

        assert_eq!(
            buffer.records()[0].to_string(),
            format!("{},{},iPhone,0", t0, t0 + 86_400)
        );
    }

    #[tokio::test]
    async fn test_samples_are_normalized_in_order() {
        let samples = vec![
            sample(1_714_550_400, 1_714_551_000, Some("iPhone"), 120.7),
            sample(1_714_551_000, 1_714_551_600, None, 33.0),
        ];
        let mut buffer = RecordBuffer::new(Category::Steps);
        let outcome = collector(Reply::Samples(samples))
            .collect(&mut buffer, window())
            .await;

        assert_eq!(outcome, CollectOutcome::Samples(2));
        let lines: Vec<String> = buffer.records().iter().map(|r| r.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "1714550400,1714551000,iPhone,120",
                "1714551000,1714551600,Error,33",
            ]
        );
        assert!(!buffer.records().iter().any(|r| r.value == -1));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let mut buffer = RecordBuffer::new(Category::HeartRate);
        let outcome = collector(Reply::Hang)
            .with_timeout(Duration::from_millis(20))
            .collect(&mut buffer, window())
            .await;

        assert!(outcome.is_failed());
        assert_eq!(buffer.records(), &[NormalizedRecord::failed(&window())]);
    }

    #[tokio::test]
    async fn test_reused_buffer_accumulates_stale_records() {
        // Collecting twice without clearing duplicates every record
        let samples = vec![sample(1_714_550_400, 1_714_551_000, Some("iPhone"), 10.0)];
        let collector = collector(Reply::Samples(samples));
        let mut buffer = RecordBuffer::new(Category::Steps);

        collector.collect(&mut buffer, window()).await;
        collector.collect(&mut buffer, window()).await;

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.records()[0], buffer.records()[1]);

        buffer.clear();
        collector.collect(&mut buffer, window()).await;
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_value_transforms() {
        let s = |value| sample(1_000, 1_600, Some("Watch"), value);

        assert_eq!(normalize(Category::Steps, &s(57.9)).value, 57);
        assert_eq!(normalize(Category::Calories, &s(0.4567)).value, 456);
        assert_eq!(normalize(Category::Distance, &s(12.3456)).value, 12345);
        assert_eq!(normalize(Category::HeartRate, &s(72.6)).value, 72);
    }

    #[test]
    fn test_sleep_uses_duration_and_coded_device() {
        let in_bed = normalize(Category::Sleep, &sample(1_000, 4_600, Some("ignored"), 0.0));
        assert_eq!(in_bed.to_string(), "1000,4600,iPhone,3600");

        let asleep = normalize(Category::Sleep, &sample(1_000, 1_900, None, 1.0));
        assert_eq!(asleep.device, "Watch");
        assert_eq!(asleep.value, 900);

        let other = normalize(Category::Sleep, &sample(1_000, 1_060, None, 3.0));
        assert_eq!(other.device, "");
    }
}
