//! Per-category query windows
//!
//! Callers request a window for a whole run; each category then aligns it to
//! day boundaries its own way before querying. The rules differ between
//! categories and are kept as-is rather than unified.

use chrono::{DateTime, Days, TimeZone, Utc};

use crate::types::{Category, Window};

/// How a category turns the requested window into its query window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Start at midnight of the start day, end at midnight after the end day
    ExtendToNextMidnight,
    /// Start at midnight of the start day, end unchanged
    AlignStart,
    /// Use the requested window unchanged
    AsRequested,
}

impl Category {
    pub fn window_policy(&self) -> WindowPolicy {
        match self {
            Category::Steps => WindowPolicy::ExtendToNextMidnight,
            Category::Calories | Category::Distance | Category::HeartRate => {
                WindowPolicy::AlignStart
            }
            Category::Sleep => WindowPolicy::AsRequested,
        }
    }
}

impl WindowPolicy {
    /// Resolve `requested` into a query window, with days measured in `tz`
    pub fn resolve<Tz: TimeZone>(&self, requested: &Window, tz: &Tz) -> Window {
        match self {
            WindowPolicy::AsRequested => *requested,
            WindowPolicy::AlignStart => Window::new(start_of_day(requested.start, tz), requested.end),
            WindowPolicy::ExtendToNextMidnight => {
                let next_day = requested
                    .end
                    .checked_add_days(Days::new(1))
                    .unwrap_or(requested.end);
                Window::new(
                    start_of_day(requested.start, tz),
                    start_of_day(next_day, tz),
                )
            }
        }
    }
}

/// Midnight of the day containing `ts`, as seen in `tz`.
///
/// Falls back to `ts` itself when midnight does not exist locally (DST gaps).
pub fn start_of_day<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    ts.with_timezone(tz)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(ts)
}
