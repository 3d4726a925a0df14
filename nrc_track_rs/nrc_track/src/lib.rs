//! Alignment of independently sampled workout metric streams into track points.
//!
//! An activity arrives as one stream per metric (latitude, longitude, elevation,
//! heart rate), each sampled on its own clock. Position defines the output
//! cardinality; auxiliary streams recorded at a different rate are bucketed into
//! windows derived from the position samples (see [`resample`]) and then zipped
//! with the position stream by [`assemble`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod activity;
pub mod assemble;
pub mod paging;
pub mod resample;
pub mod track;

pub use activity::{Activity, Metric, MetricType};
pub use assemble::assemble;
pub use paging::{collect_running_ids, ActivitiesPage, ActivityPages, MemoryPages, Paging};
pub use resample::{resample, windows, AlignedSlot, Window};
pub use track::{activity_to_track, epoch_ms_to_utc, Track};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    #[error("primary stream needs at least 2 samples, got {len}")]
    InsufficientSamples { len: usize },
    #[error("{metric} stream has {actual} samples, expected {expected} to match position")]
    StreamLengthMismatch {
        metric: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("timestamp out of range: {0} ms")]
    InvalidTimestamp(f64),
    #[error("no activity page recorded for after_time {0}")]
    MissingPage(f64),
    #[error("invalid activity JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        TrackError::Json(err.to_string())
    }
}

/// One observation covering `[start_ms, end_ms)` in epoch milliseconds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimedValue {
    #[serde(rename = "start_epoch_ms")]
    pub start_ms: f64,
    #[serde(rename = "end_epoch_ms")]
    pub end_ms: f64,
    pub value: f64,
}

impl TimedValue {
    pub fn new(start_ms: f64, end_ms: f64, value: f64) -> Self {
        Self {
            start_ms,
            end_ms,
            value,
        }
    }

    /// Center of the sample's own interval.
    pub fn midpoint_ms(&self) -> f64 {
        midpoint(self.start_ms, self.end_ms)
    }
}

pub(crate) fn midpoint(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

/// A single output point, one per position sample.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
    pub timestamp_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
}
