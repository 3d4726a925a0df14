use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activity::{Activity, MetricType};
use crate::assemble::assemble;
use crate::{TrackError, TrackPoint};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub points: Vec<TrackPoint>,
}

impl Track {
    /// File name stem used by the writers: the ISO start time with `:`
    /// replaced by `;`, then `_<id>`.
    pub fn file_stem(&self, id: &str) -> String {
        let iso = self
            .start_time
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace(':', ";");
        format!("{}_{}", iso, id)
    }
}

/// Convert epoch milliseconds to UTC at the start of the containing millisecond
/// (sub-millisecond fractions are floored, so -1.5 ms maps to -2 ms).
pub fn epoch_ms_to_utc(ms: f64) -> Result<DateTime<Utc>, TrackError> {
    if !ms.is_finite() {
        return Err(TrackError::InvalidTimestamp(ms));
    }
    DateTime::<Utc>::from_timestamp_millis(ms.floor() as i64)
        .ok_or(TrackError::InvalidTimestamp(ms))
}

/// Assemble the activity's streams into a named track. Every point timestamp
/// must be representable as a UTC time.
pub fn activity_to_track(activity: &Activity) -> Result<Track, TrackError> {
    let points = assemble(
        activity.metric_values(MetricType::Latitude),
        activity.metric_values(MetricType::Longitude),
        activity.metric_values(MetricType::Elevation),
        activity.metric_values(MetricType::HeartRate),
    )?;
    for point in &points {
        epoch_ms_to_utc(point.timestamp_ms)?;
    }
    debug!(activity = %activity.id, points = points.len(), "converted activity");

    Ok(Track {
        name: activity.display_name()?,
        start_time: epoch_ms_to_utc(activity.start_epoch_ms)?,
        points,
    })
}
