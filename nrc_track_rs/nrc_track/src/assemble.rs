use tracing::debug;

use crate::resample::resample;
use crate::{TimedValue, TrackError, TrackPoint};

/// Build one [`TrackPoint`] per latitude sample.
///
/// Latitude, longitude and elevation are expected to be co-sampled and are read
/// positionally. Heart rate runs on its own clock and is aligned through
/// [`resample`]; a point whose window caught no heart-rate sample carries
/// `heart_rate: None`.
pub fn assemble(
    latitude: &[TimedValue],
    longitude: &[TimedValue],
    elevation: &[TimedValue],
    heart_rate: &[TimedValue],
) -> Result<Vec<TrackPoint>, TrackError> {
    check_len("longitude", latitude.len(), longitude.len())?;
    check_len("elevation", latitude.len(), elevation.len())?;

    let heart_rate = resample(latitude, heart_rate)?;

    let points: Vec<TrackPoint> = latitude
        .iter()
        .zip(longitude)
        .zip(elevation)
        .zip(&heart_rate)
        .map(|(((lat, lon), ele), hr)| TrackPoint {
            lat: lat.value,
            lon: lon.value,
            elevation: ele.value,
            timestamp_ms: lat.midpoint_ms(),
            heart_rate: hr.map(|slot| slot.value),
        })
        .collect();

    debug!(
        points = points.len(),
        without_heart_rate = points.iter().filter(|p| p.heart_rate.is_none()).count(),
        "assembled track points"
    );
    Ok(points)
}

fn check_len(metric: &'static str, expected: usize, actual: usize) -> Result<(), TrackError> {
    if expected != actual {
        return Err(TrackError::StreamLengthMismatch {
            metric,
            expected,
            actual,
        });
    }
    Ok(())
}
