// Time-window alignment of a secondary metric stream onto a primary stream.
// Windows are derived from the primary samples and partition [0, +inf); a single
// forward cursor sweeps the secondary stream across them.

use crate::{midpoint, TimedValue, TrackError};

/// Aggregated secondary value for one window, `None` when no sample fell inside.
pub type AlignedSlot = Option<TimedValue>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl Window {
    /// Membership is `start >= window.start && end < window.end`. A sample whose
    /// end lands exactly on the window end is not part of it.
    fn contains(&self, sample: &TimedValue) -> bool {
        sample.start_ms >= self.start_ms && sample.end_ms < self.end_ms
    }
}

/// Derive one window per primary sample. Boundaries sit halfway between the end
/// of one primary sample and the start of the next; the first window opens at 0
/// and the last one never closes.
pub fn windows(primary: &[TimedValue]) -> Result<Vec<Window>, TrackError> {
    let len = primary.len();
    if len < 2 {
        return Err(TrackError::InsufficientSamples { len });
    }

    let boundaries: Vec<f64> = primary
        .windows(2)
        .map(|pair| midpoint(pair[0].end_ms, pair[1].start_ms))
        .collect();

    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let start_ms = if i == 0 { 0.0 } else { boundaries[i - 1] };
        let end_ms = if i + 1 == len {
            f64::INFINITY
        } else {
            boundaries[i]
        };
        out.push(Window { start_ms, end_ms });
    }
    Ok(out)
}

/// Align `secondary` onto the windows of `primary`, producing exactly one slot
/// per primary sample.
///
/// Both streams must be sorted by start time; this is assumed, not checked. The
/// cursor into `secondary` only moves forward, so a sample that starts before
/// the current window (or straddles a boundary) stops the sweep and every
/// following slot comes back empty.
///
/// A non-empty bucket yields the mean start, mean end and mean value, with only
/// the value rounded (half away from zero, [`f64::round`]).
pub fn resample(
    primary: &[TimedValue],
    secondary: &[TimedValue],
) -> Result<Vec<AlignedSlot>, TrackError> {
    let windows = windows(primary)?;
    let mut slots = Vec::with_capacity(windows.len());
    let mut cursor = 0usize;
    let mut bucket: Vec<TimedValue> = Vec::new();

    for window in &windows {
        bucket.clear();
        while cursor < secondary.len() && window.contains(&secondary[cursor]) {
            bucket.push(secondary[cursor]);
            cursor += 1;
        }
        slots.push(aggregate(&bucket));
    }

    Ok(slots)
}

fn aggregate(bucket: &[TimedValue]) -> AlignedSlot {
    if bucket.is_empty() {
        return None;
    }
    let n = bucket.len() as f64;
    let mut start = 0.0;
    let mut end = 0.0;
    let mut value = 0.0;
    for sample in bucket {
        start += sample.start_ms;
        end += sample.end_ms;
        value += sample.value;
    }
    Some(TimedValue {
        start_ms: start / n,
        end_ms: end / n,
        value: (value / n).round(),
    })
}
