use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::track::epoch_ms_to_utc;
use crate::{TimedValue, TrackError};

const NAME_TAG: &str = "com.nike.name";
const RUN_TYPE: &str = "run";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Latitude,
    Longitude,
    Elevation,
    HeartRate,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    pub kind: MetricType,
    #[serde(default)]
    pub values: Vec<TimedValue>,
}

/// Activity as delivered by the upstream API. Listing pages omit `metrics`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_epoch_ms: f64,
    pub end_epoch_ms: f64,
    #[serde(default)]
    pub metric_types: Vec<MetricType>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Activity {
    pub fn from_json(text: &str) -> Result<Self, TrackError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Values of the first metric of `kind`, empty when the activity lacks it.
    pub fn metric_values(&self, kind: MetricType) -> &[TimedValue] {
        self.metrics
            .iter()
            .find(|m| m.kind == kind)
            .map(|m| m.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_running_with_gps(&self) -> bool {
        self.kind == RUN_TYPE
            && self.metric_types.contains(&MetricType::Latitude)
            && self.metric_types.contains(&MetricType::Longitude)
    }

    /// User-chosen name, or "<Weekday> run (NRC)" from the UTC start date.
    pub fn display_name(&self) -> Result<String, TrackError> {
        if let Some(name) = self.tags.get(NAME_TAG) {
            return Ok(name.clone());
        }
        let start = epoch_ms_to_utc(self.start_epoch_ms)?;
        Ok(format!("{} run (NRC)", start.format("%A")))
    }
}
