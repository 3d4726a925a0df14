use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::activity::Activity;
use crate::TrackError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Paging {
    /// Cursor for the next page; absent on the last page.
    #[serde(default)]
    pub after_time: Option<f64>,
    #[serde(default)]
    pub after_id: Option<JsonValue>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivitiesPage {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub paging: Paging,
}

/// Source of activity listing pages, addressed by an `after_time` cursor.
pub trait ActivityPages {
    fn page_after(&mut self, after_time: f64) -> Result<ActivitiesPage, TrackError>;
}

/// Walk the listing from `after_time` until the cursor runs out, keeping the
/// ids of runs that recorded GPS. A cursor that was already requested ends the
/// walk.
pub fn collect_running_ids<P>(pages: &mut P, after_time: f64) -> Result<Vec<String>, TrackError>
where
    P: ActivityPages + ?Sized,
{
    let mut ids = Vec::new();
    let mut cursor = after_time;
    let mut visited = HashSet::new();
    visited.insert(cursor_key(cursor));
    loop {
        let page = pages.page_after(cursor)?;
        let before = ids.len();
        ids.extend(
            page.activities
                .iter()
                .filter(|a| a.is_running_with_gps())
                .map(|a| a.id.clone()),
        );
        debug!(
            after_time = cursor,
            listed = page.activities.len(),
            kept = ids.len() - before,
            "activity page"
        );

        match page.paging.after_time {
            None => break,
            Some(next) if !visited.insert(cursor_key(next)) => {
                warn!(
                    after_time = cursor,
                    next_after_time = next,
                    "paging cursor revisited; stopping"
                );
                break;
            }
            Some(next) => cursor = next,
        }
    }
    Ok(ids)
}

/// Pages held in memory, keyed by the whole-millisecond cursor they answer.
#[derive(Clone, Debug, Default)]
pub struct MemoryPages {
    pages: BTreeMap<i64, ActivitiesPage>,
}

impl MemoryPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, after_time: f64, page: ActivitiesPage) {
        self.pages.insert(cursor_key(after_time), page);
    }

    /// Parse a dump of the form `{"<after_time>": <page>, ...}`.
    pub fn from_json(text: &str) -> Result<Self, TrackError> {
        let raw: BTreeMap<String, ActivitiesPage> = serde_json::from_str(text)?;
        let mut pages = Self::new();
        for (key, page) in raw {
            let after_time: f64 = key
                .trim()
                .parse()
                .map_err(|_| TrackError::Json(format!("invalid page cursor {:?}", key)))?;
            pages.insert(after_time, page);
        }
        Ok(pages)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl ActivityPages for MemoryPages {
    fn page_after(&mut self, after_time: f64) -> Result<ActivitiesPage, TrackError> {
        self.pages
            .get(&cursor_key(after_time))
            .cloned()
            .ok_or(TrackError::MissingPage(after_time))
    }
}

fn cursor_key(after_time: f64) -> i64 {
    after_time.trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dump() -> String {
        json!({
            "0": {
                "activities": [
                    {"id": "r1", "type": "run", "start_epoch_ms": 10, "end_epoch_ms": 20,
                     "metric_types": ["latitude", "longitude"]},
                    {"id": "treadmill", "type": "run", "start_epoch_ms": 30, "end_epoch_ms": 40,
                     "metric_types": ["heart_rate"]}
                ],
                "paging": {"after_time": 40, "after_id": "treadmill"}
            },
            "40": {
                "activities": [
                    {"id": "ride", "type": "cycle", "start_epoch_ms": 50, "end_epoch_ms": 60,
                     "metric_types": ["latitude", "longitude"]},
                    {"id": "r2", "type": "run", "start_epoch_ms": 70, "end_epoch_ms": 80,
                     "metric_types": ["latitude", "longitude", "elevation"]}
                ],
                "paging": {"after_time": 80, "after_id": 99}
            },
            "80": {"activities": [], "paging": {}}
        })
        .to_string()
    }

    #[test]
    fn test_collects_across_pages() {
        let mut pages = MemoryPages::from_json(&dump()).unwrap();
        assert_eq!(pages.len(), 3);
        let ids = collect_running_ids(&mut pages, 0.0).unwrap();
        assert_eq!(ids, vec!["r1".to_string(), "r2".to_string()]);
    }

    #[test]
    fn test_starts_from_cursor() {
        let mut pages = MemoryPages::from_json(&dump()).unwrap();
        let ids = collect_running_ids(&mut pages, 40.0).unwrap();
        assert_eq!(ids, vec!["r2".to_string()]);
    }

    #[test]
    fn test_missing_page_is_error() {
        let mut pages = MemoryPages::from_json(&dump()).unwrap();
        assert_eq!(
            collect_running_ids(&mut pages, 5.0),
            Err(TrackError::MissingPage(5.0))
        );
    }

    #[test]
    fn test_stuck_cursor_stops() {
        let mut pages = MemoryPages::new();
        let page: ActivitiesPage = serde_json::from_value(json!({
            "activities": [{"id": "r", "type": "run", "start_epoch_ms": 0, "end_epoch_ms": 1,
                            "metric_types": ["latitude", "longitude"]}],
            "paging": {"after_time": 7}
        }))
        .unwrap();
        pages.insert(7.0, page);
        let ids = collect_running_ids(&mut pages, 7.0).unwrap();
        assert_eq!(ids, vec!["r".to_string()]);
    }

    #[test]
    fn test_cyclic_cursor_stops() {
        let dump = json!({
            "0": {
                "activities": [{"id": "a", "type": "run", "start_epoch_ms": 0, "end_epoch_ms": 1,
                                "metric_types": ["latitude", "longitude"]}],
                "paging": {"after_time": 40}
            },
            "40": {
                "activities": [{"id": "b", "type": "run", "start_epoch_ms": 2, "end_epoch_ms": 3,
                                "metric_types": ["latitude", "longitude"]}],
                "paging": {"after_time": 0}
            }
        })
        .to_string();
        let mut pages = Limited {
            inner: MemoryPages::from_json(&dump).unwrap(),
            calls: 0,
        };
        let ids = collect_running_ids(&mut pages, 0.0).unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(pages.calls, 2);
    }

    struct Limited {
        inner: MemoryPages,
        calls: u32,
    }

    impl ActivityPages for Limited {
        fn page_after(&mut self, after_time: f64) -> Result<ActivitiesPage, TrackError> {
            self.calls += 1;
            assert!(self.calls <= 10, "requested {} pages", self.calls);
            self.inner.page_after(after_time)
        }
    }

    #[test]
    fn test_bad_cursor_key() {
        let err = MemoryPages::from_json(r#"{"soon": {"activities": []}}"#).unwrap_err();
        assert!(matches!(err, TrackError::Json(_)));
    }

    struct Counting {
        remaining: u32,
    }

    impl ActivityPages for Counting {
        fn page_after(&mut self, after_time: f64) -> Result<ActivitiesPage, TrackError> {
            self.remaining -= 1;
            let next = if self.remaining == 0 {
                None
            } else {
                Some(after_time + 1.0)
            };
            Ok(ActivitiesPage {
                activities: Vec::new(),
                paging: Paging {
                    after_time: next,
                    after_id: None,
                },
            })
        }
    }

    #[test]
    fn test_long_history_does_not_recurse() {
        let mut pages = Counting { remaining: 100_000 };
        let ids = collect_running_ids(&mut pages, 0.0).unwrap();
        assert!(ids.is_empty());
        assert_eq!(pages.remaining, 0);
    }
}
