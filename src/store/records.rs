use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::gnss::{PositionFixEvent, SatelliteObservation};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A position fix about to be written. One per correlated write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixRecord {
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

impl FixRecord {
    /// Builds the row for a position event captured at `at`.
    ///
    /// A missing fix is still recorded, as `(0.0, 0.0)` with zero accuracy, so
    /// that the satellites seen at that moment are not lost. A fix without an
    /// accuracy estimate gets zero accuracy too.
    pub fn from_event<Tz: TimeZone>(event: PositionFixEvent, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let (latitude, longitude, accuracy) = match event {
            Some(p) => (p.latitude, p.longitude, p.accuracy.unwrap_or(0.0)),
            None => (0.0, 0.0, 0.0),
        };
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            latitude,
            longitude,
            accuracy,
        }
    }
}

/// A committed `satellite_info` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSatellite {
    pub id: i64,
    pub location_id: i64,
    #[serde(flatten)]
    pub observation: SatelliteObservation,
}

/// A committed `location_record` row with its satellites.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFix {
    pub id: i64,
    #[serde(flatten)]
    pub fix: FixRecord,
    pub satellites: Vec<StoredSatellite>,
}
