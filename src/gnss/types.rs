use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

/// GNSS system a satellite belongs to. The display form is the name persisted
/// in the `type` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
pub enum Constellation {
    #[strum(serialize = "GPS")]
    #[serde(rename = "GPS")]
    Gps,
    #[strum(serialize = "GLONASS")]
    #[serde(rename = "GLONASS")]
    Glonass,
    BeiDou,
    Galileo,
    #[strum(serialize = "QZSS")]
    #[serde(rename = "QZSS")]
    Qzss,
    #[strum(serialize = "SBAS")]
    #[serde(rename = "SBAS")]
    Sbas,
    Unknown,
    Other,
}

impl Constellation {
    pub const ALL: [Constellation; 8] = [
        Constellation::Gps,
        Constellation::Glonass,
        Constellation::BeiDou,
        Constellation::Galileo,
        Constellation::Qzss,
        Constellation::Sbas,
        Constellation::Unknown,
        Constellation::Other,
    ];

    /// Inverse of the display form. Names that were never written by this
    /// crate read back as `Other`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| <&'static str>::from(c) == name)
            .unwrap_or(Constellation::Other)
    }
}

/// Maps a platform constellation code to its constellation.
///
/// Codes follow the platform status API: 0 unknown, 1 GPS, 2 SBAS,
/// 3 GLONASS, 4 QZSS, 5 BeiDou, 6 Galileo. Anything else (IRNSS and codes
/// added later) is `Other`.
pub fn classify(code: i32) -> Constellation {
    match code {
        0 => Constellation::Unknown,
        1 => Constellation::Gps,
        2 => Constellation::Sbas,
        3 => Constellation::Glonass,
        4 => Constellation::Qzss,
        5 => Constellation::BeiDou,
        6 => Constellation::Galileo,
        _ => Constellation::Other,
    }
}

/// A reported device position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, absent when the source has no estimate.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// One satellite entry as emitted by the status source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSatellite {
    pub svid: i32,
    pub constellation: i32,
    pub azimuth: f64,
    pub elevation: f64,
    pub cn0: f64,
}

/// A position event may carry no fix at all.
pub type PositionFixEvent = Option<Position>;

/// A classified satellite observation, as buffered and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SatelliteObservation {
    pub svid: i32,
    pub constellation: Constellation,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub snr: f64,
}

impl From<&RawSatellite> for SatelliteObservation {
    fn from(raw: &RawSatellite) -> Self {
        Self {
            svid: raw.svid,
            constellation: classify(raw.constellation),
            azimuth_deg: raw.azimuth,
            elevation_deg: raw.elevation,
            snr: raw.cn0,
        }
    }
}
