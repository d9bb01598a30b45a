mod manual;
mod source;
mod types;

pub use manual::{ManualAccess, ManualPositionSource, ManualSatelliteSource};
pub use source::{LocationAccess, PositionSource, SatelliteStatusSource};
pub use types::{
    classify, Constellation, Position, PositionFixEvent, RawSatellite, SatelliteObservation,
};
