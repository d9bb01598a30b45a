use std::time::Duration;

use crate::session::{FixSink, SnapshotSink};

/// Grants access to the device location.
pub trait LocationAccess: Send + Sync {
    fn has_location_access(&self) -> bool;

    /// Asks the host to prompt for access. The outcome is observed by the
    /// host, never by the caller.
    fn request_location_access(&self);
}

/// Emits position fixes into a sink at no faster than the requested interval.
pub trait PositionSource: Send {
    fn subscribe(&mut self, interval: Duration, sink: FixSink);
    fn unsubscribe(&mut self);
}

/// Emits full satellite snapshots into a sink.
pub trait SatelliteStatusSource: Send {
    fn subscribe(&mut self, sink: SnapshotSink);
    fn unsubscribe(&mut self);
}
