//! Sources driven by hand, used by the replay host and by tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::source::{LocationAccess, PositionSource, SatelliteStatusSource};
use super::types::{PositionFixEvent, RawSatellite};
use crate::session::{FixSink, SnapshotSink};

#[derive(Debug, Clone, Default)]
pub struct ManualAccess {
    granted: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
}

impl ManualAccess {
    pub fn granted() -> Self {
        let access = Self::default();
        access.grant();
        access
    }

    pub fn denied() -> Self {
        Self::default()
    }

    pub fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    pub fn revoke(&self) {
        self.granted.store(false, Ordering::SeqCst);
    }

    /// Number of times access was requested.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl LocationAccess for ManualAccess {
    fn has_location_access(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_location_access(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct PositionSlot {
    sink: Option<FixSink>,
    interval: Option<Duration>,
}

/// Position source whose fixes are pushed with [`ManualPositionSource::emit`].
/// Clones share the same subscription.
#[derive(Clone, Default)]
pub struct ManualPositionSource {
    slot: Arc<Mutex<PositionSlot>>,
}

impl ManualPositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a fix to the subscriber. Returns false when nobody listens.
    pub fn emit(&self, fix: PositionFixEvent) -> bool {
        let sink = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
            .clone();
        match sink {
            Some(sink) => {
                sink.deliver(fix);
                true
            }
            None => false,
        }
    }

    /// Interval requested by the current subscriber.
    pub fn interval(&self) -> Option<Duration> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .interval
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
            .is_some()
    }
}

impl PositionSource for ManualPositionSource {
    fn subscribe(&mut self, interval: Duration, sink: FixSink) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.sink = Some(sink);
        slot.interval = Some(interval);
    }

    fn unsubscribe(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.sink = None;
        slot.interval = None;
    }
}

/// Satellite status source whose snapshots are pushed with
/// [`ManualSatelliteSource::emit`]. Clones share the same subscription.
#[derive(Clone, Default)]
pub struct ManualSatelliteSource {
    sink: Arc<Mutex<Option<SnapshotSink>>>,
}

impl ManualSatelliteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a snapshot to the subscriber. Returns false when nobody listens.
    pub fn emit(&self, satellites: &[RawSatellite]) -> bool {
        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => {
                sink.deliver(satellites);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl SatelliteStatusSource for ManualSatelliteSource {
    fn subscribe(&mut self, sink: SnapshotSink) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    fn unsubscribe(&mut self) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
