use chrono::Local;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use super::buffer::SatelliteSnapshotBuffer;
use crate::gnss::{PositionFixEvent, RawSatellite, SatelliteObservation};
use crate::store::FixRecord;

/// A fix paired with the snapshot that was buffered when it arrived.
#[derive(Debug)]
pub(crate) struct WriteJob {
    pub fix: FixRecord,
    pub observations: Vec<SatelliteObservation>,
}

/// Entry point of one session's events.
///
/// `jobs` doubles as the open/closed gate: both sinks hold its lock while
/// touching the buffer, so once [`Route::close`] returns no event can mutate
/// the buffer or queue a write.
pub(crate) struct Route {
    jobs: Mutex<Option<Sender<WriteJob>>>,
    buffer: SatelliteSnapshotBuffer,
}

impl Route {
    pub(crate) fn new(jobs: Sender<WriteJob>) -> Self {
        Self {
            jobs: Mutex::new(Some(jobs)),
            buffer: SatelliteSnapshotBuffer::new(),
        }
    }

    fn replace_snapshot(&self, satellites: &[RawSatellite]) {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if jobs.is_none() {
            log::trace!("Dropping snapshot delivered after stop");
            return;
        }
        self.buffer
            .replace(satellites.iter().map(SatelliteObservation::from).collect());
    }

    fn correlate(&self, event: PositionFixEvent) {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = jobs.as_ref() else {
            log::trace!("Dropping fix delivered after stop");
            return;
        };

        let job = WriteJob {
            fix: FixRecord::from_event(event, &Local::now()),
            observations: self.buffer.drain(),
        };
        if let Err(e) = tx.send(job) {
            log::error!("Writer gone, fix at {} lost", e.0.fix.timestamp);
        }
    }

    /// Closes the gate and empties the buffer. Jobs already queued are left
    /// for the writer.
    pub(crate) fn close(&self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.take();
        self.buffer.drain();
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Handle given to a position source to deliver fixes.
#[derive(Clone)]
pub struct FixSink {
    route: Arc<Route>,
}

impl FixSink {
    pub(crate) fn new(route: Arc<Route>) -> Self {
        Self { route }
    }

    pub fn deliver(&self, fix: PositionFixEvent) {
        self.route.correlate(fix);
    }
}

/// Handle given to a satellite status source to deliver snapshots.
#[derive(Clone)]
pub struct SnapshotSink {
    route: Arc<Route>,
}

impl SnapshotSink {
    pub(crate) fn new(route: Arc<Route>) -> Self {
        Self { route }
    }

    pub fn deliver(&self, satellites: &[RawSatellite]) {
        self.route.replace_snapshot(satellites);
    }
}
