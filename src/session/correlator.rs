use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::error::SessionError;
use super::sink::{FixSink, Route, SnapshotSink, WriteJob};
use super::types::{SessionState, SessionStats, StatsCounters};
use crate::config::Config;
use crate::gnss::{LocationAccess, PositionSource, SatelliteStatusSource};
use crate::store::{Store, TransactionalWriter};

struct ActiveSession {
    route: Arc<Route>,
    worker: JoinHandle<()>,
    stats: Arc<StatsCounters>,
}

/// Session controller pairing every position fix with the satellite snapshot
/// buffered when it arrived.
///
/// Writes run on a dedicated worker thread that owns the store, so event
/// delivery never waits on a commit.
pub struct EventCorrelator {
    config: Config,
    access: Arc<dyn LocationAccess>,
    positions: Box<dyn PositionSource>,
    satellites: Box<dyn SatelliteStatusSource>,
    session: Option<ActiveSession>,
}

impl EventCorrelator {
    pub fn new(
        config: Config,
        access: Arc<dyn LocationAccess>,
        positions: Box<dyn PositionSource>,
        satellites: Box<dyn SatelliteStatusSource>,
    ) -> Self {
        Self {
            config,
            access,
            positions,
            satellites,
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.session {
            Some(_) => SessionState::Collecting,
            None => SessionState::Idle,
        }
    }

    /// Counters of the running session, zero when idle.
    pub fn stats(&self) -> SessionStats {
        self.session
            .as_ref()
            .map(|s| s.stats.snapshot())
            .unwrap_or_default()
    }

    /// Number of satellites currently buffered, zero when idle.
    pub fn buffered_satellites(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.route.buffered())
            .unwrap_or(0)
    }

    /// Opens the store and subscribes to both sources.
    ///
    /// Without location access, access is requested from the host and the
    /// session stays idle.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyCollecting);
        }

        if !self.access.has_location_access() {
            log::warn!("Location access not granted, requesting it");
            self.access.request_location_access();
            return Err(SessionError::AuthorizationDenied);
        }

        let database = &self.config.database;
        let store = Store::open(&database.path, database.schema_version)?;
        let stats = Arc::new(StatsCounters::default());
        let (tx, rx) = mpsc::channel();

        let worker = {
            let stats = stats.clone();
            let writer = TransactionalWriter::new(store);
            thread::Builder::new()
                .name("gnss-writer".to_string())
                .spawn(move || run_writer(writer, rx, stats))?
        };

        let route = Arc::new(Route::new(tx));
        let interval = self.config.session.sampling_interval();
        self.satellites.subscribe(SnapshotSink::new(route.clone()));
        self.positions.subscribe(interval, FixSink::new(route.clone()));

        self.session = Some(ActiveSession {
            route,
            worker,
            stats,
        });

        log::info!(
            "Collecting into {} (fix interval {:?})",
            database.path.display(),
            interval
        );
        Ok(())
    }

    /// Unsubscribes from both sources, waits for queued writes and closes the
    /// store. Returns the final counters, or `None` if already idle.
    pub fn stop(&mut self) -> Option<SessionStats> {
        let Some(session) = self.session.take() else {
            log::debug!("Stop requested while idle");
            return None;
        };

        self.positions.unsubscribe();
        self.satellites.unsubscribe();
        session.route.close();

        if session.worker.join().is_err() {
            log::error!("Writer worker panicked");
        }

        let stats = session.stats.snapshot();
        log::info!(
            "Collection stopped: {} fixes, {} satellites written, {} writes failed",
            stats.fixes_written,
            stats.satellites_written,
            stats.writes_failed
        );
        Some(stats)
    }
}

impl Drop for EventCorrelator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_writer(
    mut writer: TransactionalWriter,
    jobs: Receiver<WriteJob>,
    stats: Arc<StatsCounters>,
) {
    for job in jobs {
        match writer.write(&job.fix, &job.observations) {
            Ok(id) => {
                stats.record_written(job.observations.len());
                log::debug!(
                    "Stored fix {} at {} with {} satellites",
                    id,
                    job.fix.timestamp,
                    job.observations.len()
                );
            }
            Err(e) => {
                stats.record_failed();
                log::error!("Failed to store fix at {}: {}", job.fix.timestamp, e);
            }
        }
    }

    if let Err(e) = writer.close() {
        log::error!("Failed to close store: {}", e);
    }
}
