use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::{sleep_until, Instant};

use super::parser::{AccessChange, Action, Script, SessionCommand};
use crate::config::Config;
use crate::gnss::{ManualAccess, ManualPositionSource, ManualSatelliteSource};
use crate::session::{EventCorrelator, SessionStats};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub steps_run: usize,
    pub interrupted: bool,
    pub stats: SessionStats,
}

/// Plays a script against a correlator wired to manual sources. Location
/// access starts out denied.
///
/// Starting and stopping a session opens the store and joins the writer
/// thread, so both run on the blocking pool rather than a runtime worker.
pub struct Runner {
    pub script: Script,
    pub correlator: Arc<Mutex<EventCorrelator>>,
    pub access: ManualAccess,
    pub positions: ManualPositionSource,
    pub satellites: ManualSatelliteSource,
}

impl Runner {
    pub fn new(config: Config, script: Script) -> Self {
        let access = ManualAccess::denied();
        let positions = ManualPositionSource::new();
        let satellites = ManualSatelliteSource::new();
        let correlator = EventCorrelator::new(
            config,
            Arc::new(access.clone()),
            Box::new(positions.clone()),
            Box::new(satellites.clone()),
        );

        Self {
            script,
            correlator: Arc::new(Mutex::new(correlator)),
            access,
            positions,
            satellites,
        }
    }

    /// Runs every step at its offset, then stops any session left open.
    /// Ctrl-C ends the replay early.
    pub async fn run(mut self) -> ReplaySummary {
        let start = Instant::now();
        let mut summary = ReplaySummary::default();
        let steps = std::mem::take(&mut self.script.steps);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        for (i, step) in steps.iter().enumerate() {
            if let Some(offset) = step.time {
                let interrupted = tokio::select! {
                    _ = sleep_until(start + offset) => false,
                    _ = &mut ctrl_c => true,
                };
                if interrupted {
                    log::warn!("Replay interrupted before step {}", i);
                    summary.interrupted = true;
                    break;
                }
            }

            self.apply(i, &step.action, &mut summary).await;
            summary.steps_run += 1;
        }

        if let Some(stats) = self.stop_session().await {
            summary.stats += stats;
        }
        summary
    }

    async fn with_correlator<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut EventCorrelator) -> R + Send + 'static,
        R: Send + 'static,
    {
        let correlator = self.correlator.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut correlator = correlator.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut correlator)
        })
        .await;

        match result {
            Ok(r) => Some(r),
            Err(e) => {
                log::error!("Correlator task failed: {}", e);
                None
            }
        }
    }

    async fn stop_session(&self) -> Option<SessionStats> {
        self.with_correlator(|c| c.stop()).await.flatten()
    }

    async fn apply(&mut self, i: usize, action: &Action, summary: &mut ReplaySummary) {
        log::debug!("step {}: {}", i, action.name());

        match action {
            Action::Access(AccessChange::Grant) => self.access.grant(),
            Action::Access(AccessChange::Revoke) => self.access.revoke(),
            Action::Session(SessionCommand::Start) => {
                if let Some(Err(e)) = self.with_correlator(|c| c.start()).await {
                    log::warn!("step {}: start refused: {}", i, e);
                }
            }
            Action::Session(SessionCommand::Stop) => {
                if let Some(stats) = self.stop_session().await {
                    summary.stats += stats;
                }
            }
            Action::Satellites(satellites) => {
                if !self.satellites.emit(satellites) {
                    log::debug!("step {}: not collecting, snapshot dropped", i);
                }
            }
            Action::Fix(fix) => {
                if !self.positions.emit(*fix) {
                    log::debug!("step {}: not collecting, fix dropped", i);
                }
            }
        }
    }
}
