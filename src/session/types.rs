use serde::Serialize;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Collecting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub fixes_written: u64,
    pub satellites_written: u64,
    pub writes_failed: u64,
}

impl AddAssign for SessionStats {
    fn add_assign(&mut self, other: Self) {
        self.fixes_written += other.fixes_written;
        self.satellites_written += other.satellites_written;
        self.writes_failed += other.writes_failed;
    }
}

/// Live counters shared between the correlator and its writer worker.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    fixes_written: AtomicU64,
    satellites_written: AtomicU64,
    writes_failed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_written(&self, satellites: usize) {
        self.fixes_written.fetch_add(1, Ordering::Relaxed);
        self.satellites_written
            .fetch_add(satellites as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            fixes_written: self.fixes_written.load(Ordering::Relaxed),
            satellites_written: self.satellites_written.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
        }
    }
}
