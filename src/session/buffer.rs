use std::sync::{Mutex, PoisonError};

use crate::gnss::SatelliteObservation;

/// Single-slot holder for the latest satellite snapshot.
#[derive(Debug, Default)]
pub struct SatelliteSnapshotBuffer {
    slot: Mutex<Vec<SatelliteObservation>>,
}

impl SatelliteSnapshotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the buffered snapshot. Last snapshot wins.
    pub fn replace(&self, observations: Vec<SatelliteObservation>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = observations;
    }

    /// Takes the buffered snapshot, leaving the buffer empty.
    pub fn drain(&self) -> Vec<SatelliteObservation> {
        std::mem::take(&mut *self.slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
