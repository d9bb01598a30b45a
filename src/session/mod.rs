mod buffer;
mod correlator;
mod error;
mod sink;
mod types;

pub use buffer::SatelliteSnapshotBuffer;
pub use correlator::EventCorrelator;
pub use error::SessionError;
pub use sink::{FixSink, SnapshotSink};
pub use types::{SessionState, SessionStats};
