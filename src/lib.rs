//! Correlated GNSS logging: pairs every position fix with the satellite
//! snapshot visible when it arrived and stores both atomically in SQLite.

pub mod config;
pub mod gnss;
pub mod replay;
pub mod session;
pub mod store;
