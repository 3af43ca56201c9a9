//! Per-target runtime state and its on-disk snapshot.
use chrono::{DateTime, Utc};

pub mod persistence;
pub mod store;

pub use persistence::{PersistedState, PersistenceError};
pub use store::StateStore;

/// Last known status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetState {
    /// `true` when the target was reachable.
    pub status: bool,
    /// Time of the most recent flip, or of the first observation.
    pub last_change_at: DateTime<Utc>,
}

impl TargetState {
    pub fn new(status: bool, last_change_at: DateTime<Utc>) -> Self {
        Self {
            status,
            last_change_at,
        }
    }
}
