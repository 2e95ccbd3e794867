/// Session Module
///
/// Tracks which database is currently active.
///
/// The slot starts empty and only `switch_database` writes it, after a test
/// connection to the target succeeded. Switches are serialized through an
/// async lock so the connect-then-commit sequence of one switch cannot
/// interleave with another. Readers take a snapshot of the active database
/// once per operation and use that snapshot throughout.

use crate::core::{AdminError, Result};
use std::sync::RwLock;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct Session {
    active: RwLock<Option<String>>,
    switching: Mutex<()>,
}

impl Session {
    /// Creates a session with no active database
    pub fn new() -> Self {
        Session::default()
    }

    /// The active database, if any
    pub fn active(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The active database, or `AdminError::NoActiveDatabase`
    pub fn require_active(&self) -> Result<String> {
        self.active().ok_or(AdminError::NoActiveDatabase)
    }

    /// Takes the switch lock. Held for the whole test-connect-then-commit sequence.
    pub async fn begin_switch(&self) -> MutexGuard<'_, ()> {
        self.switching.lock().await
    }

    /// Commits `name` as the active database and returns the previous one.
    ///
    /// Callers must have verified that `name` is connectable first.
    pub(crate) fn set_active(&self, name: &str) -> Option<String> {
        let mut slot = self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.replace(name.to_string())
    }
}
