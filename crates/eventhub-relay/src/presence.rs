//! Active-user roster for the support pool.
//!
//! A user becomes "active" the first time they send a chat message and stays
//! active until the process restarts. Admins see the roster as a `userList`
//! event whenever it may have changed, when they connect, and on request.

use std::collections::BTreeSet;
use tracing::{debug, error};

use eventhub_core::{Identity, Role, RosterEntry, ServerEvent, UserId};

use crate::error::RelayError;
use crate::registry::ConnectionRegistry;
use crate::storage::Directory;

#[derive(Debug, Default)]
pub struct Presence {
    active: BTreeSet<UserId>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `sender` spoke. Admins never enter the active set.
    /// Returns true if the sender is a user (the roster must be refreshed).
    pub fn record_sender(&mut self, sender: &Identity) -> bool {
        match sender.role {
            Role::User => {
                self.active.insert(sender.user_id);
                true
            }
            Role::Admin => false,
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.active.contains(&user_id)
    }

    pub fn active_users(&self) -> Vec<UserId> {
        self.active.iter().copied().collect()
    }

    /// Resolve the current roster with a single directory call.
    pub fn roster(&self, directory: &dyn Directory) -> Result<Vec<RosterEntry>, RelayError> {
        if self.active.is_empty() {
            return Ok(Vec::new());
        }
        directory.resolve(&self.active_users()).map_err(RelayError::Lookup)
    }

    /// Push the roster to every admin connection. Returns how many admins
    /// were reached.
    pub fn refresh_and_broadcast(
        &self,
        directory: &dyn Directory,
        registry: &ConnectionRegistry,
    ) -> Result<usize, RelayError> {
        let admins = registry.all_admin_connections();
        let roster = self.roster(directory)?;

        let mut reached = 0;
        for conn in admins {
            if registry.send(conn, ServerEvent::UserList(roster.clone())) {
                reached += 1;
            }
        }
        debug!("Roster of {} users sent to {reached} admins", roster.len());
        Ok(reached)
    }

    /// Like [`Presence::refresh_and_broadcast`], but a lookup failure only
    /// costs this cycle.
    pub fn broadcast_or_log(&self, directory: &dyn Directory, registry: &ConnectionRegistry) {
        if let Err(e) = self.refresh_and_broadcast(directory, registry) {
            error!("Skipping roster broadcast: {e}");
        }
    }
}
