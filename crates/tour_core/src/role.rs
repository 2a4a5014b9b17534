//! Candidate/Student role switch shared with the content pages.

use std::sync::Arc;

use anyhow::Result;
use shared::domain::Role;
use storage::{KeyValueStore, USER_ROLE_KEY};
use tokio::sync::broadcast;
use tracing::{info, warn};

const ROLE_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChanged {
    pub previous: Role,
    pub current: Role,
}

/// Reads and writes the current role and notifies subscribers on change.
pub struct RoleSwitcher {
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<RoleChanged>,
}

impl RoleSwitcher {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(ROLE_EVENT_CAPACITY);
        Self { store, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoleChanged> {
        self.events.subscribe()
    }

    /// Stored role, falling back to [`Role::Candidate`] when unset or unknown.
    pub async fn current(&self) -> Result<Role> {
        let stored = self.store.get(USER_ROLE_KEY).await?;
        Ok(match stored.as_deref() {
            None => Role::default(),
            Some(raw) => Role::parse(raw).unwrap_or_else(|| {
                warn!(stored = raw, "unknown stored role; using default");
                Role::default()
            }),
        })
    }

    pub async fn set(&self, role: Role) -> Result<Role> {
        let previous = self.current().await?;
        if previous == role {
            return Ok(role);
        }

        self.store.set(USER_ROLE_KEY, role.as_str()).await?;
        info!(%previous, current = %role, "role changed");
        // No subscribers is fine.
        let _ = self.events.send(RoleChanged {
            previous,
            current: role,
        });
        Ok(role)
    }

    pub async fn toggle(&self) -> Result<Role> {
        let current = self.current().await?;
        self.set(current.toggled()).await
    }
}
