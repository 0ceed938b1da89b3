//! Per-workspace mutual exclusion
//! Created: 2025-06-05

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::WorkspaceId;

type LockTable = DashMap<WorkspaceId, Arc<Mutex<()>>>;

/// Proof that the holder has exclusive use of one workspace. Released on drop.
#[derive(Debug)]
pub struct WorkspaceGuard {
    id: WorkspaceId,
    table: Arc<LockTable>,
    _guard: OwnedMutexGuard<()>,
}

impl WorkspaceGuard {
    pub fn id(&self) -> WorkspaceId {
        self.id
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        // Only the table and this guard hold the mutex: nobody else is waiting on it
        self.table
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}

/// Exclusion keyed by workspace id. Contention is reported, never waited on.
/// Entries live only while a guard for the workspace is held.
#[derive(Debug, Default)]
pub struct WorkspaceLocks {
    locks: Arc<LockTable>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the workspace's exclusion or fails with `ConcurrencyConflict`
    pub fn try_acquire(&self, id: WorkspaceId) -> Result<WorkspaceGuard> {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        match mutex.try_lock_owned() {
            Ok(guard) => Ok(WorkspaceGuard {
                id,
                table: self.locks.clone(),
                _guard: guard,
            }),
            Err(_) => {
                debug!("Workspace {} is busy", id);
                Err(Error::ConcurrencyConflict { workspace: id })
            }
        }
    }

    pub fn is_held(&self, id: WorkspaceId) -> bool {
        self.locks
            .get(&id)
            .map_or(false, |mutex| mutex.try_lock().is_err())
    }

    /// Number of workspaces with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
