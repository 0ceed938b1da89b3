//! Workspace record store
//! Created: 2025-06-05

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{Error, Result, StorageError};
use crate::types::{Workspace, WorkspaceId};

/// Persistent record storage for workspaces.
///
/// Implementations report an unreachable backend as
/// [`StorageError::Unavailable`] and an unknown id on update as
/// [`Error::NotFound`].
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn retrieve(&self, id: WorkspaceId) -> Result<Option<Workspace>>;

    /// Persists a new record and returns the identifier assigned to it
    async fn store(&self, workspace: Workspace) -> Result<WorkspaceId>;

    async fn update(&self, workspace: &Workspace) -> Result<()>;
}

/// Process-local store, used by the CLI and tests
#[derive(Debug)]
pub struct InMemoryWorkspaceStore {
    records: RwLock<HashMap<WorkspaceId, Workspace>>,
    next_id: AtomicU64,
    available: AtomicBool,
}

impl InMemoryWorkspaceStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the backend going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("in-memory store offline".into()).into())
        }
    }
}

impl Default for InMemoryWorkspaceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkspaceStore for InMemoryWorkspaceStore {
    async fn retrieve(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        self.check_available()?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    #[instrument(skip(self, workspace), fields(owner = %workspace.owner))]
    async fn store(&self, mut workspace: Workspace) -> Result<WorkspaceId> {
        self.check_available()?;
        let id = WorkspaceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        workspace.id = Some(id);
        self.records.write().await.insert(id, workspace);
        debug!("Stored workspace {}", id);
        Ok(id)
    }

    async fn update(&self, workspace: &Workspace) -> Result<()> {
        self.check_available()?;
        let id = workspace.id.ok_or(StorageError::MissingId)?;
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => {
                *record = workspace.clone();
                Ok(())
            }
            None => Err(Error::NotFound(id)),
        }
    }
}
