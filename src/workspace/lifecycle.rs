//! Workspace lifecycle management
//! Created: 2025-06-05
//!
//! Owns every state transition of a workspace. Each mutation runs under the
//! workspace's exclusion and is persisted with a single store update, so no
//! partially applied transition is ever visible.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use super::files::WorkspaceFiles;
use super::locks::{WorkspaceGuard, WorkspaceLocks};
use super::store::WorkspaceStore;
use crate::error::{Error, Result};
use crate::types::{ProcessingSummary, Workspace, WorkspaceId, WorkspaceState};
use crate::utils::metrics::{self, Metrics};

/// Workspace state machine over a record store and a file area
#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn WorkspaceStore>,
    files: Arc<dyn WorkspaceFiles>,
    locks: Arc<WorkspaceLocks>,
    metrics: Metrics,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn WorkspaceStore>, files: Arc<dyn WorkspaceFiles>) -> Self {
        Self {
            store,
            files,
            locks: Arc::new(WorkspaceLocks::new()),
            metrics: Metrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn files(&self) -> &Arc<dyn WorkspaceFiles> {
        &self.files
    }

    fn acquire(&self, id: WorkspaceId) -> Result<WorkspaceGuard> {
        self.locks.try_acquire(id).map_err(|e| {
            self.metrics.increment_counter(metrics::CONFLICTS);
            e
        })
    }

    async fn fetch(&self, id: WorkspaceId) -> Result<Workspace> {
        self.store.retrieve(id).await?.ok_or(Error::NotFound(id))
    }

    /// Creates a new ACTIVE workspace
    #[instrument(skip(self))]
    pub async fn create(&self, owner: &str, category: Option<&str>) -> Result<WorkspaceId> {
        let workspace = Workspace::new(owner, category.map(str::to_string));
        let id = self.store.store(workspace).await?;
        info!("Created workspace {}", id);
        Ok(id)
    }

    /// Workspace record with its latest processing summary. Read-only.
    pub async fn summary(&self, id: WorkspaceId) -> Result<Workspace> {
        self.fetch(id).await
    }

    /// Applies an administrative command under the workspace's exclusion
    async fn command<F>(&self, id: WorkspaceId, operation: &'static str, apply: F) -> Result<Workspace>
    where
        F: FnOnce(&mut Workspace) -> Result<()>,
    {
        let guard = self.acquire(id)?;
        self.transition(&guard, operation, apply).await
    }

    async fn transition<F>(&self, guard: &WorkspaceGuard, operation: &'static str, apply: F) -> Result<Workspace>
    where
        F: FnOnce(&mut Workspace) -> Result<()>,
    {
        let id = guard.id();
        let mut workspace = self.fetch(id).await?;
        apply(&mut workspace)?;
        workspace.modified_datetime = Utc::now();
        self.store.update(&workspace).await?;
        info!("Workspace {} {} -> {}", id, operation, workspace.state);
        Ok(workspace)
    }

    #[instrument(skip(self))]
    pub async fn lock(&self, id: WorkspaceId) -> Result<Workspace> {
        self.command(id, "lock", |ws| {
            if matches!(ws.state, WorkspaceState::Deleted | WorkspaceState::Locked) {
                return Err(Error::InvalidTransition {
                    state: ws.state,
                    operation: "lock",
                });
            }
            ws.state_before_lock = Some(ws.state);
            ws.state = WorkspaceState::Locked;
            ws.locked = true;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn unlock(&self, id: WorkspaceId) -> Result<Workspace> {
        self.command(id, "unlock", |ws| {
            if ws.state != WorkspaceState::Locked {
                return Err(Error::InvalidTransition {
                    state: ws.state,
                    operation: "unlock",
                });
            }
            ws.state = ws.state_before_lock.take().unwrap_or(WorkspaceState::Active);
            ws.locked = false;
            Ok(())
        })
        .await
    }

    /// Marks the workspace released. Files stay in place.
    #[instrument(skip(self))]
    pub async fn release(&self, id: WorkspaceId) -> Result<Workspace> {
        self.command(id, "release", |ws| {
            if !(ws.state.is_operational() || ws.state == WorkspaceState::Locked) {
                return Err(Error::InvalidTransition {
                    state: ws.state,
                    operation: "release",
                });
            }
            ws.state = WorkspaceState::Released;
            ws.locked = false;
            ws.state_before_lock = None;
            Ok(())
        })
        .await
    }

    /// Deletes a released workspace, or any live one with `admin_override`.
    /// The record and its last summary are kept; the file area is queued
    /// for removal before the exclusion is released. Once the record says
    /// DELETED the call succeeds, even if the removal could not be queued.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: WorkspaceId, admin_override: bool) -> Result<Workspace> {
        let guard = self.acquire(id)?;
        let workspace = self
            .transition(&guard, "delete", |ws| {
                let allowed = match ws.state {
                    WorkspaceState::Deleted => false,
                    WorkspaceState::Released => true,
                    _ => admin_override,
                };
                if !allowed {
                    return Err(Error::InvalidTransition {
                        state: ws.state,
                        operation: "delete",
                    });
                }
                ws.state = WorkspaceState::Deleted;
                ws.locked = false;
                ws.state_before_lock = None;
                Ok(())
            })
            .await?;

        if let Err(e) = self.files.schedule_removal(id).await {
            warn!("Workspace {} deleted but file removal was not queued: {}", id, e);
        }
        drop(guard);
        Ok(workspace)
    }

    /// Takes the exclusion for a processing run and checks the workspace can
    /// be processed. The guard must be held until [`Self::complete_run`].
    #[instrument(skip(self))]
    pub async fn begin_run(&self, id: WorkspaceId) -> Result<(WorkspaceGuard, Workspace)> {
        let guard = self.acquire(id)?;
        let workspace = self.fetch(id).await?;
        match workspace.state {
            state if state.is_operational() => Ok((guard, workspace)),
            WorkspaceState::Locked => {
                self.metrics.increment_counter(metrics::CONFLICTS);
                Err(Error::ConcurrencyConflict { workspace: id })
            }
            state => Err(Error::InvalidTransition {
                state,
                operation: "process",
            }),
        }
    }

    /// Replaces the summary and recomputes the state in one store update
    #[instrument(skip(self, guard, workspace, summary), fields(id = %guard.id()))]
    pub async fn complete_run(
        &self,
        guard: &WorkspaceGuard,
        mut workspace: Workspace,
        summary: ProcessingSummary,
    ) -> Result<Workspace> {
        if workspace.id != Some(guard.id()) {
            return Err(Error::ValidationError(format!(
                "Run guard for workspace {} does not match record",
                guard.id()
            )));
        }
        workspace.state = summary.status.into();
        workspace.modified_datetime = summary.completion_datetime;
        workspace.last_summary = Some(summary);
        self.store.update(&workspace).await?;
        info!("Workspace {} processed -> {}", guard.id(), workspace.state);
        Ok(workspace)
    }
}
