//! Workspace Module
//! Created: 2025-06-05
//!
//! Record storage, the on-disk file area, per-workspace exclusion and the
//! lifecycle state machine built on them.

pub mod files;
pub mod lifecycle;
pub mod locks;
pub mod store;

pub use self::{
    files::{LocalWorkspaceFiles, StoredFile, WorkspaceFiles, WriteJournal},
    lifecycle::LifecycleManager,
    locks::{WorkspaceGuard, WorkspaceLocks},
    store::{InMemoryWorkspaceStore, WorkspaceStore},
};
