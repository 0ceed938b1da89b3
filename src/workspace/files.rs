//! Workspace file area
//! Created: 2025-06-05
//!
//! Each workspace keeps its files under `<root>/<id>/src`. Every path handed
//! in is re-validated here, so nothing reaches the disk outside that
//! directory even if a caller skipped the archive checks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{fs, task::JoinHandle};
use tracing::{debug, instrument, warn};

use crate::archive::resolve_entry_path;
use crate::error::{Error, Result, StorageError};
use crate::types::WorkspaceId;

/// A file present in a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Workspace-relative, `/`-separated
    pub path: String,
    pub size: u64,
}

/// Storage for the files belonging to each workspace
#[async_trait]
pub trait WorkspaceFiles: Send + Sync {
    async fn write(&self, id: WorkspaceId, path: &str, data: &[u8]) -> Result<()>;

    async fn read(&self, id: WorkspaceId, path: &str) -> Result<Vec<u8>>;

    /// All files, sorted by path
    async fn list(&self, id: WorkspaceId) -> Result<Vec<StoredFile>>;

    /// Removes one file; a missing file is not an error
    async fn remove(&self, id: WorkspaceId, path: &str) -> Result<()>;

    /// Queues removal of the whole file area; returns once queued
    async fn schedule_removal(&self, id: WorkspaceId) -> Result<()>;
}

fn file_area_error(path: &Path, source: std::io::Error) -> Error {
    StorageError::FileArea {
        path: path.display().to_string(),
        source,
    }
    .into()
}

/// Writes made by one processing run, so they can be undone if the run aborts
#[derive(Debug)]
pub struct WriteJournal {
    id: WorkspaceId,
    /// Each written path with the content it replaced, in write order
    entries: Vec<(String, Option<Vec<u8>>)>,
}

impl WriteJournal {
    pub fn new(id: WorkspaceId) -> Self {
        Self {
            id,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes `data` to `path`. `previous` is the content being replaced,
    /// `None` when the path is new.
    pub async fn write(
        &mut self,
        files: &dyn WorkspaceFiles,
        path: &str,
        data: &[u8],
        previous: Option<Vec<u8>>,
    ) -> Result<()> {
        // Recorded first so a partial write is undone too
        self.entries.push((path.to_string(), previous));
        files.write(self.id, path, data).await
    }

    /// Restores every replaced file and removes every new one, newest first
    pub async fn rollback(self, files: &dyn WorkspaceFiles) {
        debug!("Rolling back {} write(s) in workspace {}", self.entries.len(), self.id);
        for (path, previous) in self.entries.into_iter().rev() {
            let result = match previous {
                Some(data) => files.write(self.id, &path, &data).await,
                None => files.remove(self.id, &path).await,
            };
            if let Err(e) = result {
                warn!("Could not roll back {} in workspace {}: {}", path, self.id, e);
            }
        }
    }
}

/// File area on the local filesystem
#[derive(Debug)]
pub struct LocalWorkspaceFiles {
    root: PathBuf,
    removals: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalWorkspaceFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            removals: Mutex::new(Vec::new()),
        }
    }

    fn workspace_dir(&self, id: WorkspaceId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Directory holding a workspace's files
    pub fn source_dir(&self, id: WorkspaceId) -> PathBuf {
        self.workspace_dir(id).join("src")
    }

    fn resolve(&self, id: WorkspaceId, path: &str) -> Result<PathBuf> {
        let relative = resolve_entry_path(path).ok_or_else(|| {
            Error::ValidationError(format!("Path escapes workspace root: {}", path))
        })?;
        Ok(self.source_dir(id).join(relative))
    }

    /// Waits for every queued removal to finish
    pub async fn flush_removals(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.removals.lock());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("File area removal task failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl WorkspaceFiles for LocalWorkspaceFiles {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn write(&self, id: WorkspaceId, path: &str, data: &[u8]) -> Result<()> {
        let target = self.resolve(id, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| file_area_error(parent, e))?;
        }
        fs::write(&target, data)
            .await
            .map_err(|e| file_area_error(&target, e))
    }

    async fn read(&self, id: WorkspaceId, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(id, path)?;
        fs::read(&target).await.map_err(|e| file_area_error(&target, e))
    }

    async fn list(&self, id: WorkspaceId) -> Result<Vec<StoredFile>> {
        let base = self.source_dir(id);
        let mut files = Vec::new();
        if fs::metadata(&base).await.is_err() {
            return Ok(files);
        }

        let mut pending = vec![base.clone()];
        while let Some(dir) = pending.pop() {
            let mut reader = fs::read_dir(&dir).await.map_err(|e| file_area_error(&dir, e))?;
            while let Some(entry) = reader.next_entry().await.map_err(|e| file_area_error(&dir, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| file_area_error(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let size = entry.metadata().await.map_err(|e| file_area_error(&path, e))?.len();
                    let relative = path
                        .strip_prefix(&base)
                        .map_err(Error::internal)?
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    files.push(StoredFile { path: relative, size });
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn remove(&self, id: WorkspaceId, path: &str) -> Result<()> {
        let target = self.resolve(id, path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(file_area_error(&target, e)),
        }

        // Prune directories the file leaves empty
        let base = self.source_dir(id);
        let mut dir = target.parent();
        while let Some(current) = dir {
            if current == base.as_path() || !current.starts_with(&base) || fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn schedule_removal(&self, id: WorkspaceId) -> Result<()> {
        let dir = self.workspace_dir(id);
        let handle = tokio::spawn(async move {
            match fs::remove_dir_all(&dir).await {
                Ok(()) => debug!("Removed file area {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove file area {}: {}", dir.display(), e),
            }
        });
        self.removals.lock().push(handle);
        Ok(())
    }
}
