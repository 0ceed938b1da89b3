
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use filemanager::archive::DefaultArchiveCodec;
use filemanager::error::StorageError;
use filemanager::types::{UploadStatus, Workspace, WorkspaceId, WorkspaceState};
use filemanager::utils::metrics;
use filemanager::workspace::WorkspaceFiles;
use filemanager::{
    Error, InMemoryWorkspaceStore, LifecycleManager, LocalWorkspaceFiles, Result, UploadPipeline,
    WorkspaceStore,
};
use tokio::sync::Notify;

use super::{test_config, upload};
use crate::fixtures::TestFixtures;

/// Record store whose next update can be held open or made to fail
struct GatedStore {
    inner: InMemoryWorkspaceStore,
    hold_next_update: AtomicBool,
    fail_updates: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: InMemoryWorkspaceStore::new(),
            hold_next_update: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl WorkspaceStore for GatedStore {
    async fn retrieve(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        self.inner.retrieve(id).await
    }

    async fn store(&self, workspace: Workspace) -> Result<WorkspaceId> {
        self.inner.store(workspace).await
    }

    async fn update(&self, workspace: &Workspace) -> Result<()> {
        if self.hold_next_update.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("update rejected".into()).into());
        }
        self.inner.update(workspace).await
    }
}

struct Harness {
    pipeline: Arc<UploadPipeline>,
    store: Arc<GatedStore>,
    files: Arc<LocalWorkspaceFiles>,
}

fn harness(root: &std::path::Path) -> Harness {
    let store = Arc::new(GatedStore::new());
    let files = Arc::new(LocalWorkspaceFiles::new(root));
    let lifecycle = LifecycleManager::new(store.clone(), files.clone());
    let pipeline = UploadPipeline::with_components(
        test_config(root),
        lifecycle,
        Arc::new(DefaultArchiveCodec::default()),
    )
    .unwrap();
    Harness {
        pipeline: Arc::new(pipeline),
        store,
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_locked_workspace_conflicts_until_unlocked() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let lifecycle = h.pipeline.lifecycle();
        let id = lifecycle.create("author@example.org", Some("hep-th")).await.unwrap();

        lifecycle.lock(id).await.unwrap();
        let result = h
            .pipeline
            .process(upload(Some(id), "main.tex", TestFixtures::latex_source()))
            .await;
        assert!(matches!(result, Err(Error::ConcurrencyConflict { workspace }) if workspace == id));
        assert!(h.files.list(id).await.unwrap().is_empty());

        lifecycle.unlock(id).await.unwrap();
        let summary = h
            .pipeline
            .process(upload(Some(id), "main.tex", TestFixtures::latex_source()))
            .await
            .unwrap();
        assert_eq!(summary.status, UploadStatus::Ready);
        assert_eq!(lifecycle.summary(id).await.unwrap().state, WorkspaceState::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_runs_exactly_one_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let id = h
            .pipeline
            .lifecycle()
            .create("author@example.org", Some("hep-th"))
            .await
            .unwrap();

        h.store.hold_next_update.store(true, Ordering::SeqCst);
        let pipeline = h.pipeline.clone();
        let first = tokio::spawn(async move {
            pipeline
                .process(upload(Some(id), "main.tex", TestFixtures::latex_source()))
                .await
        });

        // The first run now holds the workspace and waits inside its final update
        h.store.entered.notified().await;
        let second = h
            .pipeline
            .process(upload(Some(id), "other.tex", TestFixtures::latex_source()))
            .await;
        assert!(matches!(second, Err(Error::ConcurrencyConflict { .. })));
        assert!(second.unwrap_err().is_retryable());

        h.store.release.notify_one();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.files.len(), 1);
        assert_eq!(h.pipeline.metrics().get_counter(metrics::CONFLICTS), 1);

        let workspace = h.pipeline.lifecycle().summary(id).await.unwrap();
        assert_eq!(workspace.last_summary, Some(summary));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let lifecycle = h.pipeline.lifecycle();
        let id = lifecycle.create("author@example.org", Some("hep-th")).await.unwrap();

        h.pipeline
            .process(upload(Some(id), "main.tex", TestFixtures::latex_source()))
            .await
            .unwrap();
        let before = lifecycle.summary(id).await.unwrap();

        h.store.fail_updates.store(true, Ordering::SeqCst);
        let result = h.pipeline.process(upload(Some(id), "empty.tex", Vec::new())).await;
        assert!(matches!(result, Err(Error::Storage(StorageError::Unavailable(_)))));

        h.store.fail_updates.store(false, Ordering::SeqCst);
        let after = lifecycle.summary(id).await.unwrap();
        assert_eq!(after, before);
        assert_eq!(after.state, WorkspaceState::Ready);
        assert_eq!(h.pipeline.metrics().get_counter(metrics::RUNS_FAILED), 1);
    }

    #[tokio::test]
    async fn test_aborted_run_leaves_files_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let lifecycle = h.pipeline.lifecycle();
        let id = lifecycle.create("author@example.org", Some("hep-th")).await.unwrap();
        h.pipeline
            .process(upload(Some(id), "main.tex", TestFixtures::latex_source()))
            .await
            .unwrap();

        h.store.fail_updates.store(true, Ordering::SeqCst);
        let zip = TestFixtures::zip_of(&[
            ("blob.dat", b"\x00\x01\x02\x03"),
            ("main.tex", b"\\documentclass{book}\n"),
            ("figs/plot.png", &TestFixtures::png()),
        ]);
        let result = h.pipeline.process(upload(Some(id), "paper.zip", zip)).await;
        assert!(matches!(result, Err(Error::Storage(_))));

        let paths: Vec<String> = h.files.list(id).await.unwrap().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["main.tex"]);
        assert_eq!(h.files.read(id, "main.tex").await.unwrap(), TestFixtures::latex_source());
        assert!(!h.files.source_dir(id).join("figs").exists());

        h.store.fail_updates.store(false, Ordering::SeqCst);
        let summary = h
            .pipeline
            .process(upload(Some(id), "refs.bib", b"@article{key, title={T}}\n".to_vec()))
            .await
            .unwrap();
        assert_eq!(summary.status, UploadStatus::Ready);
        let paths: Vec<&str> = summary.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.tex", "refs.bib"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryWorkspaceStore::new());
        let pipeline = UploadPipeline::new(test_config(dir.path()), store.clone()).unwrap();
        let id = pipeline.lifecycle().create("author@example.org", None).await.unwrap();

        store.set_available(false);
        let result = pipeline.process(upload(Some(id), "main.tex", TestFixtures::latex_source())).await;
        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(!result.unwrap_err().is_retryable());

        store.set_available(true);
        let workspace = pipeline.lifecycle().summary(id).await.unwrap();
        assert_eq!(workspace.state, WorkspaceState::Active);
        assert!(workspace.last_summary.is_none());
    }

    #[tokio::test]
    async fn test_released_workspace_cannot_be_processed() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let lifecycle = h.pipeline.lifecycle();
        let id = lifecycle.create("author@example.org", None).await.unwrap();

        lifecycle.release(id).await.unwrap();
        let result = h.pipeline.process(upload(Some(id), "main.tex", TestFixtures::latex_source())).await;
        assert!(matches!(
            result,
            Err(Error::InvalidTransition { state: WorkspaceState::Released, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_files_but_keeps_summary() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let lifecycle = h.pipeline.lifecycle();
        let id = lifecycle.create("author@example.org", Some("hep-th")).await.unwrap();

        let summary = h
            .pipeline
            .process(upload(Some(id), "main.tex", TestFixtures::latex_source()))
            .await
            .unwrap();
        assert!(h.files.source_dir(id).join("main.tex").exists());

        lifecycle.release(id).await.unwrap();
        lifecycle.delete(id, false).await.unwrap();
        h.files.flush_removals().await;

        assert!(!h.files.source_dir(id).exists());
        let record = lifecycle.summary(id).await.unwrap();
        assert_eq!(record.state, WorkspaceState::Deleted);
        assert_eq!(record.last_summary, Some(summary));
    }

    #[tokio::test]
    async fn test_unknown_workspace_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let result = h
            .pipeline
            .process(upload(Some(WorkspaceId(99)), "main.tex", TestFixtures::latex_source()))
            .await;
        assert!(matches!(result, Err(Error::NotFound(WorkspaceId(99)))));
    }
}
