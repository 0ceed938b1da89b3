//! Upload Processing Pipeline: Stage-by-Stage Execution
//! Created: 2025-06-05
//!
//! Ingests one payload into a workspace: validate, expand, merge, classify,
//! diagnose, summarise, then commit the files and hand the summary to the
//! lifecycle manager as a single atomic update. Anomalies in the payload end
//! up as diagnostics; only validation, contention and storage failures abort
//! a run, and those leave both the workspace record and its files untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::{
    analyzer::PriorityResolver,
    archive::{resolve_entry_path, ArchiveCodec, DefaultArchiveCodec},
    config::PipelineConfig,
    error::{Error, Result},
    scanner::{ContentClassifier, TexProducedDetector},
    types::{
        Diagnostic, FileEntry, ProcessingSummary, Severity, UploadStatus, Workspace, WorkspaceId,
    },
    utils::{
        metrics::{self, Metrics},
        RunLog,
    },
    workspace::{LifecycleManager, LocalWorkspaceFiles, WorkspaceGuard, WorkspaceStore, WriteJournal},
};

pub mod stages;

use stages::{
    expand::base_name, ClassifiedFile, ClassifyStage, DiagnoseStage, ExpandResult, ExpandStage, ExpandedFile,
};

/// Workspace files by path, as read at the start of a run
type FileSet = BTreeMap<String, Vec<u8>>;

/// An uploaded file or archive
#[derive(Debug, Clone)]
pub struct Payload {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Existing workspace, or `None` to create one
    pub workspace_id: Option<WorkspaceId>,
    pub owner: String,
    /// Target category hint; falls back to the workspace's own
    pub category: Option<String>,
    pub payload: Option<Payload>,
}

/// Upload pipeline that orchestrates expansion, classification and
/// diagnosis for one workspace at a time
pub struct UploadPipeline {
    config: PipelineConfig,
    lifecycle: LifecycleManager,
    expand: ExpandStage,
    classify: ClassifyStage,
    metrics: Metrics,
}

impl UploadPipeline {
    /// Pipeline storing files under `config.workspace_root`
    pub fn new(config: PipelineConfig, store: Arc<dyn WorkspaceStore>) -> Result<Self> {
        let files = Arc::new(LocalWorkspaceFiles::new(config.workspace_root.clone()));
        let lifecycle = LifecycleManager::new(store, files);
        let codec = Arc::new(DefaultArchiveCodec::new(config.size_limits.max_total_bytes));
        Self::with_components(config, lifecycle, codec)
    }

    pub fn with_components(
        config: PipelineConfig,
        lifecycle: LifecycleManager,
        codec: Arc<dyn ArchiveCodec>,
    ) -> Result<Self> {
        let metrics = Metrics::new();
        let classifier = Arc::new(ContentClassifier::new());
        let pool = if config.parallel_classification {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("classify-{}", i))
                .build()
                .map_err(Error::internal)?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            expand: ExpandStage::new(codec, classifier.clone(), config.max_archive_depth),
            classify: ClassifyStage::new(classifier, TexProducedDetector::new(config.detector), pool),
            lifecycle: lifecycle.with_metrics(metrics.clone()),
            metrics,
            config,
        })
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes one upload and returns the summary now attached to the
    /// workspace.
    #[instrument(skip(self, request), fields(workspace = ?request.workspace_id))]
    pub async fn process(&self, request: UploadRequest) -> Result<ProcessingSummary> {
        info!("🚦 Starting upload processing");

        // Stage 0: Payload validation, before anything is touched
        let payload = self.stage_0_validate(request.payload)?;

        let id = match request.workspace_id {
            Some(id) => id,
            None => {
                self.lifecycle
                    .create(&request.owner, request.category.as_deref())
                    .await?
            }
        };
        let (guard, workspace) = self.lifecycle.begin_run(id).await?;

        self.metrics.increment_counter(metrics::RUNS_STARTED);
        let timer = format!("run_{}", id);
        self.metrics.start_timer(&timer);
        let result = self.run(&guard, workspace, payload, request.category).await;
        self.metrics.end_timer(&timer);

        match &result {
            Ok(summary) => {
                self.metrics.increment_counter(metrics::RUNS_COMPLETED);
                info!("✅ Workspace {} processed: {:?}", id, summary.status);
            }
            Err(e) => {
                self.metrics.increment_counter(metrics::RUNS_FAILED);
                info!("Workspace {} run aborted: {}", id, e);
            }
        }
        result
    }

    async fn run(
        &self,
        guard: &WorkspaceGuard,
        workspace: Workspace,
        payload: Payload,
        category: Option<String>,
    ) -> Result<ProcessingSummary> {
        let start = Utc::now();
        let log = RunLog::new();
        let category = category.or_else(|| workspace.category.clone());
        log.info(format!(
            "Processing '{}' ({} bytes) into workspace {}",
            payload.name,
            payload.data.len(),
            guard.id()
        ));

        let id = guard.id();
        let existing = self.load_files(id).await?;
        let expanded = self.stage_1_expand(payload, &existing, &log).await?;
        let merged = self.stage_2_merge(&existing, expanded.files, &log);
        let classified = self.stage_3_classify(merged, &log).await?;
        let (files, diagnostics) =
            self.stage_4_diagnose(&classified, expanded.diagnostics, category.as_deref());
        let summary = self.stage_5_summarize(start, files, diagnostics, &log);

        // Every write is undone unless the record update lands
        let mut journal = WriteJournal::new(id);
        let committed = match self.stage_6_commit(&mut journal, &existing, &classified).await {
            Ok(()) => self
                .lifecycle
                .complete_run(guard, workspace, summary.clone())
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            journal.rollback(self.lifecycle.files().as_ref()).await;
            return Err(e);
        }
        Ok(summary)
    }

    /// Stage 0: rejects absent, unnamed or unstorable payloads
    fn stage_0_validate(&self, payload: Option<Payload>) -> Result<Payload> {
        let payload = payload
            .ok_or_else(|| Error::ValidationError("Missing file/archive payload".into()))?;
        let name = base_name(&payload.name);
        if name.is_empty() {
            return Err(Error::ValidationError(
                "File argument missing filename or file not selected".into(),
            ));
        }
        if resolve_entry_path(name).is_none() {
            return Err(Error::ValidationError(format!(
                "File name '{}' cannot be stored in a workspace",
                name
            )));
        }
        Ok(payload)
    }

    /// Reads every file already in the workspace
    async fn load_files(&self, id: WorkspaceId) -> Result<FileSet> {
        let files = self.lifecycle.files();
        let mut loaded = FileSet::new();
        for file in files.list(id).await? {
            let data = files.read(id, &file.path).await?;
            loaded.insert(file.path, data);
        }
        Ok(loaded)
    }

    /// Stage 1: archive expansion
    #[instrument(skip(self, payload, existing, log), fields(name = %payload.name))]
    async fn stage_1_expand(&self, payload: Payload, existing: &FileSet, log: &RunLog) -> Result<ExpandResult> {
        info!("📦 Stage 1: Payload Expansion");
        let stage = self.expand.clone();
        let Payload { name, data } = payload;
        let taken: BTreeSet<String> = existing.keys().cloned().collect();
        let expanded = tokio::task::spawn_blocking(move || stage.execute(&name, data, &taken)).await?;

        for archive in &expanded.expanded_archives {
            log.info(format!("Unpacked archive {}", archive));
        }
        log.info(format!("{} file(s) to store", expanded.files.len()));
        Ok(expanded)
    }

    /// Stage 2: overlay the expanded files on the workspace's current files
    fn stage_2_merge(&self, existing: &FileSet, expanded: Vec<ExpandedFile>, log: &RunLog) -> FileSet {
        info!("🗂️ Stage 2: Merging Files");
        let mut merged = existing.clone();
        let mut replaced = 0;
        for file in expanded {
            if merged.insert(file.path, file.data).is_some() {
                replaced += 1;
            }
        }
        log.info(format!(
            "{} file(s) in workspace, {} replaced by this upload",
            merged.len(),
            replaced
        ));
        merged
    }

    /// Stage 3: classify the merged files
    async fn stage_3_classify(&self, merged: FileSet, log: &RunLog) -> Result<Vec<ClassifiedFile>> {
        info!("🔎 Stage 3: Classification");
        let contents: Vec<(String, Vec<u8>)> = merged.into_iter().collect();
        let stage = self.classify.clone();
        let classified = tokio::task::spawn_blocking(move || stage.execute(contents)).await?;
        self.metrics.add(metrics::FILES_CLASSIFIED, classified.len() as u64);

        for file in &classified {
            log.info(format!("{}: {} ({} bytes)", file.path, file.file_type.display_name(), file.size()));
            if let Some(literal) = file.provenance.as_ref().and_then(|p| p.evidence()) {
                log.info(format!("{}: TeX provenance evidence '{}'", file.path, literal.trim_end()));
            }
        }
        Ok(classified)
    }

    /// Stage 4: apply the severity policy; diagnostics come back warnings first
    fn stage_4_diagnose(
        &self,
        classified: &[ClassifiedFile],
        mut diagnostics: Vec<Diagnostic>,
        category: Option<&str>,
    ) -> (Vec<FileEntry>, Vec<Diagnostic>) {
        info!("🩺 Stage 4: Diagnosis");
        let stage = DiagnoseStage::new(self.config.limits_for(category));
        let (per_file, submission) = stage.execute(classified, category);

        let entries: Vec<FileEntry> = classified
            .iter()
            .zip(per_file)
            .map(|(file, file_diagnostics)| {
                diagnostics.extend(file_diagnostics.iter().cloned());
                FileEntry {
                    path: file.path.clone(),
                    size: file.size(),
                    checksum: file.checksum.clone(),
                    file_type: file.file_type,
                    diagnostics: file_diagnostics,
                }
            })
            .collect();
        diagnostics.extend(submission);

        // Stable, so detection order is kept within each severity
        diagnostics.sort_by_key(|d| d.severity);
        (entries, diagnostics)
    }

    /// Stage 5: status, primary type and the immutable summary
    fn stage_5_summarize(
        &self,
        start: DateTime<Utc>,
        files: Vec<FileEntry>,
        diagnostics: Vec<Diagnostic>,
        log: &RunLog,
    ) -> ProcessingSummary {
        info!("🧾 Stage 5: Summary");
        let resolver = PriorityResolver::new();
        let status = UploadStatus::from_diagnostics(&diagnostics);
        let primary_type = resolver.primary_type(files.iter().map(|f| f.file_type));

        for diagnostic in &diagnostics {
            match diagnostic.severity {
                Severity::Warning => log.warn(diagnostic.to_string()),
                Severity::Fatal => log.error(diagnostic.to_string()),
            }
        }
        if resolver.is_unprocessable(files.iter().map(|f| f.file_type)) {
            log.error("Submission contains files that cannot be processed");
        }
        let fatals = diagnostics.iter().filter(|d| d.severity == Severity::Fatal).count() as u64;
        self.metrics.add(metrics::FATAL_DIAGNOSTICS, fatals);
        self.metrics
            .add(metrics::WARNING_DIAGNOSTICS, diagnostics.len() as u64 - fatals);

        log.info(format!(
            "Status {:?}; primary type {}",
            status,
            primary_type.map_or("none", |t| t.display_name())
        ));

        ProcessingSummary {
            start_datetime: start,
            completion_datetime: Utc::now(),
            files,
            diagnostics,
            status,
            primary_type,
            log: log.render(),
        }
    }

    /// Stage 6: write new, replaced and repaired files into the file area
    async fn stage_6_commit(
        &self,
        journal: &mut WriteJournal,
        existing: &FileSet,
        classified: &[ClassifiedFile],
    ) -> Result<()> {
        info!("💾 Stage 6: Committing Files");
        let files = self.lifecycle.files();
        for file in classified {
            let previous = existing.get(&file.path);
            if previous == Some(&file.data) {
                continue;
            }
            journal
                .write(files.as_ref(), &file.path, &file.data, previous.cloned())
                .await?;
        }
        info!("Wrote {} file(s)", journal.len());
        Ok(())
    }
}
