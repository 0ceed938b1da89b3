//! Workspace records and processing results
//! Created: 2025-06-04

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file_type::Type;

/// Identifier assigned by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkspaceId(pub u64);

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceState {
    Active,
    Ready,
    ReadyWithWarnings,
    Errors,
    Locked,
    Released,
    Deleted,
}

impl WorkspaceState {
    /// States from which a processing run may start
    pub fn is_operational(self) -> bool {
        matches!(
            self,
            WorkspaceState::Active
                | WorkspaceState::Ready
                | WorkspaceState::ReadyWithWarnings
                | WorkspaceState::Errors
        )
    }
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkspaceState::Active => "ACTIVE",
            WorkspaceState::Ready => "READY",
            WorkspaceState::ReadyWithWarnings => "READY_WITH_WARNINGS",
            WorkspaceState::Errors => "ERRORS",
            WorkspaceState::Locked => "LOCKED",
            WorkspaceState::Released => "RELEASED",
            WorkspaceState::Deleted => "DELETED",
        };
        write!(f, "{}", name)
    }
}

/// Overall readiness computed from a run's diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Ready,
    ReadyWithWarnings,
    Errors,
}

impl UploadStatus {
    /// Fatals win over warnings regardless of the order they were recorded in.
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        if diagnostics.iter().any(|d| d.severity == Severity::Fatal) {
            UploadStatus::Errors
        } else if diagnostics.iter().any(|d| d.severity == Severity::Warning) {
            UploadStatus::ReadyWithWarnings
        } else {
            UploadStatus::Ready
        }
    }
}

impl From<UploadStatus> for WorkspaceState {
    fn from(status: UploadStatus) -> Self {
        match status {
            UploadStatus::Ready => WorkspaceState::Ready,
            UploadStatus::ReadyWithWarnings => WorkspaceState::ReadyWithWarnings,
            UploadStatus::Errors => WorkspaceState::Errors,
        }
    }
}

/// Diagnostic severity; warnings sort before fatals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(rename = "warn")]
    Warning,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warn"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// A finding attached to one file during a processing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn fatal(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
    }
}

/// One classified file in the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Workspace-relative path
    pub path: String,
    pub size: u64,
    /// SHA-256 of the stored content
    pub checksum: String,
    pub file_type: Type,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileEntry {
    pub fn type_name(&self) -> &'static str {
        self.file_type.display_name()
    }
}

/// Result of one processing run. Never mutated once built; a later run
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub start_datetime: DateTime<Utc>,
    pub completion_datetime: DateTime<Utc>,
    pub files: Vec<FileEntry>,
    /// Warnings first, then fatals
    pub diagnostics: Vec<Diagnostic>,
    pub status: UploadStatus,
    /// Highest-priority type among the files, if any
    pub primary_type: Option<Type>,
    pub log: String,
}

impl ProcessingSummary {
    pub fn has_errors(&self) -> bool {
        self.status == UploadStatus::Errors
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn fatals(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Fatal)
    }

    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Server-side container for one submission attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// `None` until the record store assigns one
    pub id: Option<WorkspaceId>,
    pub owner: String,
    /// Target category; drives oversize thresholds
    pub category: Option<String>,
    pub created_datetime: DateTime<Utc>,
    pub modified_datetime: DateTime<Utc>,
    pub state: WorkspaceState,
    pub locked: bool,
    /// State to restore on unlock
    pub state_before_lock: Option<WorkspaceState>,
    pub last_summary: Option<ProcessingSummary>,
}

impl Workspace {
    pub fn new(owner: impl Into<String>, category: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            owner: owner.into(),
            category,
            created_datetime: now,
            modified_datetime: now,
            state: WorkspaceState::Active,
            locked: false,
            state_before_lock: None,
            last_summary: None,
        }
    }
}
