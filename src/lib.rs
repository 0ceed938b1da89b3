//! Main Library File for the Upload File Manager
//! Provides a pipeline-based architecture for receiving submission
//! uploads, unpacking archives, classifying content and tracking the
//! workspace each submission lives in.

// Configuration and Core Pipeline
pub mod config;
pub mod error;
pub mod hash_utils;
pub mod pipeline;
pub mod types;

// Archive unpacking
pub mod archive;

// Classification and provenance detection
pub mod scanner;

// Type priority resolution
pub mod analyzer;

// Workspace records, file areas and lifecycle
pub mod workspace;

// Shared Utilities
pub mod utils;

// Re-exports for crate consumers
pub use analyzer::PriorityResolver;
pub use config::{load_config_file, DetectorConfig, PipelineConfig, SizeLimits};
pub use error::{ArchiveError, Error, Result, StorageError};
pub use pipeline::{Payload, UploadPipeline, UploadRequest};
pub use scanner::{ContentClassifier, Provenance, TexProducedDetector};
pub use types::{
    Diagnostic, FileEntry, ProcessingSummary, Severity, Type, UploadStatus, Workspace, WorkspaceId,
    WorkspaceState,
};
pub use utils::{Metrics, RunLog};
pub use workspace::{InMemoryWorkspaceStore, LifecycleManager, LocalWorkspaceFiles, WorkspaceStore};
