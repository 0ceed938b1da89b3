pub mod classify;
pub mod diagnose;
pub mod expand;

pub use classify::{ClassifiedFile, ClassifyStage};
pub use diagnose::DiagnoseStage;
pub use expand::{ExpandResult, ExpandStage, ExpandedFile};
