// Type definitions for the upload file manager

pub mod file_type;
pub mod workspace;

pub use file_type::*;
pub use workspace::*;
