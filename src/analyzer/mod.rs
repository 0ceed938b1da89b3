//! Analyzer Module
//! Created: 2025-06-04
//!
//! Aggregate analysis over a submission's classified files.

pub mod priority_resolver;

pub use self::priority_resolver::{
    display_name, is_tex_tag, is_tex_type, priority_of, tag_priority, PriorityResolver,
    TEX_TYPES, TYPE_PRIORITIES,
};
