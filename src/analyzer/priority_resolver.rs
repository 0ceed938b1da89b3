//! Type priority resolution
//! Created: 2025-06-04
//!
//! A single fixed total order over the prioritised part of the type catalog.
//! The submission's primary type is the highest-ranked type among its files;
//! later entries in [`TYPE_PRIORITIES`] rank higher.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::types::Type;

/// Processing priority order, lowest first. Rank is index + 1.
pub const TYPE_PRIORITIES: [Type; 48] = [
    Type::Abort,
    Type::Failed,
    Type::AlwaysIgnore,
    Type::Input,
    Type::Bibtex,
    Type::Postscript,
    Type::DosEps,
    Type::PsFont,
    Type::PsPc,
    Type::Image,
    Type::Anim,
    Type::Html,
    Type::Pdf,
    Type::Dvi,
    Type::Notebook,
    Type::Odf,
    Type::Docx,
    Type::Tex,
    Type::Pdftex,
    Type::TexPriority2,
    Type::TexAms,
    Type::TexPriority,
    Type::TexMac,
    Type::Latex,
    Type::Latex2e,
    Type::Pdflatex,
    Type::Texinfo,
    Type::Mf,
    Type::Uuencoded,
    Type::Encrypted,
    Type::Pc,
    Type::Mac,
    Type::Csh,
    Type::Sh,
    Type::Jar,
    Type::Rar,
    Type::Xlsx,
    Type::Compressed,
    Type::Zip,
    Type::Gzipped,
    Type::Bzip2,
    Type::MultiPartMime,
    Type::Tar,
    Type::Ignore,
    Type::Readme,
    Type::Texaux,
    Type::Abs,
    Type::Include,
];

/// Types that feed the TeX compilation step
pub const TEX_TYPES: [Type; 10] = [
    Type::Latex,
    Type::Tex,
    Type::TexPriority,
    Type::TexAms,
    Type::TexMac,
    Type::Latex2e,
    Type::TexPriority2,
    Type::Texinfo,
    Type::Pdflatex,
    Type::Pdftex,
];

lazy_static! {
    static ref RANKS: HashMap<Type, u32> = TYPE_PRIORITIES
        .iter()
        .enumerate()
        .map(|(index, file_type)| (*file_type, index as u32 + 1))
        .collect();
}

/// Rank of `file_type`; 0 for anything outside the priority table
/// (`Unknown`, `Empty`).
pub fn priority_of(file_type: Type) -> u32 {
    RANKS.get(&file_type).copied().unwrap_or(0)
}

/// Rank of an external tag in any accepted spelling
pub fn tag_priority(tag: &str) -> u32 {
    priority_of(Type::parse(tag))
}

pub fn is_tex_type(file_type: Type) -> bool {
    TEX_TYPES.contains(&file_type)
}

/// TeX membership for an external tag; false for anything unrecognised
pub fn is_tex_tag(tag: &str) -> bool {
    is_tex_type(Type::parse(tag))
}

pub fn display_name(file_type: Type) -> &'static str {
    file_type.display_name()
}

/// Aggregate view over a submission's classified types
#[derive(Debug, Clone, Default)]
pub struct PriorityResolver;

impl PriorityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Highest-priority type present. Files sharing a type share its rank,
    /// so any of them may stand in as the representative.
    pub fn primary_type<I>(&self, types: I) -> Option<Type>
    where
        I: IntoIterator<Item = Type>,
    {
        types.into_iter().max_by_key(|t| priority_of(*t))
    }

    /// True when an abort/fail-class type makes the submission unprocessable
    pub fn is_unprocessable<I>(&self, types: I) -> bool
    where
        I: IntoIterator<Item = Type>,
    {
        types.into_iter().any(Type::is_abort_class)
    }

    /// True when at least one file will be handed to TeX
    pub fn has_tex_source<I>(&self, types: I) -> bool
    where
        I: IntoIterator<Item = Type>,
    {
        types.into_iter().any(is_tex_type)
    }
}
