//! File type catalog
//! Created: 2025-06-04
//!
//! The closed, versioned set of content types a submitted file can be
//! classified as. Tags and display names are a compatibility contract for
//! anything inspecting classification results, so entries are only ever
//! appended.

use std::{collections::HashMap, fmt};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Canonical content type of a submitted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Type {
    Abort,
    Failed,
    AlwaysIgnore,
    Input,
    Bibtex,
    Postscript,
    DosEps,
    PsFont,
    PsPc,
    Image,
    Anim,
    Html,
    Pdf,
    Dvi,
    Notebook,
    Odf,
    Docx,
    Tex,
    Pdftex,
    TexPriority2,
    TexAms,
    TexPriority,
    TexMac,
    Latex,
    Latex2e,
    Pdflatex,
    Texinfo,
    Mf,
    Uuencoded,
    Encrypted,
    Pc,
    Mac,
    Csh,
    Sh,
    Jar,
    Rar,
    Xlsx,
    Compressed,
    Zip,
    Gzipped,
    Bzip2,
    MultiPartMime,
    Tar,
    Ignore,
    Readme,
    Texaux,
    Abs,
    Include,
    Empty,
    Unknown,
}

/// Catalog row: type, canonical tag, display name
pub struct CatalogEntry {
    pub file_type: Type,
    pub tag: &'static str,
    pub display_name: &'static str,
}

macro_rules! catalog {
    ($($variant:ident => $tag:literal, $name:literal;)*) => {
        /// Every catalog entry, in declaration order
        pub const CATALOG: &[CatalogEntry] = &[
            $(CatalogEntry { file_type: Type::$variant, tag: $tag, display_name: $name },)*
        ];
    };
}

catalog! {
    Abort => "TYPE_ABORT", "Immediate stop";
    Failed => "TYPE_FAILED", "Failed (unrecognized binary)";
    AlwaysIgnore => "TYPE_ALWAYS_IGNORE", "Always ignore";
    Input => "TYPE_INPUT", "Input for (La)TeX";
    Bibtex => "TYPE_BIBTEX", "BiBTeX";
    Postscript => "TYPE_POSTSCRIPT", "Postscript";
    DosEps => "TYPE_DOS_EPS", "DOS EPS Binary File";
    PsFont => "TYPE_PS_FONT", "Postscript Type 1 Font";
    PsPc => "TYPE_PS_PC", "^D%! Postscript";
    Image => "TYPE_IMAGE", "Image (gif/jpg etc)";
    Anim => "TYPE_ANIM", "Animation (mpeg etc)";
    Html => "TYPE_HTML", "HTML";
    Pdf => "TYPE_PDF", "PDF";
    Dvi => "TYPE_DVI", "DVI";
    Notebook => "TYPE_NOTEBOOK", "Mathematica Notebook";
    Odf => "TYPE_ODF", "OpenDocument Format";
    Docx => "TYPE_DOCX", "Microsoft DOCX";
    Tex => "TYPE_TEX", "TeX";
    Pdftex => "TYPE_PDFTEX", "PDFTeX";
    TexPriority2 => "TYPE_TEX_priority2", "TeX (with \\end or \\bye - not starting a line)";
    TexAms => "TYPE_TEX_AMS", "AMSTeX";
    TexPriority => "TYPE_TEX_priority", "TeX (with \\end or \\bye)";
    TexMac => "TYPE_TEX_MAC", "TeX +macros (harv,lanl..)";
    Latex => "TYPE_LATEX", "LaTeX";
    Latex2e => "TYPE_LATEX2e", "LaTeX2e";
    Pdflatex => "TYPE_PDFLATEX", "PDFLaTeX";
    Texinfo => "TYPE_TEXINFO", "Texinfo";
    Mf => "TYPE_MF", "Metafont";
    Uuencoded => "TYPE_UUENCODED", "UUencoded";
    Encrypted => "TYPE_ENCRYPTED", "Encrypted";
    Pc => "TYPE_PC", "PC-ctrl-Ms";
    Mac => "TYPE_MAC", "MAC-ctrl-Ms";
    Csh => "TYPE_CSH", "CSH";
    Sh => "TYPE_SH", "SH";
    Jar => "TYPE_JAR", "JAR archive";
    Rar => "TYPE_RAR", "RAR archive";
    Xlsx => "TYPE_XLSX", "Microsoft XLSX";
    Compressed => "TYPE_COMPRESSED", "UNIX-compressed";
    Zip => "TYPE_ZIP", "ZIP-compressed";
    Gzipped => "TYPE_GZIPPED", "GZIP-compressed";
    Bzip2 => "TYPE_BZIP2", "BZIP2-compressed";
    MultiPartMime => "TYPE_MULTI_PART_MIME", "MULTI_PART_MIME";
    Tar => "TYPE_TAR", "TAR archive";
    Ignore => "TYPE_IGNORE", "user defined IGNORE";
    Readme => "TYPE_README", "override";
    Texaux => "TYPE_TEXAUX", "TeX auxiliary";
    Abs => "TYPE_ABS", "abstract";
    Include => "TYPE_INCLUDE", "keep";
    Empty => "TYPE_EMPTY", "empty";
    Unknown => "TYPE_UNKNOWN", "unknown";
}

const TAG_PREFIX: &str = "TYPE_";

lazy_static! {
    // Keys are upper-cased so lookups are case-insensitive.
    static ref BY_TAG: HashMap<String, Type> = CATALOG
        .iter()
        .map(|entry| (entry.tag.to_ascii_uppercase(), entry.file_type))
        .collect();
}

impl Type {
    fn entry(self) -> &'static CatalogEntry {
        // Rows are declared in variant order.
        &CATALOG[self as usize]
    }

    /// Canonical tag, e.g. `TYPE_LATEX2e`
    pub fn tag(self) -> &'static str {
        self.entry().tag
    }

    /// Human readable name shown in upload summaries
    pub fn display_name(self) -> &'static str {
        self.entry().display_name
    }

    /// Lower-case tag without the `TYPE_` prefix, e.g. `latex2e`
    pub fn guess_name(self) -> String {
        self.tag()[TAG_PREFIX.len()..].to_ascii_lowercase()
    }

    /// Parses a tag in any of its external spellings.
    ///
    /// `TYPE_LATEX2e`, `type_latex2e`, `LATEX2E` and `latex2e` all resolve to
    /// [`Type::Latex2e`]. Anything not in the catalog is [`Type::Unknown`].
    pub fn parse(tag: &str) -> Type {
        let upper = tag.trim().to_ascii_uppercase();
        let key = if upper.starts_with(TAG_PREFIX) {
            upper
        } else {
            format!("{}{}", TAG_PREFIX, upper)
        };
        BY_TAG.get(&key).copied().unwrap_or(Type::Unknown)
    }

    /// Error sentinels that make a submission unprocessable
    pub fn is_abort_class(self) -> bool {
        matches!(self, Type::Abort | Type::Failed)
    }

    /// Types the pipeline unpacks into individual entries
    pub fn is_archive(self) -> bool {
        matches!(self, Type::Gzipped | Type::Tar | Type::Zip)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.guess_name())
    }
}

impl From<Type> for String {
    fn from(file_type: Type) -> Self {
        file_type.guess_name()
    }
}

impl From<String> for Type {
    fn from(tag: String) -> Self {
        Type::parse(&tag)
    }
}

/// Display name for an external tag; `"unknown"` when not in the catalog.
pub fn type_name(tag: &str) -> &'static str {
    Type::parse(tag).display_name()
}
