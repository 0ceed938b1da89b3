//! Diagnosis stage
//! Created: 2025-06-05
//!
//! Fixed severity policy mapping classification results to diagnostics.

use tracing::instrument;

use super::classify::ClassifiedFile;
use crate::analyzer::PriorityResolver;
use crate::config::SizeLimits;
use crate::scanner::Provenance;
use crate::types::{Diagnostic, Type};

/// Formats that are never accepted for processing
const REJECTED_TYPES: &[Type] = &[
    Type::Docx,
    Type::Odf,
    Type::Xlsx,
    Type::Rar,
    Type::Jar,
    Type::Encrypted,
    Type::MultiPartMime,
    Type::Compressed,
    Type::Bzip2,
];

pub struct DiagnoseStage {
    limits: SizeLimits,
}

impl DiagnoseStage {
    pub fn new(limits: SizeLimits) -> Self {
        Self { limits }
    }

    /// Diagnostics for one file, in the order they are detected
    pub fn diagnose_file(&self, file: &ClassifiedFile, tex_submission: bool) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let path = file.path.as_str();

        if let Some(original) = file.converted_from {
            let style = if original == Type::Pc { "PC (CRLF)" } else { "MAC (CR)" };
            diagnostics.push(Diagnostic::warning(
                path,
                format!("Converted {} line endings to UNIX", style),
            ));
        }

        if file.size() > self.limits.max_file_bytes {
            diagnostics.push(Diagnostic::fatal(
                path,
                format!(
                    "File size {} bytes exceeds the limit of {} bytes",
                    file.size(),
                    self.limits.max_file_bytes
                ),
            ));
        }

        match file.file_type {
            Type::Empty => diagnostics.push(Diagnostic::warning(path, "File is empty")),
            Type::AlwaysIgnore => {
                diagnostics.push(Diagnostic::warning(path, "File is ignored and will not be processed"))
            }
            Type::DosEps => diagnostics.push(Diagnostic::warning(
                path,
                "File has a DOS EPS binary header; only the PostScript part is used",
            )),
            Type::Uuencoded => diagnostics.push(Diagnostic::warning(
                path,
                "Uuencoded file will not be decoded",
            )),
            Type::Abort => diagnostics.push(Diagnostic::fatal(path, "File could not be read")),
            Type::Failed => diagnostics.push(Diagnostic::fatal(
                path,
                "Unrecognized binary file; cannot be processed",
            )),
            rejected if REJECTED_TYPES.contains(&rejected) => diagnostics.push(Diagnostic::fatal(
                path,
                format!("{} files are not accepted", rejected.display_name()),
            )),
            _ => {}
        }

        if !tex_submission {
            match &file.provenance {
                Some(Provenance::Evidence(literal)) => diagnostics.push(Diagnostic::warning(
                    path,
                    format!(
                        "Appears to be TeX-produced; please submit the TeX source instead (found '{}')",
                        literal.trim_end()
                    ),
                )),
                Some(Provenance::Detected) => diagnostics.push(Diagnostic::warning(
                    path,
                    "Appears to be TeX-produced; please submit the TeX source instead",
                )),
                _ => {}
            }
        }

        diagnostics
    }

    /// Per-file diagnostics plus submission-wide ones. The returned per-file
    /// lists line up with `files`.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub fn execute(
        &self,
        files: &[ClassifiedFile],
        category: Option<&str>,
    ) -> (Vec<Vec<Diagnostic>>, Vec<Diagnostic>) {
        let tex_submission = PriorityResolver::new().has_tex_source(files.iter().map(|f| f.file_type));
        let per_file: Vec<Vec<Diagnostic>> = files
            .iter()
            .map(|file| self.diagnose_file(file, tex_submission))
            .collect();

        let mut submission = Vec::new();
        let total: u64 = files.iter().map(ClassifiedFile::size).sum();
        if total > self.limits.max_total_bytes {
            submission.push(Diagnostic::fatal(
                "",
                format!(
                    "Submission size {} bytes exceeds the limit of {} bytes",
                    total, self.limits.max_total_bytes
                ),
            ));
        }
        if category.map_or(true, |c| c.trim().is_empty()) {
            submission.push(Diagnostic::warning(
                "",
                "No category given; default size limits applied",
            ));
        }
        (per_file, submission)
    }
}
