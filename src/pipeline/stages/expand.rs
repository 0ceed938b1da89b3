//! Payload expansion stage
//! Created: 2025-06-05
//!
//! Turns an uploaded payload into the list of files to store. Recognised
//! archives are unpacked (nested ones up to the configured depth); members
//! with unsafe paths or link types become fatal diagnostics and are dropped,
//! as are files whose path would need an existing file to be a directory or
//! the other way round.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::archive::{resolve_entry_path, ArchiveCodec, EntryKind};
use crate::scanner::ContentClassifier;
use crate::types::Diagnostic;

/// A file ready to be written to the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedFile {
    /// Validated workspace-relative path
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ExpandResult {
    pub files: Vec<ExpandedFile>,
    pub diagnostics: Vec<Diagnostic>,
    /// Names of the archives that were unpacked, outermost first
    pub expanded_archives: Vec<String>,
}

struct Pending {
    /// Directory the member's paths are relative to
    prefix: String,
    path: String,
    data: Vec<u8>,
    depth: usize,
}

#[derive(Clone)]
pub struct ExpandStage {
    codec: Arc<dyn ArchiveCodec>,
    classifier: Arc<ContentClassifier>,
    max_depth: usize,
}

impl ExpandStage {
    pub fn new(codec: Arc<dyn ArchiveCodec>, classifier: Arc<ContentClassifier>, max_depth: usize) -> Self {
        Self {
            codec,
            classifier,
            max_depth,
        }
    }

    /// Expands `data` uploaded as `name` into a workspace already holding
    /// the files in `existing`. Later members overwrite earlier ones with the
    /// same path.
    #[instrument(skip(self, data, existing), fields(size = data.len()))]
    pub fn execute(&self, name: &str, data: Vec<u8>, existing: &BTreeSet<String>) -> ExpandResult {
        let mut result = ExpandResult::default();
        let mut queue = vec![Pending {
            prefix: String::new(),
            path: base_name(name).to_string(),
            data,
            depth: 0,
        }];

        while let Some(item) = queue.pop() {
            let file_type = self.classifier.classify(&item.path, &item.data);
            if !file_type.is_archive() {
                push_file(&mut result.files, item.path, item.data);
                continue;
            }
            if item.depth >= self.max_depth {
                result.diagnostics.push(Diagnostic::warning(
                    item.path.clone(),
                    format!("Nested archive not unpacked beyond depth {}", self.max_depth),
                ));
                push_file(&mut result.files, item.path, item.data);
                continue;
            }

            let entries = match self.codec.expand(&item.path, &item.data) {
                Ok(entries) => entries,
                Err(e) => {
                    result.diagnostics.push(Diagnostic::fatal(
                        item.path.clone(),
                        format!("Archive could not be expanded: {}", e),
                    ));
                    continue;
                }
            };
            debug!("{} ({}) holds {} entries", item.path, file_type, entries.len());
            result.expanded_archives.push(item.path.clone());

            // Reverse so the stack yields members in archive order
            let mut children = Vec::with_capacity(entries.len());
            for entry in entries {
                let joined = format!("{}{}", item.prefix, entry.path);
                if entry.kind == EntryKind::Link {
                    result.diagnostics.push(Diagnostic::fatal(
                        joined,
                        "Archive member is a link; links are not allowed",
                    ));
                    continue;
                }
                let Some(path) = resolve_entry_path(&joined) else {
                    result.diagnostics.push(Diagnostic::fatal(
                        joined,
                        "Archive member path escapes the workspace root",
                    ));
                    continue;
                };
                children.push(Pending {
                    prefix: parent_prefix(&path),
                    path,
                    data: entry.data,
                    depth: item.depth + 1,
                });
            }
            children.reverse();
            queue.extend(children);
        }

        let files = std::mem::take(&mut result.files);
        result.files = drop_path_conflicts(files, existing, &mut result.diagnostics);
        result
    }
}

/// Keeps files in order, rejecting any whose path collides with a file or
/// directory already taken
fn drop_path_conflicts(
    files: Vec<ExpandedFile>,
    existing: &BTreeSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<ExpandedFile> {
    let mut taken = existing.clone();
    let mut kept = Vec::with_capacity(files.len());
    for file in files {
        if let Some(other) = path_conflict(&taken, &file.path) {
            diagnostics.push(Diagnostic::fatal(
                file.path.clone(),
                format!("Path conflicts with '{}'; a file and a directory cannot share a name", other),
            ));
            continue;
        }
        taken.insert(file.path.clone());
        kept.push(file);
    }
    kept
}

/// A taken path that is a directory prefix of `path`, or that has `path` as one
fn path_conflict(taken: &BTreeSet<String>, path: &str) -> Option<String> {
    for (index, _) in path.match_indices('/') {
        let ancestor = &path[..index];
        if taken.contains(ancestor) {
            return Some(ancestor.to_string());
        }
    }
    let prefix = format!("{}/", path);
    taken
        .range(prefix.clone()..)
        .next()
        .filter(|other| other.starts_with(&prefix))
        .cloned()
}

fn push_file(files: &mut Vec<ExpandedFile>, path: String, data: Vec<u8>) {
    if let Some(existing) = files.iter_mut().find(|f| f.path == path) {
        existing.data = data;
    } else {
        files.push(ExpandedFile { path, data });
    }
}

/// Final component of an uploaded file name, whatever separator the client used
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

fn parent_prefix(path: &str) -> String {
    match path.rfind('/') {
        Some(index) => path[..=index].to_string(),
        None => String::new(),
    }
}
