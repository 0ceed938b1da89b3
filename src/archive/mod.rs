//! Archive expansion
//! Created: 2025-06-05
//!
//! Unpacks gzip, tar and zip payloads into in-memory entries. Entry paths are
//! returned exactly as stored; callers must pass them through
//! [`resolve_entry_path`] before writing anything.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use tracing::{debug, instrument};

use crate::error::ArchiveError;
use crate::scanner::{SignatureScanner, SignatureType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    /// Symbolic or hard link; never materialised
    Link,
}

/// One member of an expanded archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path as recorded in the archive, unvalidated
    pub path: String,
    pub data: Vec<u8>,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
            kind: EntryKind::File,
        }
    }
}

/// Decompression collaborator. Expands exactly one level; nested archives
/// come back as ordinary entries.
pub trait ArchiveCodec: Send + Sync {
    fn expand(&self, name: &str, data: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError>;
}

/// gzip / tar / zip codec built on `flate2`, `tar` and `zip`
pub struct DefaultArchiveCodec {
    scanner: SignatureScanner,
    /// Cap on decompressed bytes per payload
    max_expanded_bytes: u64,
}

impl DefaultArchiveCodec {
    pub fn new(max_expanded_bytes: u64) -> Self {
        Self {
            scanner: SignatureScanner::new(),
            max_expanded_bytes,
        }
    }

    fn read_bounded<R: Read>(&self, reader: R, what: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut out = Vec::new();
        reader
            .take(self.max_expanded_bytes + 1)
            .read_to_end(&mut out)?;
        if out.len() as u64 > self.max_expanded_bytes {
            return Err(ArchiveError::Corrupt(format!(
                "{} expands beyond {} bytes",
                what, self.max_expanded_bytes
            )));
        }
        Ok(out)
    }

    fn expand_gzip(&self, name: &str, data: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let inner = self.read_bounded(GzDecoder::new(data), name)?;
        if self.scanner.is_tar_header(&inner) {
            return self.expand_tar(&inner);
        }
        Ok(vec![ArchiveEntry::file(strip_gzip_suffix(name), inner)])
    }

    fn expand_tar(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = tar::Archive::new(Cursor::new(data));
        let mut entries = Vec::new();
        let mut total: u64 = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                continue;
            }
            if entry_type.is_symlink() || entry_type.is_hard_link() {
                entries.push(ArchiveEntry {
                    path,
                    data: Vec::new(),
                    kind: EntryKind::Link,
                });
                continue;
            }
            if !entry_type.is_file() {
                debug!("Skipping special tar member {}", path);
                continue;
            }
            let content = self.read_bounded(&mut entry, &path)?;
            total += content.len() as u64;
            if total > self.max_expanded_bytes {
                return Err(ArchiveError::Corrupt(format!(
                    "tar expands beyond {} bytes",
                    self.max_expanded_bytes
                )));
            }
            entries.push(ArchiveEntry::file(path, content));
        }
        Ok(entries)
    }

    fn expand_zip(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;
        for index in 0..archive.len() {
            let member = archive.by_index(index)?;
            if member.is_dir() {
                continue;
            }
            let path = member.name().to_string();
            let content = self.read_bounded(member, &path)?;
            total += content.len() as u64;
            if total > self.max_expanded_bytes {
                return Err(ArchiveError::Corrupt(format!(
                    "zip expands beyond {} bytes",
                    self.max_expanded_bytes
                )));
            }
            entries.push(ArchiveEntry::file(path, content));
        }
        Ok(entries)
    }
}

impl Default for DefaultArchiveCodec {
    fn default() -> Self {
        Self::new(512 * 1024 * 1024) // 512MB
    }
}

impl ArchiveCodec for DefaultArchiveCodec {
    #[instrument(skip(self, data), fields(size = data.len()))]
    fn expand(&self, name: &str, data: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        match self.scanner.identify(data) {
            Some(SignatureType::Gzip) => self.expand_gzip(name, data),
            Some(SignatureType::Zip) => self.expand_zip(data),
            Some(SignatureType::Bzip2) => Err(ArchiveError::Unsupported("bzip2".into())),
            Some(SignatureType::UnixCompress) => Err(ArchiveError::Unsupported("compress".into())),
            Some(SignatureType::Rar) => Err(ArchiveError::Unsupported("rar".into())),
            _ if self.scanner.is_tar_header(data) => self.expand_tar(data),
            _ => Err(ArchiveError::Unsupported(format!("{} is not an archive", name))),
        }
    }
}

fn strip_gzip_suffix(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let lower = base.to_ascii_lowercase();
    if lower.ends_with(".tgz") {
        format!("{}.tar", &base[..base.len() - 4])
    } else if lower.ends_with(".gz") && base.len() > 3 {
        base[..base.len() - 3].to_string()
    } else {
        base.to_string()
    }
}

/// Normalises an archive member path relative to the workspace root.
///
/// Returns `None` for absolute paths, drive-qualified paths, NUL bytes and any
/// path whose `..` components climb above the root.
pub fn resolve_entry_path(raw: &str) -> Option<String> {
    if raw.contains('\0') {
        return None;
    }
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') {
        return None;
    }
    let bytes = unified.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return None;
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
