//! TeX-provenance detection for PDF and PostScript
//! Created: 2025-06-05
//!
//! Heuristic check for whether a PDF or PS/EPS file was produced by a TeX
//! toolchain. Markers are tried in a fixed order over a bounded window first
//! (the trailer/info region of a PDF, the header comments of a PS file), then
//! over the rest of the file up to the configured scan limit.
//!
//! Known limits are kept as they are: Cairo-produced PDFs count as TeX output,
//! and TeX output with no creator line and no Computer Modern subsets is
//! missed.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

use lazy_static::lazy_static;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::DetectorConfig;

/// Outcome of a provenance check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "literal", rename_all = "snake_case")]
pub enum Provenance {
    NotDetected,
    /// TeX origin with the literal text that gave it away
    Evidence(String),
    /// TeX origin without a specific literal to report
    Detected,
}

impl Provenance {
    pub fn is_positive(&self) -> bool {
        !matches!(self, Provenance::NotDetected)
    }

    pub fn evidence(&self) -> Option<&str> {
        match self {
            Provenance::Evidence(literal) => Some(literal),
            _ => None,
        }
    }
}

struct Marker {
    name: &'static str,
    pattern: Regex,
    /// Report the matched text, or only that something matched
    literal: bool,
}

fn marker(name: &'static str, pattern: &str, literal: bool) -> Marker {
    Marker {
        name,
        pattern: Regex::new(pattern).unwrap(),
        literal,
    }
}

lazy_static! {
    static ref PDF_MARKERS: Vec<Marker> = vec![
        marker("creator-dvips", r"(?-u)Creator:\s+dvips", true),
        marker("creator-tex", r"(?-u)Creator:\s+TeX\b", true),
        marker("creator-latex", r"(?-u)Creator:\s+LaTeX\b", true),
        marker("info-creator", r"(?-u)/Creator\s*\((?:dvips|TeX\b|LaTeX\b)[^)]*\)", true),
        marker("producer-dvipdfm", r"(?-u)Producer:\s+x?dvipdfmx?", true),
        marker("producer-pdftex", r"(?-u)Producer:\s+pdfe?TeX", true),
        marker("info-producer", r"(?-u)/Producer\s*\((?:x?dvipdfmx?|pdfe?TeX|LuaTeX)[^)]*\)", true),
        marker("xmp-producer", r"(?-u)<pdf:Producer>\s*(?:x?dvipdfmx?|pdfe?TeX|LuaTeX)[^<]*", true),
        marker("ptex-banner", r"(?-u)/PTEX\.Fullbanner", true),
        marker("cm-font-subset", r"(?-u)[A-Z]{6}\+CMR", true),
        marker("cairo-font", r"(?-u)CairoFont-\d+-\d+", true),
        marker("cairo-producer", r"(?-u)(?:/Producer\s*\(|Producer:\s+|<pdf:Producer>)cairo", false),
    ];

    static ref PS_MARKERS: Vec<Marker> = vec![
        marker("creator-dvips", r"(?m-u)^%%Creator:\s*dvips[^\n]*\n", true),
        marker("creator-tex", r"(?m-u)^%%Creator:[^\n]*\bTeX\b[^\n]*\n", true),
        marker("dvips-comment", r"(?m-u)^%DVIPS[^\n]*\n", true),
        marker("cm-font-subset", r"(?m-u)^%RBIBeginFontSubset:\s*[A-Z]{6}\+CMR\d*\n", true),
        marker("texdict", r"(?-u)TeXDict\s+begin", false),
    ];
}

const DOS_EPS_MAGIC: &[u8] = b"\xc5\xd0\xd3\xc6";

/// Bounded-window TeX-provenance detector
#[derive(Debug, Clone, Default)]
pub struct TexProducedDetector {
    config: DetectorConfig,
}

impl TexProducedDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Checks a PDF on disk. Missing or unreadable files are not TeX-produced.
    #[instrument(skip(self))]
    pub fn check_pdf(&self, path: &Path) -> Provenance {
        match self.read_sample(path) {
            Ok((body, tail)) => self.scan_pdf_sample(&body, &tail),
            Err(e) => {
                debug!("PDF provenance check skipped for {}: {}", path.display(), e);
                Provenance::NotDetected
            }
        }
    }

    /// Checks a PostScript/EPS file on disk.
    #[instrument(skip(self))]
    pub fn check_ps(&self, path: &Path) -> Provenance {
        match self.read_sample(path) {
            Ok((body, _)) => self.scan_ps(&body),
            Err(e) => {
                debug!("PS provenance check skipped for {}: {}", path.display(), e);
                Provenance::NotDetected
            }
        }
    }

    /// PDF check over content already in memory
    pub fn scan_pdf(&self, data: &[u8]) -> Provenance {
        let body = &data[..data.len().min(self.config.max_scan_bytes)];
        let tail = &data[data.len() - data.len().min(self.config.window_bytes)..];
        self.scan_pdf_sample(body, tail)
    }

    /// PostScript check over content already in memory
    pub fn scan_ps(&self, data: &[u8]) -> Provenance {
        let data = &data[..data.len().min(self.config.max_scan_bytes)];
        let Some(ps) = postscript_section(data) else {
            return Provenance::NotDetected;
        };
        let header = header_lines(ps, self.config.ps_header_lines);
        scan_regions(&PS_MARKERS, &[header, ps])
    }

    fn scan_pdf_sample(&self, body: &[u8], tail: &[u8]) -> Provenance {
        let head = &body[..body.len().min(self.config.window_bytes)];
        scan_regions(&PDF_MARKERS, &[tail, head, body])
    }

    /// Reads up to `max_scan_bytes` from the start, plus the last
    /// `window_bytes` of the file when those lie beyond the limit.
    fn read_sample(&self, path: &Path) -> io::Result<(Vec<u8>, Vec<u8>)> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();

        let mut body = Vec::new();
        Read::by_ref(&mut file)
            .take(self.config.max_scan_bytes as u64)
            .read_to_end(&mut body)?;

        let window = (self.config.window_bytes as u64).min(len) as usize;
        let tail = if body.len() as u64 >= len {
            body[body.len() - window.min(body.len())..].to_vec()
        } else {
            let mut tail = Vec::with_capacity(window);
            file.seek(SeekFrom::End(-(window as i64)))?;
            file.read_to_end(&mut tail)?;
            tail
        };
        Ok((body, tail))
    }
}

fn scan_regions(markers: &[Marker], regions: &[&[u8]]) -> Provenance {
    for region in regions {
        for marker in markers {
            if let Some(found) = marker.pattern.find(region) {
                debug!("TeX provenance marker '{}' matched", marker.name);
                return if marker.literal {
                    Provenance::Evidence(String::from_utf8_lossy(found.as_bytes()).into_owned())
                } else {
                    Provenance::Detected
                };
            }
        }
    }
    Provenance::NotDetected
}

/// The PostScript part of a file; DOS EPS files wrap it behind a binary
/// header giving its offset and length.
fn postscript_section(data: &[u8]) -> Option<&[u8]> {
    if !data.starts_with(DOS_EPS_MAGIC) {
        return Some(data);
    }
    let field = |at: usize| -> Option<usize> {
        let bytes = data.get(at..at + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
    };
    let offset = field(4)?;
    let length = field(8)?;
    let end = offset.saturating_add(length).min(data.len());
    data.get(offset..end)
}

fn header_lines(data: &[u8], lines: usize) -> &[u8] {
    let end = data
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(lines.saturating_sub(1))
        .map_or(data.len(), |(i, _)| i + 1);
    &data[..end]
}

/// PDF check with default scan bounds
pub fn check_tex_produced_pdf(path: &Path) -> Provenance {
    TexProducedDetector::default().check_pdf(path)
}

/// PostScript check with default scan bounds
pub fn check_tex_produced_ps(path: &Path) -> Provenance {
    TexProducedDetector::default().check_ps(path)
}
