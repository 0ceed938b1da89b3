//! Content classifier
//! Created: 2025-06-04
//!
//! Maps a file name and its bytes to one catalog [`Type`]. Rules are an
//! ordered list of `(predicate, type)` pairs evaluated top-down; the first
//! predicate that holds decides. Name-based ignores come first, then binary
//! signatures, then extension rules, then text sniffing, and the plain-text
//! fallback last.

use std::{borrow::Cow, path::Path};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::signature_scanner::{SignatureScanner, SignatureType};
use crate::types::Type;

/// Bytes inspected when deciding whether content is binary
const BINARY_PROBE_BYTES: usize = 8 * 1024;
/// Bytes inspected for header-style markers (HTML, MIME, notebooks)
const HEAD_BYTES: usize = 4 * 1024;

const TEXAUX_EXTENSIONS: &[&str] = &[
    "sty", "cls", "clo", "cfg", "def", "fd", "bst", "bbl", "aux", "ind", "idx", "ilg", "glo",
    "gls", "toc", "lof", "lot", "log", "out", "nav", "snm", "brf", "tfm", "vf", "pk", "enc",
    "map", "ax",
];

lazy_static! {
    static ref TEX_SCRATCH: Regex = Regex::new(r"^(?:(?:head|body)\.tmp|missfont\.log)$")
        .unwrap();
    static ref MIME_VERSION: Regex = Regex::new(r"(?mi)^MIME-Version:").unwrap();
    static ref MIME_MULTIPART: Regex =
        Regex::new(r"(?i)Content-Type:\s*multipart/").unwrap();
    static ref UUENCODE_BEGIN: Regex =
        Regex::new(r"\A\s*begin [0-7]{3,4} \S+").unwrap();
    static ref HTML_TAG: Regex =
        Regex::new(r"(?i)<(?:!doctype\s+html|html)[\s>]").unwrap();
    static ref PDFOUTPUT: Regex =
        Regex::new(r"(?m)^[^%\n]*\\pdfoutput\s*=\s*1").unwrap();
    static ref DOCUMENTCLASS: Regex =
        Regex::new(r"(?m)^[^%\n]*\\documentclass\b").unwrap();
    static ref DOCUMENTSTYLE: Regex =
        Regex::new(r"(?m)^[^%\n]*\\documentstyle\b").unwrap();
    static ref AMSTEX: Regex = Regex::new(
        r"(?m)^[^%\n]*(?:\\input\s+amstex\b|\\documentstyle\s*(?:\[[^\]]*\])?\s*\{amsppt\})"
    )
    .unwrap();
    static ref TEXINFO: Regex = Regex::new(r"(?m)^\\input\s+texinfo\b").unwrap();
    static ref TEX_MACROS: Regex = Regex::new(
        r"(?m)^[^%\n]*\\input\s+(?:harvmac|lanlmac|phyzzx|mtexsis|jnl|reforder|psfig)\b"
    )
    .unwrap();
    static ref END_AT_LINE_START: Regex =
        Regex::new(r"(?m)^\\(?:end|bye)\b").unwrap();
    static ref END_ANYWHERE: Regex =
        Regex::new(r"(?m)^[^%\n]*\\(?:end|bye)\b").unwrap();
    static ref PLAIN_TEX: Regex = Regex::new(
        r"(?m)^\s*\\(?:def|magnification|font|input|parindent|hsize|vsize|begin)\b"
    )
    .unwrap();
    static ref METAFONT: Regex =
        Regex::new(r"\bbeginchar\s*\(|\bmode_setup\b").unwrap();
}

/// Everything a rule predicate may look at
pub struct Probe<'a> {
    pub name: &'a str,
    /// Final path component
    pub base_name: &'a str,
    /// Lower-cased extension without the dot; empty when absent
    pub extension: String,
    pub data: &'a [u8],
    pub text: Cow<'a, str>,
    scanner: &'a SignatureScanner,
}

impl<'a> Probe<'a> {
    fn new(name: &'a str, data: &'a [u8], scanner: &'a SignatureScanner) -> Self {
        let base_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let extension = base_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        Self {
            name,
            base_name,
            extension,
            data,
            text: String::from_utf8_lossy(data),
            scanner,
        }
    }

    fn has(&self, signature: SignatureType) -> bool {
        self.scanner.has_signature(self.data, signature)
    }

    fn head(&self) -> &str {
        let mut end = self.text.len().min(HEAD_BYTES);
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        &self.text[..end]
    }

    fn first_line(&self) -> &str {
        self.text.lines().next().unwrap_or("")
    }

    fn zip_member_starts_with(&self, prefix: &[u8]) -> bool {
        self.scanner
            .first_zip_member(self.data)
            .map_or(false, |member| member.starts_with(prefix))
    }

    fn is_binary(&self) -> bool {
        let window = &self.data[..self.data.len().min(BINARY_PROBE_BYTES)];
        if window.contains(&0) {
            return true;
        }
        let control = window
            .iter()
            .filter(|b| **b < 0x20 && !matches!(**b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b))
            .count();
        control * 10 > window.len() * 3
    }
}

/// One classification rule
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub file_type: Type,
    pub predicate: fn(&Probe<'_>) -> bool,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("file_type", &self.file_type)
            .finish()
    }
}

const fn rule(name: &'static str, file_type: Type, predicate: fn(&Probe<'_>) -> bool) -> Rule {
    Rule {
        name,
        file_type,
        predicate,
    }
}

/// The default rule table, in evaluation order
pub fn default_rules() -> Vec<Rule> {
    vec![
        // Name-based
        rule("macos-metadata", Type::AlwaysIgnore, |p| {
            p.name.split(['/', '\\']).any(|c| c == "__MACOSX")
                || p.base_name == ".DS_Store"
                || p.base_name.starts_with("._")
        }),
        rule("tex-scratch", Type::AlwaysIgnore, |p| {
            TEX_SCRATCH.is_match(p.base_name) || p.extension == "xyc"
        }),
        rule("readme", Type::Readme, |p| p.base_name == "00README.XXX"),
        rule("empty", Type::Empty, |p| p.data.is_empty()),
        // Binary signatures
        rule("dos-eps", Type::DosEps, |p| p.has(SignatureType::DosEps)),
        rule("gzip", Type::Gzipped, |p| p.has(SignatureType::Gzip)),
        rule("compress", Type::Compressed, |p| p.has(SignatureType::UnixCompress)),
        rule("bzip2", Type::Bzip2, |p| p.has(SignatureType::Bzip2)),
        rule("rar", Type::Rar, |p| p.has(SignatureType::Rar)),
        rule("odf", Type::Odf, |p| p.zip_member_starts_with(b"mimetype")),
        rule("docx", Type::Docx, |p| {
            p.has(SignatureType::Zip) && (p.extension == "docx" || p.zip_member_starts_with(b"word/"))
        }),
        rule("xlsx", Type::Xlsx, |p| {
            p.has(SignatureType::Zip) && (p.extension == "xlsx" || p.zip_member_starts_with(b"xl/"))
        }),
        rule("jar", Type::Jar, |p| {
            p.has(SignatureType::Zip) && (p.extension == "jar" || p.zip_member_starts_with(b"META-INF/"))
        }),
        rule("zip", Type::Zip, |p| p.has(SignatureType::Zip)),
        rule("pdf", Type::Pdf, |p| p.has(SignatureType::Pdf)),
        rule("ps-pc", Type::PsPc, |p| p.has(SignatureType::PsPc)),
        rule("ps-font", Type::PsFont, |p| {
            p.has(SignatureType::PsFontAscii) || p.has(SignatureType::PsFontBinary)
        }),
        rule("postscript", Type::Postscript, |p| p.has(SignatureType::Postscript)),
        rule("dvi", Type::Dvi, |p| p.has(SignatureType::Dvi)),
        rule("image", Type::Image, |p| {
            p.has(SignatureType::Gif)
                || p.has(SignatureType::Png)
                || p.has(SignatureType::Jpeg)
                || p.has(SignatureType::TiffLittleEndian)
                || p.has(SignatureType::TiffBigEndian)
        }),
        rule("animation", Type::Anim, |p| {
            p.has(SignatureType::MpegVideo)
                || p.has(SignatureType::MpegStream)
                || (p.data.starts_with(b"RIFF") && p.has(SignatureType::Avi))
                || p.has(SignatureType::QuickTime)
        }),
        rule("tar", Type::Tar, |p| p.scanner.is_tar_header(p.data)),
        // Extension-based
        rule("abstract", Type::Abs, |p| p.extension == "abs"),
        rule("bibtex", Type::Bibtex, |p| p.extension == "bib"),
        rule("tex-auxiliary", Type::Texaux, |p| {
            TEXAUX_EXTENSIONS.contains(&p.extension.as_str())
        }),
        rule("notebook", Type::Notebook, |p| {
            p.extension == "nb"
                || p.head().contains("Content-type: application/mathematica")
                || p.head().starts_with("Notebook[{")
        }),
        // Anything left that is not text cannot be processed
        rule("unrecognized-binary", Type::Failed, |p| p.is_binary()),
        // Text sniffing
        rule("pgp", Type::Encrypted, |p| {
            p.text.trim_start().starts_with("-----BEGIN PGP MESSAGE-----")
        }),
        rule("multipart-mime", Type::MultiPartMime, |p| {
            MIME_VERSION.is_match(p.head()) && MIME_MULTIPART.is_match(p.head())
        }),
        rule("uuencoded", Type::Uuencoded, |p| UUENCODE_BEGIN.is_match(p.head())),
        rule("html", Type::Html, |p| HTML_TAG.is_match(p.head())),
        rule("csh", Type::Csh, |p| p.text.starts_with("#!") && p.first_line().contains("csh")),
        rule("sh", Type::Sh, |p| {
            p.text.starts_with("#!") && (p.first_line().ends_with("/sh") || p.first_line().contains("bash"))
        }),
        rule("dos-line-endings", Type::Pc, |p| p.data.windows(2).any(|w| w == b"\r\n")),
        rule("mac-line-endings", Type::Mac, |p| p.data.contains(&b'\r')),
        // TeX family, most specific first
        rule("pdflatex", Type::Pdflatex, |p| {
            DOCUMENTCLASS.is_match(&p.text) && PDFOUTPUT.is_match(&p.text)
        }),
        rule("amstex", Type::TexAms, |p| AMSTEX.is_match(&p.text)),
        rule("latex2e", Type::Latex2e, |p| DOCUMENTCLASS.is_match(&p.text)),
        rule("latex209", Type::Latex, |p| DOCUMENTSTYLE.is_match(&p.text)),
        rule("texinfo", Type::Texinfo, |p| TEXINFO.is_match(&p.text)),
        rule("tex-macros", Type::TexMac, |p| TEX_MACROS.is_match(&p.text)),
        rule("pdftex", Type::Pdftex, |p| PDFOUTPUT.is_match(&p.text)),
        rule("tex-end-line-start", Type::TexPriority, |p| END_AT_LINE_START.is_match(&p.text)),
        rule("tex-end", Type::TexPriority2, |p| END_ANYWHERE.is_match(&p.text)),
        rule("plain-tex", Type::Tex, |p| PLAIN_TEX.is_match(&p.text)),
        rule("metafont", Type::Mf, |p| METAFONT.is_match(&p.text)),
        // Fallback: readable text, presumably a fragment \input by the main file
        rule("text", Type::Input, |_| true),
    ]
}

/// Deterministic classifier over an ordered rule table
pub struct ContentClassifier {
    scanner: SignatureScanner,
    rules: Vec<Rule>,
}

impl ContentClassifier {
    pub fn new() -> Self {
        Self {
            scanner: SignatureScanner::new(),
            rules: default_rules(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Inserts a rule ahead of the rule named `before`, or at the end
    /// (still ahead of nothing) when no such rule exists.
    pub fn insert_rule_before(&mut self, before: &str, new_rule: Rule) {
        let index = self
            .rules
            .iter()
            .position(|r| r.name == before)
            .unwrap_or(self.rules.len());
        self.rules.insert(index, new_rule);
    }

    /// Classifies `data` stored under `name`
    pub fn classify(&self, name: &str, data: &[u8]) -> Type {
        self.classify_with_rule(name, data).0
    }

    /// Classification together with the name of the deciding rule
    pub fn classify_with_rule(&self, name: &str, data: &[u8]) -> (Type, &'static str) {
        let probe = Probe::new(name, data, &self.scanner);
        for rule in &self.rules {
            if (rule.predicate)(&probe) {
                debug!("{} classified as {} by rule '{}'", name, rule.file_type, rule.name);
                return (rule.file_type, rule.name);
            }
        }
        // Only reachable with a custom table lacking a catch-all
        (Type::Unknown, "none")
    }

    /// Reads and classifies a file; unreadable files map to [`Type::Abort`].
    pub fn classify_path(&self, path: &Path) -> Type {
        match std::fs::read(path) {
            Ok(data) => {
                let name = path.to_string_lossy();
                self.classify(&name, &data)
            }
            Err(e) => {
                warn!("Cannot read {} for classification: {}", path.display(), e);
                Type::Abort
            }
        }
    }
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower-case tag of a file's type, e.g. `latex2e`
pub fn guess(path: &Path) -> String {
    ContentClassifier::new().classify_path(path).guess_name()
}
