//! Binary signature detection
//! Created: 2025-06-04
//!
//! Leading-byte magic numbers for the binary formats the classifier knows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureType {
    Gzip,
    UnixCompress,
    Bzip2,
    Zip,
    Rar,
    Pdf,
    DosEps,
    PsPc,
    PsFontAscii,
    PsFontBinary,
    Postscript,
    Dvi,
    Gif,
    Png,
    Jpeg,
    TiffLittleEndian,
    TiffBigEndian,
    MpegVideo,
    MpegStream,
    Avi,
    QuickTime,
    UstarTar,
}

#[derive(Debug, Clone)]
pub struct SignaturePattern {
    pub pattern: &'static [u8],
    /// Byte offset the pattern must appear at
    pub offset: usize,
    pub signature_type: SignatureType,
    pub description: &'static str,
}

const fn sig(
    pattern: &'static [u8],
    offset: usize,
    signature_type: SignatureType,
    description: &'static str,
) -> SignaturePattern {
    SignaturePattern {
        pattern,
        offset,
        signature_type,
        description,
    }
}

/// Default signature table. More specific patterns precede the generic ones
/// they overlap with (`%!PS-AdobeFont` before `%!`).
const DEFAULT_PATTERNS: &[SignaturePattern] = &[
    sig(b"\x1f\x8b", 0, SignatureType::Gzip, "gzip stream"),
    sig(b"\x1f\x9d", 0, SignatureType::UnixCompress, "compress(1) stream"),
    sig(b"BZh", 0, SignatureType::Bzip2, "bzip2 stream"),
    sig(b"PK\x03\x04", 0, SignatureType::Zip, "zip local file header"),
    sig(b"Rar!\x1a\x07", 0, SignatureType::Rar, "RAR archive"),
    sig(b"%PDF-", 0, SignatureType::Pdf, "PDF header"),
    sig(b"\xc5\xd0\xd3\xc6", 0, SignatureType::DosEps, "DOS EPS binary header"),
    sig(b"\x04%!", 0, SignatureType::PsPc, "PostScript with leading ^D"),
    sig(b"%!PS-AdobeFont", 0, SignatureType::PsFontAscii, "Type 1 font (PFA)"),
    sig(b"%!FontType1", 0, SignatureType::PsFontAscii, "Type 1 font (PFA)"),
    sig(b"\x80\x01", 0, SignatureType::PsFontBinary, "Type 1 font (PFB)"),
    sig(b"%!", 0, SignatureType::Postscript, "PostScript header"),
    sig(b"\xf7\x02", 0, SignatureType::Dvi, "DVI preamble"),
    sig(b"GIF87a", 0, SignatureType::Gif, "GIF image"),
    sig(b"GIF89a", 0, SignatureType::Gif, "GIF image"),
    sig(b"\x89PNG\r\n\x1a\n", 0, SignatureType::Png, "PNG image"),
    sig(b"\xff\xd8\xff", 0, SignatureType::Jpeg, "JPEG image"),
    sig(b"II*\x00", 0, SignatureType::TiffLittleEndian, "TIFF image"),
    sig(b"MM\x00*", 0, SignatureType::TiffBigEndian, "TIFF image"),
    sig(b"\x00\x00\x01\xb3", 0, SignatureType::MpegVideo, "MPEG video sequence"),
    sig(b"\x00\x00\x01\xba", 0, SignatureType::MpegStream, "MPEG program stream"),
    sig(b"AVI ", 8, SignatureType::Avi, "AVI container"),
    sig(b"ftyp", 4, SignatureType::QuickTime, "QuickTime/MP4 container"),
    sig(b"ustar", 257, SignatureType::UstarTar, "POSIX tar header"),
];

pub struct SignatureScanner {
    patterns: Vec<SignaturePattern>,
}

impl SignatureScanner {
    pub fn new() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.to_vec(),
        }
    }

    /// First signature in table order that `data` carries
    pub fn identify(&self, data: &[u8]) -> Option<SignatureType> {
        self.patterns
            .iter()
            .find(|p| Self::matches_pattern(data, p))
            .map(|p| p.signature_type)
    }

    /// Whether `data` carries any pattern of the given type
    pub fn has_signature(&self, data: &[u8], signature_type: SignatureType) -> bool {
        self.patterns
            .iter()
            .filter(|p| p.signature_type == signature_type)
            .any(|p| Self::matches_pattern(data, p))
    }

    fn matches_pattern(data: &[u8], pattern: &SignaturePattern) -> bool {
        data.get(pattern.offset..pattern.offset + pattern.pattern.len())
            .map_or(false, |window| window == pattern.pattern)
    }

    /// Validates an old-style tar header by its checksum field.
    ///
    /// Pre-POSIX archives lack the `ustar` magic, so the header checksum is
    /// the only reliable marker.
    pub fn is_tar_header(&self, data: &[u8]) -> bool {
        if self.has_signature(data, SignatureType::UstarTar) {
            return true;
        }
        let Some(header) = data.get(..512) else {
            return false;
        };
        if header[0] == 0 {
            return false;
        }
        let Some(recorded) = parse_octal(&header[148..156]) else {
            return false;
        };
        let computed: u64 = header
            .iter()
            .enumerate()
            .map(|(i, b)| if (148..156).contains(&i) { b' ' as u64 } else { *b as u64 })
            .sum();
        computed == recorded
    }

    /// Name of the first member of a zip archive, from its local file header
    pub fn first_zip_member<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        if !self.has_signature(data, SignatureType::Zip) {
            return None;
        }
        let name_len = u16::from_le_bytes([*data.get(26)?, *data.get(27)?]) as usize;
        data.get(30..30 + name_len)
    }
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(field).ok()?;
    let digits = text.trim_matches(|c: char| c == '\0' || c == ' ');
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 8).ok()
}

impl Default for SignatureScanner {
    fn default() -> Self {
        Self::new()
    }
}
