//! Scanner Module
//! Created: 2025-06-04
//!
//! Content sniffing: the file-type classifier, the binary signature table it
//! relies on, and the TeX-provenance detector for PDF and PostScript output.

pub mod classifier;
pub mod signature_scanner;
pub mod tex_produced;

pub use self::{
    classifier::{guess, ContentClassifier, Probe, Rule},
    signature_scanner::{SignaturePattern, SignatureScanner, SignatureType},
    tex_produced::{check_tex_produced_pdf, check_tex_produced_ps, Provenance, TexProducedDetector},
};
