//! Classification stage
//! Created: 2025-06-05
//!
//! Classifies every file in the workspace on a rayon pool, repairs PC/MAC
//! line endings, applies `00README.XXX` directives and runs the provenance
//! detector on PDF/PostScript output when there is no TeX source.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::analyzer::PriorityResolver;
use crate::hash_utils::sha256_hex;
use crate::scanner::{ContentClassifier, Provenance, TexProducedDetector};
use crate::types::Type;

const README_NAME: &str = "00README.XXX";

/// One file with everything learned about it during the run
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub path: String,
    pub data: Vec<u8>,
    pub checksum: String,
    pub file_type: Type,
    /// Rule that decided `file_type`
    pub rule: &'static str,
    /// Set when line endings were rewritten; holds the type before repair
    pub converted_from: Option<Type>,
    /// Set when a README directive reassigned the type
    pub directive: Option<Type>,
    pub provenance: Option<Provenance>,
}

impl ClassifiedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Clone)]
pub struct ClassifyStage {
    classifier: Arc<ContentClassifier>,
    detector: TexProducedDetector,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ClassifyStage {
    /// `pool` of `None` classifies sequentially on the calling thread
    pub fn new(
        classifier: Arc<ContentClassifier>,
        detector: TexProducedDetector,
        pool: Option<Arc<rayon::ThreadPool>>,
    ) -> Self {
        Self {
            classifier,
            detector,
            pool,
        }
    }

    fn run<T, F>(&self, job: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }

    fn classify_one(&self, path: String, data: Vec<u8>) -> ClassifiedFile {
        let (file_type, rule) = self.classifier.classify_with_rule(&path, &data);
        let mut file = ClassifiedFile {
            checksum: sha256_hex(&data),
            path,
            data,
            file_type,
            rule,
            converted_from: None,
            directive: None,
            provenance: None,
        };
        if matches!(file.file_type, Type::Pc | Type::Mac) {
            let original = file.file_type;
            file.data = normalize_line_endings(&file.data);
            file.checksum = sha256_hex(&file.data);
            let (file_type, rule) = self.classifier.classify_with_rule(&file.path, &file.data);
            file.file_type = file_type;
            file.rule = rule;
            file.converted_from = Some(original);
        }
        file
    }

    /// Classifies `files`, preserving their order
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub fn execute(&self, files: Vec<(String, Vec<u8>)>) -> Vec<ClassifiedFile> {
        let mut classified: Vec<ClassifiedFile> = if self.pool.is_some() {
            self.run(|| {
                files
                    .into_par_iter()
                    .map(|(path, data)| self.classify_one(path, data))
                    .collect()
            })
        } else {
            files
                .into_iter()
                .map(|(path, data)| self.classify_one(path, data))
                .collect()
        };

        apply_readme_directives(&mut classified);

        let resolver = PriorityResolver::new();
        if !resolver.has_tex_source(classified.iter().map(|f| f.file_type)) {
            self.detect_provenance(&mut classified);
        }
        classified
    }

    fn detect_provenance(&self, files: &mut [ClassifiedFile]) {
        let detector = &self.detector;
        let scan = |file: &mut ClassifiedFile| match file.file_type {
            Type::Pdf => file.provenance = Some(detector.scan_pdf(&file.data)),
            Type::Postscript | Type::PsPc | Type::DosEps => {
                file.provenance = Some(detector.scan_ps(&file.data))
            }
            _ => {}
        };
        if self.pool.is_some() {
            self.run(|| files.par_iter_mut().for_each(scan));
        } else {
            files.iter_mut().for_each(scan);
        }
    }
}

/// CRLF and bare CR become LF
pub fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte == b'\r' {
            if iter.peek() == Some(&&b'\n') {
                iter.next();
            }
            out.push(b'\n');
        } else {
            out.push(byte);
        }
    }
    out
}

/// Parses `<path> ignore` / `<path> include` lines
pub fn parse_readme_directives(text: &str) -> Vec<(String, Type)> {
    text.lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            let path = words.next()?;
            let keyword = words.next()?;
            if words.next().is_some() {
                return None;
            }
            match keyword.to_ascii_lowercase().as_str() {
                "ignore" => Some((path.to_string(), Type::Ignore)),
                "include" => Some((path.to_string(), Type::Include)),
                _ => None,
            }
        })
        .collect()
}

/// Reassigns types named by a top-level `00README.XXX`
pub fn apply_readme_directives(files: &mut [ClassifiedFile]) {
    let Some(readme) = files.iter().find(|f| f.path == README_NAME) else {
        return;
    };
    let directives = parse_readme_directives(&String::from_utf8_lossy(&readme.data));
    for (path, file_type) in directives {
        if let Some(file) = files.iter_mut().find(|f| f.path == path && f.path != README_NAME) {
            debug!("{} marked {} by {}", path, file_type, README_NAME);
            file.file_type = file_type;
            file.directive = Some(file_type);
        }
    }
}
