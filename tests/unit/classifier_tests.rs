
use filemanager::scanner::{guess, ContentClassifier};
use filemanager::types::Type;

use crate::fixtures::TestFixtures;

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(name: &str, data: &[u8]) -> Type {
        ContentClassifier::new().classify(name, data)
    }

    #[test]
    fn test_zero_byte_file_is_empty() {
        assert_eq!(classify("main.tex", b""), Type::Empty);
        assert_eq!(classify("figure.png", b""), Type::Empty);
    }

    #[test]
    fn test_gzip_magic_wins_over_extension() {
        let data = TestFixtures::gzip_of(b"\\documentclass{article}");
        assert_eq!(classify("paper.tex", &data), Type::Gzipped);
        assert_eq!(classify("paper.pdf", &data), Type::Gzipped);
        assert_eq!(classify("paper", &data), Type::Gzipped);
    }

    #[test]
    fn test_archives() {
        let zip = TestFixtures::zip_of(&[("main.tex", b"\\documentclass{article}")]);
        assert_eq!(classify("paper.zip", &zip), Type::Zip);

        let tar = TestFixtures::tar_of(&[("main.tex", b"\\documentclass{article}")]);
        assert_eq!(classify("paper.tar", &tar), Type::Tar);
    }

    #[test]
    fn test_office_zip_containers_are_not_plain_zip() {
        let docx = TestFixtures::zip_of(&[("word/document.xml", b"<w:document/>")]);
        assert_eq!(classify("paper.docx", &docx), Type::Docx);

        let odf = TestFixtures::zip_of(&[("mimetype", b"application/vnd.oasis.opendocument.text")]);
        assert_eq!(classify("paper.odt", &odf), Type::Odf);
    }

    #[test]
    fn test_pdf_postscript_and_images() {
        assert_eq!(classify("paper.pdf", &TestFixtures::plain_pdf()), Type::Pdf);
        assert_eq!(classify("paper.ps", &TestFixtures::dvips_postscript()), Type::Postscript);
        assert_eq!(classify("fig.png", &TestFixtures::png()), Type::Image);
    }

    #[test]
    fn test_tex_family() {
        assert_eq!(classify("main.tex", &TestFixtures::latex_source()), Type::Latex2e);
        assert_eq!(
            classify("main.tex", b"\\pdfoutput=1\n\\documentclass{article}\n"),
            Type::Pdflatex
        );
        assert_eq!(classify("old.tex", b"\\documentstyle{article}\n"), Type::Latex);
        assert_eq!(classify("refs.bib", b"@article{key, title={T}}\n"), Type::Bibtex);
        assert_eq!(classify("macros.sty", b"\\ProvidesPackage{macros}\n"), Type::Texaux);
    }

    #[test]
    fn test_line_ending_variants() {
        assert_eq!(classify("main.tex", b"\\documentclass{article}\r\n"), Type::Pc);
        assert_eq!(classify("main.tex", b"\\documentclass{article}\r"), Type::Mac);
    }

    #[test]
    fn test_ignored_names() {
        assert_eq!(classify("__MACOSX/._main.tex", b"junk"), Type::AlwaysIgnore);
        assert_eq!(classify(".DS_Store", b"\x00\x00\x00\x01Bud1"), Type::AlwaysIgnore);
        assert_eq!(classify("missfont.log", b"mktextfm cmr10"), Type::AlwaysIgnore);
    }

    #[test]
    fn test_unrecognized_binary_fails() {
        assert_eq!(classify("blob.dat", b"\x00\x01\x02\x03\x04\x05"), Type::Failed);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = ContentClassifier::new();
        let data = TestFixtures::latex_source();
        let first = classifier.classify_with_rule("main.tex", &data);
        for _ in 0..10 {
            assert_eq!(classifier.classify_with_rule("main.tex", &data), first);
        }
    }

    #[test]
    fn test_unreadable_path_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.tex");
        assert_eq!(ContentClassifier::new().classify_path(&missing), Type::Abort);
        assert_eq!(guess(&missing), "abort");
    }

    #[test]
    fn test_guess_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.tex");
        std::fs::write(&path, TestFixtures::latex_source()).unwrap();
        assert_eq!(guess(&path), "latex2e");
    }
}
