
use filemanager::config::DetectorConfig;
use filemanager::scanner::{check_tex_produced_pdf, check_tex_produced_ps, Provenance, TexProducedDetector};

use crate::fixtures::TestFixtures;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdftex_producer_reports_literal() {
        let detector = TexProducedDetector::default();
        let result = detector.scan_pdf(&TestFixtures::pdf_with_producer("pdfTeX-1.40.21"));
        assert_eq!(result, Provenance::Evidence("/Producer (pdfTeX-1.40.21)".into()));
    }

    #[test]
    fn test_non_tex_producers_are_negative() {
        let detector = TexProducedDetector::default();
        assert_eq!(detector.scan_pdf(&TestFixtures::plain_pdf()), Provenance::NotDetected);
        assert_eq!(
            detector.scan_pdf(&TestFixtures::pdf_with_producer("GNU TeXmacs 1.99")),
            Provenance::NotDetected
        );
        assert_eq!(detector.scan_ps(&TestFixtures::plain_postscript()), Provenance::NotDetected);
    }

    #[test]
    fn test_dvips_postscript_reports_creator_line() {
        let detector = TexProducedDetector::default();
        let result = detector.scan_ps(&TestFixtures::dvips_postscript());
        assert_eq!(
            result.evidence(),
            Some("%%Creator: dvips(k) 5.96.1 Copyright 2007 Radical Eye Software\n")
        );
    }

    #[test]
    fn test_marker_in_middle_of_large_file() {
        let detector = TexProducedDetector::new(DetectorConfig {
            window_bytes: 1024,
            max_scan_bytes: 1024 * 1024,
            ps_header_lines: 200,
        });
        let mut data = b"%PDF-1.4\n".to_vec();
        data.extend(std::iter::repeat(b'x').take(100_000));
        data.extend_from_slice(b"/BaseFont /ABCDEF+CMR10\n");
        data.extend(std::iter::repeat(b'x').take(100_000));
        data.extend_from_slice(b"%%EOF\n");

        assert_eq!(detector.scan_pdf(&data).evidence(), Some("ABCDEF+CMR"));
    }

    #[test]
    fn test_marker_beyond_scan_limit_is_missed() {
        let detector = TexProducedDetector::new(DetectorConfig {
            window_bytes: 16,
            max_scan_bytes: 4096,
            ps_header_lines: 200,
        });
        let mut data = b"%PDF-1.4\n".to_vec();
        data.extend(std::iter::repeat(b'x').take(8192));
        data.extend_from_slice(b"/BaseFont /ABCDEF+CMR10\n");
        data.extend(std::iter::repeat(b'x').take(8192));
        assert_eq!(detector.scan_pdf(&data), Provenance::NotDetected);
    }

    #[test]
    fn test_trailer_found_past_scan_limit_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        let mut data = b"%PDF-1.4\n".to_vec();
        data.extend(std::iter::repeat(b'x').take(64 * 1024));
        data.extend_from_slice(b"<< /Producer (pdfTeX-1.40.25) >>\n%%EOF\n");
        std::fs::write(&path, &data).unwrap();

        let detector = TexProducedDetector::new(DetectorConfig {
            window_bytes: 256,
            max_scan_bytes: 4096,
            ps_header_lines: 200,
        });
        assert_eq!(
            detector.check_pdf(&path),
            Provenance::Evidence("/Producer (pdfTeX-1.40.25)".into())
        );
    }

    #[test]
    fn test_missing_files_are_negative() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pdf");
        assert_eq!(check_tex_produced_pdf(&missing), Provenance::NotDetected);
        assert_eq!(check_tex_produced_ps(&missing), Provenance::NotDetected);
    }

    #[test]
    fn test_repeated_checks_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.ps");
        std::fs::write(&path, TestFixtures::dvips_postscript()).unwrap();

        let first = check_tex_produced_ps(&path);
        assert!(first.is_positive());
        assert_eq!(check_tex_produced_ps(&path), first);
    }
}
