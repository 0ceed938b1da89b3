
use filemanager::analyzer::priority_of;
use filemanager::types::{Severity, Type, UploadStatus, WorkspaceId, WorkspaceState};
use filemanager::utils::metrics;
use filemanager::{Error, UploadRequest};

use super::{pipeline, upload};
use crate::fixtures::TestFixtures;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_latex_file_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let summary = pipeline
            .process(upload(None, "main.tex", TestFixtures::latex_source()))
            .await
            .unwrap();

        assert_eq!(summary.status, UploadStatus::Ready);
        assert!(summary.diagnostics.is_empty());
        assert_eq!(summary.primary_type, Some(Type::Latex2e));
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.files[0].path, "main.tex");
        assert_eq!(summary.files[0].size, TestFixtures::latex_source().len() as u64);
        assert!(summary.completion_datetime >= summary.start_datetime);
        assert!(!summary.log.is_empty());
    }

    #[tokio::test]
    async fn test_zero_byte_file_gives_one_warning() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let summary = pipeline.process(upload(None, "empty.tex", Vec::new())).await.unwrap();

        assert_eq!(summary.diagnostics.len(), 1);
        assert_eq!(summary.diagnostics[0].severity, Severity::Warning);
        assert_eq!(summary.diagnostics[0].path, "empty.tex");
        let entry = summary.file("empty.tex").unwrap();
        assert_eq!(entry.file_type, Type::Empty);
        assert_eq!(priority_of(entry.file_type), 0);
        assert_eq!(summary.status, UploadStatus::ReadyWithWarnings);
    }

    #[tokio::test]
    async fn test_zip_is_unpacked_and_classified() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let zip = TestFixtures::zip_of(&[
            ("main.tex", &TestFixtures::latex_source()),
            ("figs/plot.png", &TestFixtures::png()),
            ("refs.bib", b"@article{key, title={T}}\n"),
        ]);

        let summary = pipeline.process(upload(None, "paper.zip", zip)).await.unwrap();

        let paths: Vec<&str> = summary.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["figs/plot.png", "main.tex", "refs.bib"]);
        assert_eq!(summary.file("figs/plot.png").unwrap().file_type, Type::Image);
        assert_eq!(summary.primary_type, Some(Type::Latex2e));
        assert_eq!(summary.status, UploadStatus::Ready);
    }

    #[tokio::test]
    async fn test_tar_gz_is_unpacked() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let tar = TestFixtures::tar_of(&[
            ("paper/main.tex", &TestFixtures::latex_source()),
            ("paper/fig.ps", &TestFixtures::plain_postscript()),
        ]);

        let summary = pipeline
            .process(upload(None, "paper.tar.gz", TestFixtures::gzip_of(&tar)))
            .await
            .unwrap();

        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.file("paper/fig.ps").unwrap().file_type, Type::Postscript);
        assert_eq!(summary.status, UploadStatus::Ready);
    }

    #[tokio::test]
    async fn test_path_traversal_member_is_fatal_and_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspaces");
        let pipeline = pipeline(&root);
        let zip = TestFixtures::zip_of(&[
            ("main.tex", &TestFixtures::latex_source()),
            ("../../etc/passwd", b"root:x:0:0:root:/root:/bin/sh\n"),
        ]);

        let summary = pipeline.process(upload(None, "paper.zip", zip)).await.unwrap();

        assert_eq!(summary.status, UploadStatus::Errors);
        let fatals: Vec<_> = summary.fatals().collect();
        assert_eq!(fatals.len(), 1);
        assert_eq!(fatals[0].path, "../../etc/passwd");
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.files[0].path, "main.tex");

        assert!(!dir.path().join("etc/passwd").exists());
        assert!(!root.join("etc/passwd").exists());
    }

    #[tokio::test]
    async fn test_line_endings_converted_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let summary = pipeline
            .process(upload(None, "main.tex", b"\\documentclass{article}\r\n\\begin{document}\r\n".to_vec()))
            .await
            .unwrap();

        assert_eq!(summary.status, UploadStatus::ReadyWithWarnings);
        assert_eq!(summary.files[0].file_type, Type::Latex2e);
        assert_eq!(summary.warnings().count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_format_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let docx = TestFixtures::zip_of(&[("word/document.xml", b"<w:document/>")]);
        let id = pipeline.lifecycle().create("author@example.org", Some("cs.DL")).await.unwrap();

        let summary = pipeline.process(upload(Some(id), "paper.docx", docx)).await.unwrap();

        assert_eq!(summary.status, UploadStatus::Errors);
        assert_eq!(summary.files[0].file_type, Type::Docx);
        let workspace = pipeline.lifecycle().summary(id).await.unwrap();
        assert_eq!(workspace.state, WorkspaceState::Errors);
    }

    #[tokio::test]
    async fn test_tex_produced_pdf_warns_with_literal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let summary = pipeline
            .process(upload(None, "paper.pdf", TestFixtures::pdf_with_producer("pdfTeX-1.40.21")))
            .await
            .unwrap();

        assert_eq!(summary.status, UploadStatus::ReadyWithWarnings);
        assert_eq!(summary.diagnostics.len(), 1);
        assert!(summary.diagnostics[0].message.contains("/Producer (pdfTeX-1.40.21)"));
        assert_eq!(summary.primary_type, Some(Type::Pdf));
    }

    #[tokio::test]
    async fn test_plain_pdf_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let summary = pipeline
            .process(upload(None, "paper.pdf", TestFixtures::plain_pdf()))
            .await
            .unwrap();

        assert_eq!(summary.status, UploadStatus::Ready);
    }

    #[tokio::test]
    async fn test_warnings_precede_fatals() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let zip = TestFixtures::zip_of(&[
            ("blob.dat", b"\x00\x01\x02\x03"),
            ("empty.tex", b""),
        ]);

        let mut request = upload(None, "paper.zip", zip);
        request.category = None;
        let summary = pipeline.process(request).await.unwrap();

        assert_eq!(summary.status, UploadStatus::Errors);
        let severities: Vec<Severity> = summary.diagnostics.iter().map(|d| d.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Warning, Severity::Warning, Severity::Fatal]
        );
    }

    #[tokio::test]
    async fn test_missing_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let request = UploadRequest {
            workspace_id: None,
            owner: "author@example.org".into(),
            category: None,
            payload: None,
        };

        let result = pipeline.process(request).await;
        assert!(matches!(result, Err(Error::ValidationError(_))));
        assert_eq!(pipeline.metrics().get_counter(metrics::RUNS_STARTED), 0);
    }

    #[tokio::test]
    async fn test_unnamed_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        for name in ["uploads/", "..", ".", "paper/..", "C:\\tmp\\.."] {
            let result = pipeline.process(upload(None, name, b"data".to_vec())).await;
            assert!(matches!(result, Err(Error::ValidationError(_))), "{:?}", name);
        }
        assert!(matches!(
            pipeline.lifecycle().summary(WorkspaceId(1)).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(pipeline.metrics().get_counter(metrics::RUNS_STARTED), 0);
    }

    #[tokio::test]
    async fn test_file_and_directory_collision_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let zip = TestFixtures::zip_of(&[
            ("figs", b"plain text\n"),
            ("figs/a.tex", &TestFixtures::latex_source()),
            ("main.tex", &TestFixtures::latex_source()),
        ]);

        let summary = pipeline.process(upload(None, "paper.zip", zip)).await.unwrap();

        assert_eq!(summary.status, UploadStatus::Errors);
        let fatals: Vec<_> = summary.fatals().collect();
        assert_eq!(fatals.len(), 1);
        assert_eq!(fatals[0].path, "figs/a.tex");
        let paths: Vec<&str> = summary.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["figs", "main.tex"]);
    }

    #[tokio::test]
    async fn test_upload_colliding_with_earlier_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let id = pipeline.lifecycle().create("author@example.org", Some("hep-th")).await.unwrap();
        let zip = TestFixtures::zip_of(&[
            ("main.tex", &TestFixtures::latex_source()),
            ("figs/plot.png", &TestFixtures::png()),
        ]);
        pipeline.process(upload(Some(id), "paper.zip", zip)).await.unwrap();

        let summary = pipeline
            .process(upload(Some(id), "figs", b"plain text\n".to_vec()))
            .await
            .unwrap();

        assert_eq!(summary.status, UploadStatus::Errors);
        assert_eq!(summary.fatals().map(|d| d.path.as_str()).collect::<Vec<_>>(), vec!["figs"]);
        let paths: Vec<&str> = summary.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["figs/plot.png", "main.tex"]);
        assert_eq!(
            pipeline.lifecycle().summary(id).await.unwrap().state,
            WorkspaceState::Errors
        );
    }

    #[tokio::test]
    async fn test_reprocessing_replaces_summary() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let id = pipeline.lifecycle().create("author@example.org", Some("hep-th")).await.unwrap();

        let first = pipeline
            .process(upload(Some(id), "empty.tex", Vec::new()))
            .await
            .unwrap();
        assert_eq!(first.status, UploadStatus::ReadyWithWarnings);

        let second = pipeline
            .process(upload(Some(id), "empty.tex", TestFixtures::latex_source()))
            .await
            .unwrap();
        assert_eq!(second.status, UploadStatus::Ready);

        let workspace = pipeline.lifecycle().summary(id).await.unwrap();
        assert_eq!(workspace.state, WorkspaceState::Ready);
        assert_eq!(workspace.last_summary, Some(second));
        assert_eq!(pipeline.metrics().get_counter(metrics::RUNS_COMPLETED), 2);
    }
}
