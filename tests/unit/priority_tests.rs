
use filemanager::analyzer::{is_tex_tag, priority_of, tag_priority, PriorityResolver, TYPE_PRIORITIES};
use filemanager::types::{Diagnostic, Type, UploadStatus, WorkspaceState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprioritised_types_rank_zero() {
        assert_eq!(priority_of(Type::Empty), 0);
        assert_eq!(priority_of(Type::Unknown), 0);
        assert_eq!(tag_priority("TYPE_NOT_A_THING"), 0);
    }

    #[test]
    fn test_table_order_defines_rank() {
        assert_eq!(priority_of(TYPE_PRIORITIES[0]), 1);
        assert!(priority_of(Type::Latex2e) > priority_of(Type::Pdf));
        assert!(priority_of(Type::Include) > priority_of(Type::Tar));
        assert_eq!(tag_priority("TYPE_LATEX2e"), priority_of(Type::Latex2e));
        assert_eq!(tag_priority("latex2e"), priority_of(Type::Latex2e));
    }

    #[test]
    fn test_primary_type_is_highest_rank() {
        let resolver = PriorityResolver::new();
        let types = [Type::Image, Type::Latex2e, Type::Bibtex, Type::Pdf];
        assert_eq!(resolver.primary_type(types), Some(Type::Latex2e));
        assert_eq!(resolver.primary_type([Type::Empty]), Some(Type::Empty));
        assert_eq!(resolver.primary_type(Vec::<Type>::new()), None);
    }

    #[test]
    fn test_tex_membership() {
        let resolver = PriorityResolver::new();
        assert!(is_tex_tag("TYPE_PDFLATEX"));
        assert!(is_tex_tag("tex_priority2"));
        assert!(!is_tex_tag("TYPE_PDF"));
        assert!(!is_tex_tag("garbage"));
        assert!(resolver.has_tex_source([Type::Pdf, Type::TexAms]));
        assert!(!resolver.has_tex_source([Type::Pdf, Type::Postscript]));
    }

    #[test]
    fn test_abort_class_makes_submission_unprocessable() {
        let resolver = PriorityResolver::new();
        assert!(resolver.is_unprocessable([Type::Latex2e, Type::Failed]));
        assert!(!resolver.is_unprocessable([Type::Latex2e, Type::Empty]));
    }

    #[test]
    fn test_status_derivation() {
        let warn = Diagnostic::warning("a.tex", "converted line endings");
        let fatal = Diagnostic::fatal("b.docx", "not accepted");

        assert_eq!(UploadStatus::from_diagnostics(&[]), UploadStatus::Ready);
        assert_eq!(
            UploadStatus::from_diagnostics(&[warn.clone()]),
            UploadStatus::ReadyWithWarnings
        );
        assert_eq!(
            UploadStatus::from_diagnostics(&[fatal.clone(), warn.clone()]),
            UploadStatus::Errors
        );
        assert_eq!(UploadStatus::from_diagnostics(&[warn, fatal]), UploadStatus::Errors);
        assert_eq!(WorkspaceState::from(UploadStatus::Errors), WorkspaceState::Errors);
    }
}
