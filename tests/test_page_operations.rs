//! Integration tests for page operations (merge, delete, split, metadata).

use std::path::Path;

use lopdf::{dictionary, Document, Object, Stream};
use pdf_fontkeeper::engine::pages::{self, DocumentInfo};
use pdf_fontkeeper::engine::{DocumentEngine, PdfDocument};
use pdf_fontkeeper::Error;
use tempfile::tempdir;

/// Helper to write a PDF with `page_count` pages labelled "`label` n".
fn create_test_pdf(path: &Path, page_count: usize, label: &str) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut kids = Vec::new();
    for i in 0..page_count {
        let content = format!("BT /F1 12 Tf 72 720 Td ({} {}) Tj ET", label, i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        kids.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        })));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn page_texts(path: &Path) -> Vec<String> {
    PdfDocument::open(path)
        .unwrap()
        .extract_text_runs()
        .unwrap()
        .into_iter()
        .map(|run| run.content)
        .collect()
}

mod merge_tests {
    use super::*;

    #[test]
    fn test_merge_page_count_is_sum_of_inputs() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        create_test_pdf(&a, 2, "A");
        create_test_pdf(&b, 3, "B");
        let out = dir.path().join("merged.pdf");

        assert_eq!(pages::merge_files(&[&a, &b], &out).unwrap(), 5);
        assert_eq!(page_texts(&out), vec!["A 1", "A 2", "B 1", "B 2", "B 3"]);
    }

    #[test]
    fn test_merge_missing_input_fails() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        create_test_pdf(&a, 1, "A");
        let missing = dir.path().join("missing.pdf");
        let out = dir.path().join("merged.pdf");
        assert!(pages::merge_files(&[&a, &missing], &out).is_err());
        assert!(!out.exists());
    }
}

mod page_selection_tests {
    use super::*;

    #[test]
    fn test_delete_selected_pages() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        create_test_pdf(&input, 4, "P");
        let out = dir.path().join("out.pdf");

        let selected = pages::parse_page_ranges("1,3", 4).unwrap();
        assert_eq!(pages::delete_pages_file(&input, &selected, &out).unwrap(), 2);
        assert_eq!(page_texts(&out), vec!["P 2", "P 4"]);
    }

    #[test]
    fn test_delete_out_of_range() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        create_test_pdf(&input, 2, "P");
        let err = pages::delete_pages_file(&input, &[7], dir.path().join("out.pdf")).unwrap_err();
        assert!(matches!(err, Error::InvalidPage { page: 7, count: 2 }));
    }

    #[test]
    fn test_split_into_ranges() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        create_test_pdf(&input, 3, "S");
        let prefix = dir.path().join("part");
        let groups = vec![
            pages::parse_page_ranges("1-2", 3).unwrap(),
            pages::parse_page_ranges("3", 3).unwrap(),
        ];

        let parts = pages::split_file(&input, &groups, prefix.to_str().unwrap()).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with("part_1.pdf"));
        assert_eq!(page_texts(&parts[0]), vec!["S 1", "S 2"]);
        assert_eq!(page_texts(&parts[1]), vec!["S 3"]);
    }
}

mod metadata_tests {
    use super::*;

    #[test]
    fn test_edit_metadata() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        create_test_pdf(&input, 1, "M");
        let out = dir.path().join("out.pdf");

        let info = DocumentInfo::new()
            .title("Certidão de Nascimento")
            .author("Cartório")
            .keywords("registro, civil");
        pages::edit_metadata_file(&input, &info, &out).unwrap();

        let read = DocumentInfo::read(&pages::load(&out).unwrap());
        assert_eq!(read.title.as_deref(), Some("Certidão de Nascimento"));
        assert_eq!(read.author.as_deref(), Some("Cartório"));
        assert_eq!(read.keywords.as_deref(), Some("registro, civil"));
        assert!(read.mod_date.is_some());
    }
}
