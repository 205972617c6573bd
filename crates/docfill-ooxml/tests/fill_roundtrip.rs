//! End-to-end fill tests
//!
//! Templates are built in memory, filled through the public API and then
//! reopened with `zip` to check what actually landed in the archive.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use docfill_ooxml::{
    FillError, Orientation, PackageStore, ReplacementMap, Template, DOCUMENT_PART,
};

fn build_docx(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    buffer.into_inner()
}

fn document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

fn template_with(body: &str) -> Vec<u8> {
    let doc = document(body);
    build_docx(&[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#,
        ),
        ("word/document.xml", &doc),
        ("word/media/logo.bin", "\u{1}\u{2}binary-ish"),
    ])
}

fn entries(docx: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut out = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        if file.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).unwrap();
        out.insert(file.name().to_string(), bytes);
    }
    out
}

fn document_of(docx: &[u8]) -> String {
    String::from_utf8(entries(docx).remove(DOCUMENT_PART).unwrap()).unwrap()
}

fn values(json: &str) -> ReplacementMap {
    ReplacementMap::from_json_str(json).unwrap()
}

// =============================================================================
// PART 1: PACKAGE ROUND TRIP
// =============================================================================

mod package_roundtrip {
    use super::*;

    #[test]
    fn test_empty_map_preserves_every_entry() {
        let original = template_with("<w:p><w:r><w:t>{{untouched}}</w:t></w:r></w:p>");
        let filled = Template::from_bytes(&original)
            .unwrap()
            .fill(&ReplacementMap::new())
            .unwrap();

        assert_eq!(entries(&original), entries(&filled.bytes));
        assert!(filled.report.is_complete());
    }

    #[test]
    fn test_other_entries_survive_fill() {
        let original = template_with("<w:p><w:r><w:t>{{x}}</w:t></w:r></w:p>");
        let filled = Template::from_bytes(&original)
            .unwrap()
            .fill(&values(r#"{"{{x}}": "y"}"#))
            .unwrap();

        let before = entries(&original);
        let after = entries(&filled.bytes);
        assert_eq!(before.keys().collect::<Vec<_>>(), after.keys().collect::<Vec<_>>());
        assert_eq!(before["word/media/logo.bin"], after["word/media/logo.bin"]);
        assert_eq!(before["_rels/.rels"], after["_rels/.rels"]);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("filled.docx");

        Template::from_bytes(&template_with("<w:p><w:r><w:t>{{x}}</w:t></w:r></w:p>"))
            .unwrap()
            .fill(&values(r#"{"{{x}}": "saved"}"#))
            .unwrap()
            .save(&out)
            .unwrap();

        let reloaded = Template::load(&out).unwrap();
        assert!(reloaded.package().document_xml().unwrap().contains("saved"));
        assert!(reloaded.placeholders().unwrap().is_empty());
    }
}

// =============================================================================
// PART 2: SUBSTITUTION
// =============================================================================

mod substitution {
    use super::*;

    #[test]
    fn test_contiguous_and_fragmented_tokens() {
        let original = template_with(
            "<w:p><w:r><w:t>Name: {{name}}</w:t></w:r></w:p>\
             <w:p><w:r><w:t>DOB: {{d</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>ob}}</w:t></w:r></w:p>",
        );
        let template = Template::from_bytes(&original).unwrap();
        assert_eq!(template.placeholders().unwrap(), vec!["{{name}}", "{{dob}}"]);

        let filled = template
            .fill(&values(r#"{"{{name}}": "Alice", "{{dob}}": "2020-01-01"}"#))
            .unwrap();
        let xml = document_of(&filled.bytes);

        assert!(xml.contains("<w:t>Name: Alice</w:t>"));
        assert!(xml.contains("2020-01-01"));
        assert!(xml.contains("<w:rPr><w:b/></w:rPr>"));
        assert!(!xml.contains("{{"));
        assert!(!xml.contains("}}"));
    }

    #[test]
    fn test_fill_is_idempotent() {
        let original = template_with(
            "<w:p><w:r><w:t>{{gr</w:t></w:r><w:r><w:t>eeting}} {{who}}</w:t></w:r></w:p>",
        );
        let map = values(r#"{"{{greeting}}": "Hello", "{{who}}": "world"}"#);

        let once = Template::from_bytes(&original).unwrap().fill(&map).unwrap();
        let twice = Template::from_bytes(&once.bytes).unwrap().fill(&map).unwrap();

        assert_eq!(document_of(&once.bytes), document_of(&twice.bytes));
        assert_eq!(twice.report.unmatched.len(), 2);
    }

    #[test]
    fn test_values_are_escaped() {
        let filled = Template::from_bytes(&template_with("<w:p><w:r><w:t>{{co}}</w:t></w:r></w:p>"))
            .unwrap()
            .fill(&values(r#"{"{{co}}": "Smith & <Sons>"}"#))
            .unwrap();
        assert!(document_of(&filled.bytes).contains("Smith &amp; &lt;Sons&gt;"));
    }

    #[test]
    fn test_unmatched_tokens_reported() {
        let filled = Template::from_bytes(&template_with("<w:p><w:r><w:t>{{a}}</w:t></w:r></w:p>"))
            .unwrap()
            .fill(&values(r#"{"{{a}}": "1", "{{b}}": "2"}"#))
            .unwrap();
        assert_eq!(filled.report.unmatched, vec!["{{b}}".to_string()]);
        assert!(!filled.report.is_complete());
    }
}

// =============================================================================
// PART 3: HOSTILE AND BROKEN INPUT
// =============================================================================

mod hostile_input {
    use super::*;

    #[test]
    fn test_zip_slip_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scratch_root = dir.path().join("scratch");
        std::fs::create_dir(&scratch_root).unwrap();

        let archive = build_docx(&[
            ("word/document.xml", "<w:document/>"),
            ("../../escaped.txt", "gotcha"),
        ]);
        let store = PackageStore::with_scratch_root(&scratch_root);
        let result = Template::from_bytes_with(&store, &archive);

        assert!(matches!(result, Err(FillError::PathTraversal(_))));
        assert!(!dir.path().join("escaped.txt").exists());
        assert_eq!(std::fs::read_dir(&scratch_root).unwrap().count(), 0);
    }

    #[test]
    fn test_not_a_zip() {
        let result = Template::from_bytes(b"%PDF-1.4 definitely not a docx");
        let err = result.unwrap_err();
        assert!(matches!(err, FillError::CorruptArchive { .. }));
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Template::load(dir.path().join("nope.docx")).is_err());
    }
}

// =============================================================================
// PART 4: ORIENTATION
// =============================================================================

mod orientation {
    use super::*;

    #[test]
    fn test_landscape_by_dimensions() {
        let template = Template::from_bytes(&template_with(
            r#"<w:p/><w:sectPr><w:pgSz w:w="16838" w:h="11906"/></w:sectPr>"#,
        ))
        .unwrap();
        assert_eq!(template.orientation().unwrap(), Orientation::Landscape);
    }

    #[test]
    fn test_portrait_default() {
        let template = Template::from_bytes(&template_with("<w:p/>")).unwrap();
        assert_eq!(template.orientation().unwrap(), Orientation::Portrait);
    }
}
