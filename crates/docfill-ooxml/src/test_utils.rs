//! Shared test fixtures for docfill-ooxml
//!
//! Archives are built in memory with `ZipWriter`, so tests never depend on
//! binary fixtures checked into the tree.

use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
</Relationships>"#;

/// Wrap body content in a `w:document` element
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{}</w:body>
</w:document>"#,
        body
    )
}

/// Build an archive from `(name, contents)` pairs, stored uncompressed
///
/// Names are written verbatim, so hostile entries such as `../x` can be
/// produced for traversal tests.
pub fn zip_entries(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }

    zip.finish().unwrap();
    buffer.into_inner()
}

/// Create a DOCX whose body holds `body`
pub fn create_template_with_document(body: &str) -> Vec<u8> {
    let document = document_xml(body);
    zip_entries(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        ("word/document.xml", &document),
    ])
}

/// Create a minimal valid DOCX with a single paragraph and no placeholders
pub fn create_minimal_template() -> Vec<u8> {
    create_template_with_document("<w:p><w:r><w:t>Template</w:t></w:r></w:p>")
}

/// A DOCX whose `{{customer}}` token is split across three runs, the way a
/// word processor leaves it after spell checking
pub fn create_fragmented_template() -> Vec<u8> {
    create_template_with_document(
        "<w:p><w:r><w:t xml:space=\"preserve\">Dear </w:t></w:r>\
         <w:r><w:t>{{cust</w:t></w:r>\
         <w:proofErr w:type=\"spellStart\"/>\
         <w:r><w:rPr><w:b/></w:rPr><w:t>om</w:t></w:r>\
         <w:r><w:t>er}},</w:t></w:r></w:p>",
    )
}

/// Read an entry from an archive held in memory
pub fn extract_file(docx: &[u8], path: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut entry = archive.by_name(path).ok()?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    Some(contents)
}

/// Read `word/document.xml` from an archive held in memory
pub fn extract_document_xml(docx: &[u8]) -> String {
    extract_file(docx, "word/document.xml").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_minimal_template() {
        let template = create_minimal_template();
        let archive = ZipArchive::new(Cursor::new(&template)).unwrap();
        let names: Vec<_> = archive.file_names().collect();

        assert!(names.contains(&"[Content_Types].xml"));
        assert!(names.contains(&"_rels/.rels"));
        assert!(names.contains(&"word/document.xml"));
    }

    #[test]
    fn test_extract_file() {
        let template = create_minimal_template();
        assert!(extract_document_xml(&template).contains("Template"));
        assert!(extract_file(&template, "nonexistent.xml").is_none());
    }
}
