//! Integration tests for the docfill CLI
//!
//! The command functions are exercised directly, and the built binary is
//! run for the argument-parsing and exit-code paths.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::process::Command;

use docfill_cli::{collect_values, fill_command, placeholders_command, FillOptions, OutputFormat, Settings};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Create a DOCX with `{{name}}` contiguous, `{{dob}}` split across two runs
/// and `{{company}}` in the header
fn create_test_template() -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>
</Types>"#).unwrap();

    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#).unwrap();

    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t xml:space="preserve">Name: {{name}}</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">DOB: {{d</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>ob}}</w:t></w:r></w:p>
    <w:sectPr><w:pgSz w:w="16838" w:h="11906" w:orient="landscape"/></w:sectPr>
  </w:body>
</w:document>"#).unwrap();

    zip.start_file("word/header1.xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:r><w:t>{{company}}</w:t></w:r></w:p></w:hdr>"#).unwrap();

    zip.finish().unwrap();
    buffer.into_inner()
}

fn read_entry(docx: &Path, name: &str) -> String {
    let bytes = fs::read(docx).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    contents
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("offer.docx");
    fs::write(&template, create_test_template()).unwrap();
    (dir, template)
}

fn docfill(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_docfill"));
    command.current_dir(dir).env_remove("DOCFILL_TIMEOUT_SECS");
    command
}

#[test]
fn test_fill_command() {
    let (dir, template) = setup();
    let output = dir.path().join("out/offer-alice.docx");

    let values = collect_values(
        &Settings::default(),
        None,
        &[
            "name=Alice".to_string(),
            "dob=2020-01-01".to_string(),
            "{{company}}=Acme & Co".to_string(),
        ],
    )
    .unwrap();

    let report = fill_command(
        &Settings::default(),
        &template,
        &output,
        &values,
        FillOptions::default(),
    )
    .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.total_occurrences(), 3);

    let document = read_entry(&output, "word/document.xml");
    assert!(document.contains("Name: Alice"));
    assert!(document.contains("2020-01-01"));
    assert!(!document.contains("{{"));
    assert!(document.contains("<w:rPr><w:i/></w:rPr>"));

    let header = read_entry(&output, "word/header1.xml");
    assert!(header.contains("Acme &amp; Co"));
}

#[test]
fn test_fill_strict_refuses_unused_values() {
    let (dir, template) = setup();
    let output = dir.path().join("strict.docx");
    let values = collect_values(&Settings::default(), None, &["nickname=Al".to_string()]).unwrap();

    let result = fill_command(
        &Settings::default(),
        &template,
        &output,
        &values,
        FillOptions {
            strict: true,
            ..FillOptions::default()
        },
    );

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("{{nickname}}"));
    assert!(!output.exists());
}

#[test]
fn test_custom_delimiters_from_settings() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("brackets.docx");

    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    zip.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
    zip.write_all(b"<w:document><w:body><w:p><w:r><w:t>[[name]] {{ignored}}</w:t></w:r></w:p></w:body></w:document>")
        .unwrap();
    zip.finish().unwrap();
    fs::write(&template, buffer.into_inner()).unwrap();

    let settings = Settings::from_toml_str("[placeholders]\nopen = \"[[\"\nclose = \"]]\"").unwrap();
    let output = dir.path().join("filled.docx");
    let values = collect_values(&settings, None, &["name=Carol".to_string()]).unwrap();
    assert_eq!(values.get("[[name]]"), Some("Carol"));

    fill_command(&settings, &template, &output, &values, FillOptions::default()).unwrap();
    let document = read_entry(&output, "word/document.xml");
    assert!(document.contains("Carol {{ignored}}"));
    assert!(placeholders_command(&settings, &output, OutputFormat::Json).is_ok());
}

#[test]
fn test_missing_input() {
    let dir = TempDir::new().unwrap();
    let result = placeholders_command(
        &Settings::default(),
        &dir.path().join("absent.docx"),
        OutputFormat::Text,
    );
    assert!(result.unwrap_err().to_string().contains("Input file not found"));
}

#[test]
fn test_binary_lists_placeholders_as_json() {
    let (dir, template) = setup();
    let output = docfill(dir.path())
        .args(["placeholders", "--format", "json"])
        .arg(&template)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let tokens: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tokens, vec!["{{name}}", "{{dob}}", "{{company}}"]);
}

#[test]
fn test_binary_orientation() {
    let (dir, template) = setup();
    let output = docfill(dir.path())
        .args(["orientation", "--format", "json"])
        .arg(&template)
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["orientation"], "landscape");
}

#[test]
fn test_binary_fill_with_values_file() {
    let (dir, template) = setup();
    let values = dir.path().join("values.json");
    fs::write(&values, r#"{"{{name}}": "Bob", "{{dob}}": "1999-12-31", "{{company}}": "Initech"}"#).unwrap();
    let out = dir.path().join("filled.docx");

    let output = docfill(dir.path())
        .arg("fill")
        .arg(&template)
        .arg("-o")
        .arg(&out)
        .arg("--values")
        .arg(&values)
        .arg("--strict")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Filled:"));
    assert!(read_entry(&out, "word/document.xml").contains("1999-12-31"));
}

#[test]
fn test_binary_strict_exit_code() {
    let (dir, template) = setup();
    let out = dir.path().join("never.docx");

    let output = docfill(dir.path())
        .arg("fill")
        .arg(&template)
        .arg("-o")
        .arg(&out)
        .args(["--set", "unknown=1", "--strict"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("strict"));
    assert!(!out.exists());
}

#[test]
fn test_binary_rejects_bad_config() {
    let (dir, template) = setup();
    fs::write(dir.path().join("docfill.toml"), "[render]\ntimeout_secs = \"never\"").unwrap();

    let output = docfill(dir.path())
        .arg("placeholders")
        .arg(&template)
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("docfill.toml"));
}
