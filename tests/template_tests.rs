// Template loading and data file decoding.

mod common;

use bulkdocx::{load_rows, BulkDocxError, DataRow, DocxPackage, Template};
use common::*;

// ── load_rows ─────────────────────────────────────────────────────────────────

#[test]
fn rows_keep_file_and_column_order() {
    let rows = load_rows(b"b,a\n2,1\n4,3\n").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].field_names().collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(rows[0].get("b"), Some("2"));
    assert_eq!(rows[1].get("a"), Some("3"));
}

#[test]
fn quoted_cells_may_contain_commas() {
    let rows = load_rows(b"name,city\nAcme,\"Town, ST 00000\"\n").unwrap();
    assert_eq!(rows[0].get("city"), Some("Town, ST 00000"));
}

#[test]
fn short_rows_lack_trailing_fields() {
    let rows = load_rows(b"a,b,c\n1,2\n").unwrap();
    assert!(rows[0].contains("b"));
    assert!(!rows[0].contains("c"));
}

#[test]
fn empty_cells_are_present() {
    let rows = load_rows(b"a,b\n1,\n").unwrap();
    assert_eq!(rows[0].get("b"), Some(""));
}

#[test]
fn extra_cells_are_ignored() {
    let rows = load_rows(b"a\n1,2,3\n").unwrap();
    assert_eq!(rows[0].len(), 1);
}

#[test]
fn byte_order_mark_is_dropped() {
    let rows = load_rows("\u{feff}grantee_name\nAcme\n".as_bytes()).unwrap();
    assert_eq!(rows[0].get("grantee_name"), Some("Acme"));
}

#[test]
fn header_only_file_has_no_rows() {
    assert!(load_rows(b"a,b\n").unwrap().is_empty());
}

#[test]
fn invalid_utf8_is_a_decoding_error() {
    let err = load_rows(&[b'a', b'\n', 0xff, 0xfe, b'\n']).unwrap_err();
    assert!(matches!(err, BulkDocxError::Decoding(_)), "{err:?}");
}

// ── DataRow ───────────────────────────────────────────────────────────────────

#[test]
fn insert_keeps_position_and_replaces_value() {
    let mut row = DataRow::from_pairs([("a", "1"), ("b", "2")]);
    row.insert("a", "3");
    assert_eq!(
        row.fields(),
        &[("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
    );
}

// ── Template ──────────────────────────────────────────────────────────────────

#[test]
fn template_loads_body_and_header() {
    let bytes = docx(&paragraph(&["Dear grantee_name"]), Some(&paragraph(&["Grant grant_number"])), None);
    let template = Template::from_bytes(&bytes).unwrap();
    let package = template.package();
    assert_eq!(package.body_paragraphs().unwrap(), vec!["Dear grantee_name"]);
    assert_eq!(package.header_paragraphs().unwrap(), vec!["Grant grant_number"]);
    assert_eq!(package.header_part_names(), vec!["word/header1.xml"]);
}

#[test]
fn non_zip_template_is_a_template_load_error() {
    let err = Template::from_bytes(b"not a docx").unwrap_err();
    assert!(matches!(err, BulkDocxError::TemplateLoad(_)), "{err:?}");
}

#[test]
fn zip_without_document_part_is_a_template_load_error() {
    let bytes = zip_bytes(&[("readme.txt", b"hello".as_slice())]);
    let err = Template::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, BulkDocxError::TemplateLoad(_)), "{err:?}");
}

#[test]
fn malformed_body_xml_is_a_template_load_error() {
    let bytes = zip_bytes(&[(
        "word/document.xml",
        b"<w:document><w:body><w:p></w:body>".as_slice(),
    )]);
    let err = Template::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, BulkDocxError::TemplateLoad(_)), "{err:?}");
}

/// Overwrite the uncompressed size in every local and central header.
fn forge_declared_sizes(zip: &mut [u8], size: u32) {
    let size = size.to_le_bytes();
    let mut i = 0;
    while i + 4 <= zip.len() {
        match &zip[i..i + 4] {
            b"PK\x03\x04" => {
                zip[i + 22..i + 26].copy_from_slice(&size);
                i += 30;
            }
            b"PK\x01\x02" => {
                zip[i + 24..i + 28].copy_from_slice(&size);
                i += 46;
            }
            _ => i += 1,
        }
    }
}

#[test]
fn forged_entry_size_is_a_template_load_error() {
    let mut bytes = docx(&paragraph(&["grantee_name"]), None, None);
    forge_declared_sizes(&mut bytes, 0xFFFF_FFF0);

    let err = Template::from_bytes(&bytes).unwrap_err();
    match err {
        BulkDocxError::TemplateLoad(msg) => assert!(msg.contains("declares"), "{msg}"),
        other => panic!("expected TemplateLoad, got {other:?}"),
    }
}

#[test]
fn missing_template_file_is_a_template_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Template::from_path(dir.path().join("absent.docx")).unwrap_err();
    assert!(matches!(err, BulkDocxError::TemplateLoad(_)), "{err:?}");
}

#[test]
fn package_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("letter.docx");
    let package = DocxPackage::from_bytes(&docx(&paragraph(&["Hello"]), None, None)).unwrap();
    package.save(&path).unwrap();

    let reopened = DocxPackage::from_path(&path).unwrap();
    assert_eq!(reopened, package);
}
