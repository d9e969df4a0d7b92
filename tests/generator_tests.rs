// Batch generation end to end: rows in, archive and skip report out.

mod common;

use bulkdocx::{
    ArchivePackager, BatchStage, BulkDocxError, DataRow, DocumentGenerator, DocxPackage,
    GeneratorConfig, MergeEngine, NamingScheme, RequiredFieldSet, SkippedRow, Template,
};
use common::*;

fn letter_template() -> Vec<u8> {
    docx(
        &paragraph(&["Dear grantee_name, your award is award_amount_numerical dollars."]),
        Some(&paragraph(&["Grant grant_number"])),
        None,
    )
}

fn csv(rows: &[String]) -> Vec<u8> {
    let mut out = String::from(GRANT_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out.into_bytes()
}

// ── Archive contents ──────────────────────────────────────────────────────────

#[test]
fn one_entry_per_valid_row_with_predicted_names() {
    let generator = DocumentGenerator::from_bytes(&letter_template()).unwrap();
    let data = csv(&[grant_row("Acme", "1000"), grant_row("Beta", "2000"), grant_row("Gamma", "3")]);
    let naming = NamingScheme::new("FY25", "Award Letter");

    let report = generator.generate(&data, &naming).unwrap();

    let expected = vec![
        "FY25_Acme_AwardLetter.docx",
        "FY25_Beta_AwardLetter.docx",
        "FY25_Gamma_AwardLetter.docx",
    ];
    assert_eq!(report.entries, expected);
    assert_eq!(zip_names(&report.archive), expected);
    assert!(report.skipped.is_empty());
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.stage, BatchStage::Packaged);
}

#[test]
fn archived_documents_are_well_formed_and_filled() {
    let generator = DocumentGenerator::from_bytes(&letter_template()).unwrap();
    let data = csv(&[grant_row("Acme", "1000")]);
    let report = generator
        .generate(&data, &NamingScheme::new("FY25", "Award Letter"))
        .unwrap();

    let bytes = zip_entry(&report.archive, "FY25_Acme_AwardLetter.docx");
    let document = DocxPackage::from_bytes(&bytes).unwrap();
    assert_eq!(
        document.body_paragraphs().unwrap(),
        vec!["Dear Acme, your award is 1000 dollars."]
    );
    assert_eq!(document.header_paragraphs().unwrap(), vec!["Grant G-1"]);
    assert!(document.part("[Content_Types].xml").is_some());
}

#[test]
fn rows_missing_required_fields_are_skipped_and_reported() {
    let generator = DocumentGenerator::from_template(
        Template::from_bytes(&letter_template()).unwrap(),
        GeneratorConfig {
            required_fields: RequiredFieldSet::new(["grantee_name", "contact_email"]),
            ..Default::default()
        },
    );
    let data = b"grantee_name,contact_email\nAcme,a@acme.org\nBeta\nGamma,g@gamma.org\n";

    let report = generator
        .generate(data, &NamingScheme::new("B", "Grant Agreement"))
        .unwrap();

    assert_eq!(
        report.entries,
        vec!["B_Acme_GrantAgreement.docx", "B_Gamma_GrantAgreement.docx"]
    );
    assert_eq!(
        report.skipped,
        vec![SkippedRow {
            row: 2,
            missing: vec!["contact_email".into()]
        }]
    );
    assert_eq!(report.skipped[0].to_string(), "row 2: missing: contact_email");
}

#[test]
fn missing_header_column_skips_every_row() {
    let generator = DocumentGenerator::from_bytes(&letter_template()).unwrap();
    let data = b"grantee_name\nAcme\nBeta\n";

    let report = generator.generate(data, &NamingScheme::new("X", "Other")).unwrap();

    assert!(report.is_empty());
    assert_eq!(report.stage, BatchStage::Done);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.skipped[0].missing.len(), 11);
    assert!(zip_names(&report.archive).is_empty());

    let err = report.require_documents().unwrap_err();
    assert!(matches!(err, BulkDocxError::EmptyResult { skipped: 2 }), "{err:?}");
}

#[test]
fn duplicate_keys_get_numbered_names() {
    let generator = DocumentGenerator::from_bytes(&letter_template()).unwrap();
    let data = csv(&[grant_row("Acme", "1"), grant_row("Acme", "2")]);

    let report = generator
        .generate(&data, &NamingScheme::new("P", "Commitment Letter"))
        .unwrap();

    assert_eq!(
        report.entries,
        vec!["P_Acme_CommitmentLetter.docx", "P_Acme_CommitmentLetter_2.docx"]
    );
}

#[test]
fn path_separators_in_keys_are_replaced() {
    let naming = NamingScheme::new("P", "Other");
    let row = DataRow::from_pairs([("grantee_name", "A/B\\C")]);
    assert_eq!(naming.entry_name(1, &row), "P_A_B_C_Other.docx");
}

#[test]
fn rows_without_key_field_use_row_number() {
    let naming = NamingScheme::new("P", "Other").with_key_field("grant_number");
    let row = DataRow::from_pairs([("grantee_name", "Acme")]);
    assert_eq!(naming.entry_name(4, &row), "P_row4_Other.docx");
}

// ── Fatal errors ──────────────────────────────────────────────────────────────

#[test]
fn undecodable_data_fails_the_batch() {
    let generator = DocumentGenerator::from_bytes(&letter_template()).unwrap();
    let err = generator
        .generate(&[0xc3, 0x28], &NamingScheme::new("X", "Other"))
        .unwrap_err();
    assert!(matches!(err, BulkDocxError::Decoding(_)), "{err:?}");
}

#[test]
fn unreadable_template_fails_before_any_row() {
    let err = DocumentGenerator::from_bytes(b"PK\x03\x04 broken").err().unwrap();
    assert!(matches!(err, BulkDocxError::TemplateLoad(_)), "{err:?}");
}

#[test]
fn row_limit_is_enforced_before_merging() {
    let generator = DocumentGenerator::from_template(
        Template::from_bytes(&letter_template()).unwrap(),
        GeneratorConfig {
            max_rows: Some(1),
            ..Default::default()
        },
    );
    let data = csv(&[grant_row("Acme", "1"), grant_row("Beta", "2")]);
    let err = generator.generate(&data, &NamingScheme::new("X", "Other")).unwrap_err();
    assert!(
        matches!(err, BulkDocxError::TooManyRows { rows: 2, limit: 1 }),
        "{err:?}"
    );
}

// ── Packager used directly ────────────────────────────────────────────────────

#[test]
fn packager_writes_pairs_and_keeps_skips() {
    let template = Template::from_bytes(&letter_template()).unwrap();
    let config = GeneratorConfig {
        required_fields: RequiredFieldSet::empty(),
        ..Default::default()
    };
    let engine = MergeEngine::new(&template, &config);
    let row = DataRow::from_pairs([("grantee_name", "Acme")]);
    let document = engine.merge(1, &row).unwrap();
    let skip = SkippedRow {
        row: 2,
        missing: vec!["grantee_name".into()],
    };

    let archive = ArchivePackager::package(
        NamingScheme::new("Q", "Award Letter"),
        [(&row, &document)],
        vec![skip.clone()],
    )
    .unwrap();

    assert_eq!(archive.entries, vec!["Q_Acme_AwardLetter.docx"]);
    assert_eq!(zip_names(&archive.bytes), archive.entries);
    assert_eq!(archive.skipped, vec![skip]);
    assert_eq!(archive.skipped_count(), 1);
}

#[test]
fn empty_packager_produces_a_valid_empty_archive() {
    let archive = ArchivePackager::new(NamingScheme::new("Q", "Other"))
        .finish()
        .unwrap();
    assert!(archive.is_empty());
    assert!(zip_names(&archive.bytes).is_empty());
}

// ── Error display ─────────────────────────────────────────────────────────────

#[test]
fn error_display_is_non_empty() {
    let errors: &[BulkDocxError] = &[
        BulkDocxError::TemplateLoad("test".into()),
        BulkDocxError::Decoding("test".into()),
        BulkDocxError::MissingFields {
            row: 1,
            missing: vec!["a".into(), "b".into()],
        },
        BulkDocxError::EmptyResult { skipped: 3 },
        BulkDocxError::TooManyRows { rows: 5, limit: 2 },
        BulkDocxError::InvalidDocument("test".into()),
        BulkDocxError::UnsupportedFormat("test".into()),
    ];
    for e in errors {
        assert!(!e.to_string().is_empty(), "empty display for {e:?}");
    }
    assert_eq!(
        errors[2].to_string(),
        "Row 1 is missing required fields: a, b"
    );
}
