//! # bulkdocx
//!
//! A Rust library for bulk Word document assembly.
//!
//! ## What this crate does
//!
//! 1. **Load a template**: opens a `.docx` template into an in-memory package
//!    and decodes a UTF-8 CSV file into ordered data rows.
//! 2. **Merge**: for every row, deep-copies the template and replaces each
//!    column name found literally in the body and header paragraphs with the
//!    row's value for that column.
//! 3. **Package**: writes one generated document per valid row into a single
//!    ZIP archive and reports the rows skipped for missing required fields.
//!
//! Two smaller tools share the same plumbing: [`append_to_bundle`] appends
//! Word documents or rendered PDF pages to every `.docx` inside a ZIP
//! bundle, and [`Checklist`] checks an uploaded document's text against a
//! fixed compliance checklist.
//!
//! ## Quick example
//!
//! ```no_run
//! use bulkdocx::{DocumentGenerator, NamingScheme};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = DocumentGenerator::from_path("award_template.docx")?;
//! let csv = std::fs::read("grantees.csv")?;
//!
//! let naming = NamingScheme::new("FY25", "Award Letter");
//! let report = generator.generate(&csv, &naming)?;
//!
//! println!("{} document(s) generated", report.entries.len());
//! for skipped in &report.skipped {
//!     println!("  skipped {skipped}");
//! }
//! std::fs::write("documents.zip", &report.archive)?;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

mod archive;
mod bundle;
mod compliance;
mod fonts;
mod generator;
mod merge;
mod package;
mod pages;
mod paragraphs;
mod substitution;
mod template;

pub use archive::{ArchivePackager, NamingScheme, PackagedArchive, SkippedRow};
pub use bundle::{append_documents, append_to_bundle, Attachment, BundleOutcome};
pub use compliance::{
    extract_text, Checklist, ChecklistResult, ComplianceReport, EvidenceSource, REFERENCE_TEXT,
};
pub use generator::{BatchReport, BatchStage, DocumentGenerator};
pub use merge::{GeneratedDocument, MergeEngine, RequiredFieldSet};
pub use package::{DocxPackage, DocxPart};
pub use pages::{rasterize_pdf, PageImage, PageRasterizer, PAGE_WIDTH_EMU};
pub use paragraphs::paragraph_texts;
pub use substitution::SubstitutionMode;
pub use template::{load_rows, DataRow, Template};

/// The document types offered for naming generated files.
pub const DOCUMENT_TYPES: &[&str] = &[
    "Award Letter",
    "Grant Agreement",
    "Commitment Letter",
    "Other",
];

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration for [`DocumentGenerator`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    /// Fields every data row must carry. Rows missing any of them are skipped
    /// and listed in [`BatchReport::skipped`].
    pub required_fields: RequiredFieldSet,

    /// How placeholders are matched inside a paragraph.
    pub substitution: SubstitutionMode,

    /// When `true`, footer parts are merged as well as the body and headers.
    pub include_footers: bool,

    /// If set, [`DocumentGenerator::generate`] refuses a data file with more
    /// rows than this before merging anything.
    pub max_rows: Option<usize>,
}

/// Runtime configuration for [`append_to_bundle`] and [`append_documents`].
#[derive(Debug, Clone)]
pub struct AppendConfig {
    /// Font family and size in points set on every run of each updated
    /// document. `None` keeps the runs' own formatting.
    pub font: Option<(String, u32)>,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            font: Some(("Times New Roman".to_string(), 12)),
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
#[derive(Error, Debug)]
pub enum BulkDocxError {
    /// A filesystem I/O error occurred (e.g. when loading or saving a file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The template bytes could not be opened as a Word document.
    #[error("Failed to load template: {0}")]
    TemplateLoad(String),

    /// Uploaded text was not valid UTF-8.
    #[error("Failed to decode text as UTF-8: {0}")]
    Decoding(String),

    /// A data row lacks one or more required fields.
    #[error("Row {row} is missing required fields: {}", .missing.join(", "))]
    MissingFields { row: usize, missing: Vec<String> },

    /// The data file holds more rows than [`GeneratorConfig::max_rows`].
    #[error("Data file has {rows} rows, the limit is {limit}")]
    TooManyRows { rows: usize, limit: usize },

    /// No data row passed validation, so the archive holds no documents.
    #[error("No documents were generated ({skipped} row(s) skipped)")]
    EmptyResult { skipped: usize },

    /// The CSV reader rejected the data file.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The ZIP container could not be read or written.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A document part is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The underlying lopdf parser returned an error.
    #[error("PDF parse error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// The document opened but its structure is not what was expected.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The uploaded file type is not handled.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, BulkDocxError>;
