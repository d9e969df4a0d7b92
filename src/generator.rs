use crate::archive::{ArchivePackager, NamingScheme, SkippedRow};
use crate::merge::MergeEngine;
use crate::{load_rows, BulkDocxError, GeneratorConfig, Result, Template};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

// ── BatchStage ───────────────────────────────────────────────────────────────

/// Where a batch request is in its lifecycle.
///
/// `Validating` repeats per row; a row that fails validation moves straight
/// on to the next row's `Validating` without visiting `Merging`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Idle,
    Loading,
    Validating(usize),
    Merging(usize),
    /// At least one document was written.
    Packaged,
    /// Every row was skipped.
    Done,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStage::Idle => f.write_str("idle"),
            BatchStage::Loading => f.write_str("loading"),
            BatchStage::Validating(row) => write!(f, "validating row {row}"),
            BatchStage::Merging(row) => write!(f, "merging row {row}"),
            BatchStage::Packaged => f.write_str("packaged"),
            BatchStage::Done => f.write_str("done"),
        }
    }
}

// ── BatchReport ──────────────────────────────────────────────────────────────

/// Result of one batch request.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// ZIP container holding one document per valid row.
    pub archive: Vec<u8>,

    /// Entry names in the archive, in row order.
    pub entries: Vec<String>,

    /// Rows left out, with the fields they lacked.
    pub skipped: Vec<SkippedRow>,

    /// Total number of data rows read.
    pub total_rows: usize,

    /// [`BatchStage::Packaged`] or [`BatchStage::Done`].
    pub stage: BatchStage,
}

impl BatchReport {
    /// Returns `true` when no row produced a document.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn an all-skipped batch into [`BulkDocxError::EmptyResult`].
    pub fn require_documents(self) -> Result<Self> {
        if self.is_empty() {
            Err(BulkDocxError::EmptyResult {
                skipped: self.skipped.len(),
            })
        } else {
            Ok(self)
        }
    }
}

// ── DocumentGenerator ────────────────────────────────────────────────────────

/// Entry point for batch document generation.
///
/// Each call to [`generate`](DocumentGenerator::generate) is self-contained:
/// it reads its own rows and builds its own archive, and the template is
/// only ever copied.
///
/// ```no_run
/// use bulkdocx::{DocumentGenerator, GeneratorConfig, NamingScheme, RequiredFieldSet};
///
/// let cfg = GeneratorConfig {
///     required_fields: RequiredFieldSet::new(["grantee_name", "contact_email"]),
///     include_footers: true,
///     ..Default::default()
/// };
/// let generator = DocumentGenerator::with_config("template.docx", cfg).unwrap();
/// let csv = std::fs::read("rows.csv").unwrap();
/// let report = generator
///     .generate(&csv, &NamingScheme::new("FY25", "Grant Agreement"))
///     .unwrap();
/// ```
pub struct DocumentGenerator {
    template: Template,
    config: GeneratorConfig,
}

impl DocumentGenerator {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Load a template from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            template: Template::from_path(path)?,
            config: GeneratorConfig::default(),
        })
    }

    /// Load a template from an in-memory `.docx`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            template: Template::from_bytes(data)?,
            config: GeneratorConfig::default(),
        })
    }

    /// Load a template from the file system with a custom [`GeneratorConfig`].
    pub fn with_config<P: AsRef<Path>>(path: P, config: GeneratorConfig) -> Result<Self> {
        Ok(Self {
            template: Template::from_path(path)?,
            config,
        })
    }

    /// Use an already-loaded template.
    pub fn from_template(template: Template, config: GeneratorConfig) -> Self {
        Self { template, config }
    }

    // ── Generation ────────────────────────────────────────────────────────────

    /// Merge every row of the CSV `data` into the template and package the
    /// results.
    ///
    /// Fails before any row is merged when `data` is not UTF-8
    /// ([`BulkDocxError::Decoding`]), not parseable CSV, or longer than
    /// [`GeneratorConfig::max_rows`]. Rows missing required fields are
    /// skipped and listed in the report; a batch where every row is skipped
    /// still succeeds with an empty archive.
    pub fn generate(&self, data: &[u8], naming: &NamingScheme) -> Result<BatchReport> {
        let mut stage = BatchStage::Idle;
        advance(&mut stage, BatchStage::Loading);

        let rows = load_rows(data)?;
        if let Some(max) = self.config.max_rows {
            if rows.len() > max {
                return Err(BulkDocxError::TooManyRows {
                    rows: rows.len(),
                    limit: max,
                });
            }
        }

        let engine = MergeEngine::new(&self.template, &self.config);
        let mut packager = ArchivePackager::new(naming.clone());

        for (idx, row) in rows.iter().enumerate() {
            let row_number = idx + 1;
            advance(&mut stage, BatchStage::Validating(row_number));

            if let Err(e) = engine.validate(row_number, row) {
                match e {
                    BulkDocxError::MissingFields { row, missing } => {
                        warn!(row, missing = %missing.join(", "), "skipping row");
                        packager.record_skip(SkippedRow { row, missing });
                        continue;
                    }
                    other => return Err(other),
                }
            }

            advance(&mut stage, BatchStage::Merging(row_number));
            let document = engine.merge(row_number, row)?;
            packager.add(row, &document)?;
        }

        let archive = packager.finish()?;
        let final_stage = if archive.is_empty() {
            BatchStage::Done
        } else {
            BatchStage::Packaged
        };
        advance(&mut stage, final_stage);

        info!(
            rows = rows.len(),
            generated = archive.entries.len(),
            skipped = archive.skipped_count(),
            "batch finished"
        );

        Ok(BatchReport {
            archive: archive.bytes,
            entries: archive.entries,
            skipped: archive.skipped,
            total_rows: rows.len(),
            stage,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

fn advance(stage: &mut BatchStage, next: BatchStage) {
    debug!(from = %stage, to = %next, "batch stage");
    *stage = next;
}
