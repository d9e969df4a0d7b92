use crate::{DataRow, GeneratedDocument, Result};
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── NamingScheme ─────────────────────────────────────────────────────────────

/// How generated documents are named inside the archive:
/// `<prefix>_<key>_<documentType without spaces>.docx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
    /// User-supplied batch prefix.
    pub prefix: String,

    /// Document type label, e.g. `"Award Letter"`.
    pub document_type: String,

    /// Field whose value identifies the row in the file name.
    pub key_field: String,
}

impl NamingScheme {
    /// A scheme keyed on `grantee_name`.
    pub fn new(prefix: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            document_type: document_type.into(),
            key_field: "grantee_name".into(),
        }
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    /// The entry name for `row`. A row lacking the key field is keyed
    /// `row<N>`.
    ///
    /// ```
    /// # use bulkdocx::{DataRow, NamingScheme};
    /// let row = DataRow::from_pairs([("grantee_name", "Acme")]);
    /// let naming = NamingScheme::new("FY25", "Award Letter");
    /// assert_eq!(naming.entry_name(1, &row), "FY25_Acme_AwardLetter.docx");
    /// ```
    pub fn entry_name(&self, row_number: usize, row: &DataRow) -> String {
        let key = match row.get(&self.key_field) {
            Some(value) => value.replace(['/', '\\'], "_"),
            None => format!("row{row_number}"),
        };
        format!(
            "{}_{}_{}.docx",
            self.prefix,
            key,
            self.document_type.replace(' ', "")
        )
    }
}

// ── SkippedRow ───────────────────────────────────────────────────────────────

/// A data row left out of the archive and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based data row number (the header is not counted).
    pub row: usize,

    /// Required fields the row lacks.
    pub missing: Vec<String>,
}

impl fmt::Display for SkippedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: missing: {}", self.row, self.missing.join(", "))
    }
}

// ── PackagedArchive ──────────────────────────────────────────────────────────

/// A finished archive with its entry names and the skip report.
#[derive(Debug, Clone)]
pub struct PackagedArchive {
    /// ZIP container bytes.
    pub bytes: Vec<u8>,

    /// Entry names, in the order they were written.
    pub entries: Vec<String>,

    /// Rows that were not packaged.
    pub skipped: Vec<SkippedRow>,
}

impl PackagedArchive {
    /// Returns `true` when no document made it into the archive.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

// ── ArchivePackager ──────────────────────────────────────────────────────────

/// Writes generated documents into one in-memory ZIP container.
///
/// Nothing is visible to the caller until [`ArchivePackager::finish`];
/// dropping the packager discards the partial archive.
pub struct ArchivePackager {
    naming: NamingScheme,
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: Vec<String>,
    name_counts: HashMap<String, usize>,
    skipped: Vec<SkippedRow>,
}

impl ArchivePackager {
    pub fn new(naming: NamingScheme) -> Self {
        Self {
            naming,
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: Vec::new(),
            name_counts: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Package every `(row, document)` pair and finish the archive in one
    /// call.
    pub fn package<'d, I>(
        naming: NamingScheme,
        documents: I,
        skipped: Vec<SkippedRow>,
    ) -> Result<PackagedArchive>
    where
        I: IntoIterator<Item = (&'d DataRow, &'d GeneratedDocument)>,
    {
        let mut packager = Self::new(naming);
        for (row, document) in documents {
            packager.add(row, document)?;
        }
        for skip in skipped {
            packager.record_skip(skip);
        }
        packager.finish()
    }

    /// Serialise `document` and write it under its derived name. Returns the
    /// entry name used.
    pub fn add(&mut self, row: &DataRow, document: &GeneratedDocument) -> Result<String> {
        let name = self.unique_name(self.naming.entry_name(document.row, row));
        let bytes = document.to_bytes()?;

        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name.as_str(), options)?;
        self.writer.write_all(&bytes)?;

        self.entries.push(name.clone());
        Ok(name)
    }

    /// Note a row that was left out.
    pub fn record_skip(&mut self, skipped: SkippedRow) {
        self.skipped.push(skipped);
    }

    /// Finalise the container. With no documents added this is a valid,
    /// empty ZIP.
    pub fn finish(self) -> Result<PackagedArchive> {
        let bytes = self.writer.finish()?.into_inner();
        Ok(PackagedArchive {
            bytes,
            entries: self.entries,
            skipped: self.skipped,
        })
    }

    /// `name`, or `name` with `_2`, `_3`, … before the extension when it was
    /// already used in this archive.
    fn unique_name(&mut self, name: String) -> String {
        let count = self.name_counts.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return name;
        }
        let n = *count;
        let candidate = match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
            None => format!("{name}_{n}"),
        };
        self.unique_name(candidate)
    }
}
