use crate::{paragraphs, BulkDocxError, DocxPackage, Result};
use std::path::Path;
use tracing::{debug, warn};

// ── Template ─────────────────────────────────────────────────────────────────

/// The reference document every generated document is cloned from.
///
/// A template is read-only once loaded; [`Template::instantiate`] hands out
/// independent deep copies.
#[derive(Debug, Clone)]
pub struct Template {
    package: DocxPackage,
}

impl Template {
    /// Load a template from an in-memory `.docx`.
    ///
    /// Any failure (not a ZIP container, no main document, body or header XML
    /// not well-formed) is reported as [`BulkDocxError::TemplateLoad`] and no
    /// template is produced.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let package =
            DocxPackage::from_bytes(data).map_err(|e| BulkDocxError::TemplateLoad(e.to_string()))?;

        let mut story_parts = vec![crate::package::MAIN_DOCUMENT_PART.to_string()];
        story_parts.extend(package.header_part_names());
        story_parts.extend(package.footer_part_names());

        for name in &story_parts {
            if let Some(xml) = package.part(name) {
                paragraphs::paragraph_texts(xml)
                    .map_err(|e| BulkDocxError::TemplateLoad(format!("{name}: {e}")))?;
            }
        }

        debug!(parts = package.parts().len(), "template loaded");
        Ok(Self { package })
    }

    /// Load a template from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| BulkDocxError::TemplateLoad(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Wrap an already-opened package.
    pub fn from_package(package: DocxPackage) -> Self {
        Self { package }
    }

    /// The underlying package.
    pub fn package(&self) -> &DocxPackage {
        &self.package
    }

    /// A fresh deep copy of the template's package.
    pub fn instantiate(&self) -> DocxPackage {
        self.package.clone()
    }
}

// ── DataRow ──────────────────────────────────────────────────────────────────

/// One record of the data file: field name → value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataRow {
    fields: Vec<(String, String)>,
}

impl DataRow {
    /// Build a row from `(name, value)` pairs. A repeated name keeps its
    /// first position and takes the later value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::default();
        for (k, v) in pairs {
            row.insert(k, v);
        }
        row
    }

    /// Set `name` to `value`, keeping the field's position if it exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// The value of `name`, if the row carries it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` when the row carries `name` (an empty value counts).
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// Field names in column order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in column order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ── Data file decoding ───────────────────────────────────────────────────────

/// Decode a UTF-8 CSV file into rows, keeping file order.
///
/// The first record names the fields. A row shorter than the header lacks
/// the trailing fields (they are absent, not empty); cells beyond the
/// header are ignored. A leading byte-order mark is dropped.
///
/// Fails with [`BulkDocxError::Decoding`] when the bytes are not UTF-8.
pub fn load_rows(data: &[u8]) -> Result<Vec<DataRow>> {
    let text = std::str::from_utf8(data).map_err(|e| BulkDocxError::Decoding(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() > headers.len() {
            warn!(
                row = idx + 1,
                extra = record.len() - headers.len(),
                "ignoring cells beyond the header"
            );
        }
        rows.push(DataRow::from_pairs(
            headers.iter().cloned().zip(record.iter().map(str::to_string)),
        ));
    }

    debug!(rows = rows.len(), columns = headers.len(), "data file decoded");
    Ok(rows)
}
