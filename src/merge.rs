use crate::package::MAIN_DOCUMENT_PART;
use crate::paragraphs::rewrite_paragraphs;
use crate::substitution::{substitute_runs, SubstitutionMode};
use crate::{BulkDocxError, DataRow, DocxPackage, GeneratorConfig, Result, Template};
use tracing::debug;

/// Fields the grant-letter templates rely on.
const GRANT_LETTER_FIELDS: &[&str] = &[
    "grantee_name",
    "grant_number",
    "grantee_street",
    "grantee_citystatezip",
    "award_amount_numerical",
    "convert_numbers_to_words",
    "contact_name",
    "contact_title",
    "contact_number",
    "contact_email",
    "sig_name",
    "sig_title",
];

// ── RequiredFieldSet ─────────────────────────────────────────────────────────

/// Ordered set of field names every data row must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFieldSet {
    names: Vec<String>,
}

impl Default for RequiredFieldSet {
    /// The grant-letter field set.
    fn default() -> Self {
        Self::new(GRANT_LETTER_FIELDS.iter().copied())
    }
}

impl RequiredFieldSet {
    /// Build a set from names; duplicates keep their first position.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    /// A set that accepts every row.
    pub fn empty() -> Self {
        Self { names: Vec::new() }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Names of the required fields `row` lacks, in set order.
    pub fn missing_from(&self, row: &DataRow) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !row.contains(name))
            .cloned()
            .collect()
    }
}

// ── GeneratedDocument ────────────────────────────────────────────────────────

/// An independent copy of the template with one row's values substituted.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    /// 1-based number of the data row this document was built from.
    pub row: usize,

    /// The merged package.
    pub package: DocxPackage,

    /// How many paragraphs had at least one placeholder replaced.
    pub paragraphs_changed: usize,
}

impl GeneratedDocument {
    /// Serialise the document to `.docx` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.package.to_bytes()
    }
}

// ── MergeEngine ──────────────────────────────────────────────────────────────

/// Validates rows and merges them into copies of a template.
pub struct MergeEngine<'a> {
    template: &'a Template,
    config: &'a GeneratorConfig,
}

impl<'a> MergeEngine<'a> {
    pub fn new(template: &'a Template, config: &'a GeneratorConfig) -> Self {
        Self { template, config }
    }

    /// Check that `row` carries every required field.
    ///
    /// `row_number` is only used to label the error.
    pub fn validate(&self, row_number: usize, row: &DataRow) -> Result<()> {
        let missing = self.config.required_fields.missing_from(row);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BulkDocxError::MissingFields {
                row: row_number,
                missing,
            })
        }
    }

    /// Validate `row`, then merge it into a deep copy of the template.
    ///
    /// On a missing field nothing is substituted and
    /// [`BulkDocxError::MissingFields`] is returned.
    pub fn merge(&self, row_number: usize, row: &DataRow) -> Result<GeneratedDocument> {
        self.validate(row_number, row)?;

        let mut package = self.template.instantiate();
        let mut paragraphs_changed = 0;

        for part in self.story_parts(&package) {
            let Some(xml) = package.part(&part) else {
                continue;
            };
            let (rewritten, changed) =
                substitute_part(xml, row.fields(), self.config.substitution)?;
            if changed > 0 {
                package.set_part(&part, rewritten);
                paragraphs_changed += changed;
            }
        }

        debug!(row = row_number, paragraphs_changed, "row merged");
        Ok(GeneratedDocument {
            row: row_number,
            package,
            paragraphs_changed,
        })
    }

    /// Parts whose paragraphs take substitutions: the body, every header,
    /// and the footers when configured.
    fn story_parts(&self, package: &DocxPackage) -> Vec<String> {
        let mut parts = vec![MAIN_DOCUMENT_PART.to_string()];
        parts.extend(package.header_part_names());
        if self.config.include_footers {
            parts.extend(package.footer_part_names());
        }
        parts
    }
}

/// Replace placeholders in every paragraph of one XML part.
fn substitute_part(
    xml: &[u8],
    fields: &[(String, String)],
    mode: SubstitutionMode,
) -> Result<(Vec<u8>, usize)> {
    rewrite_paragraphs(xml, |runs| substitute_runs(runs, fields, mode))
}
