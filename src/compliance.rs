//! Checking an uploaded document against a fixed compliance checklist.

use crate::{BulkDocxError, DocxPackage, Result};
use lopdf::Document;
use std::path::Path;
use tracing::{debug, info};

/// Regulation text the checklist is derived from, handed to an
/// [`EvidenceSource`] alongside the document text.
pub const REFERENCE_TEXT: &str = "\
COMAR 14.26.02 - Green Building Tax Credit Program:
2. Each initial FOA shall include an application period of at least 30 calendar days.
3. Each FOA shall explain each of the following when applicable:
   3.1 Name and purpose
   3.2 Duration and schedule
   3.3 Requirements
   3.4 Deadlines
   3.5 Anticipated funding amount at the time the FOA is published
   3.6 Designation as a competitive or a noncompetitive grant
   3.7 Evaluation criteria
   3.8 Method for determining a grant amount under the FOA and whether an amount other than the requested amount may be offered
   3.9 The required form and manner in which to submit a complete application
   3.10 Limitations on the offer of a grant, including the amount for an individual grant or the number of grants an applicant may receive
   3.11 Evaluation process
   3.12 Other information the Administration determines is appropriate
";

const FOA_REQUIREMENTS: &[&str] = &[
    "1. The Administration shall publish on its website a FOA for each grant offered by the Administration.",
    "2. Each initial FOA shall include an application period of at least 30 calendar days.",
    "3. Each FOA shall explain each of the following when applicable:",
    "3.1 Name and purpose",
    "3.2 Duration and schedule",
    "3.3 Requirements",
    "3.4 Deadlines",
    "3.5 Anticipated funding amount at the time the FOA is published",
    "3.6 Designation as a competitive or a noncompetitive grant",
    "3.7 Evaluation criteria",
    "3.8 Method for determining a grant amount under the FOA and whether an amount other than the requested amount may be offered",
    "3.9 The required form and manner in which to submit a complete application",
    "3.10 Limitations on the offer of a grant, including the amount for an individual grant or the number of grants an applicant may receive",
    "3.11 Evaluation process",
    "3.12 Other information the Administration determines is appropriate",
];

// ── Text extraction ──────────────────────────────────────────────────────────

/// Plain text of an uploaded document, chosen by file extension:
/// `.pdf` page text, `.docx` body paragraphs one per line, anything else
/// decoded as UTF-8.
pub fn extract_text(file_name: &str, data: &[u8]) -> Result<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("pdf") => pdf_text(data),
        Some("docx") => Ok(DocxPackage::from_bytes(data)?.body_paragraphs()?.join("\n")),
        Some("doc") => Err(BulkDocxError::UnsupportedFormat(
            "legacy .doc files are not supported; save as .docx".into(),
        )),
        _ => String::from_utf8(data.to_vec()).map_err(|e| BulkDocxError::Decoding(e.to_string())),
    }
}

fn pdf_text(data: &[u8]) -> Result<String> {
    let document = Document::load_mem(data)?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(BulkDocxError::InvalidDocument("PDF has no pages".into()));
    }
    let text = document.extract_text(&pages)?;
    debug!(pages = pages.len(), chars = text.len(), "pdf text extracted");
    Ok(text)
}

// ── Checklist ────────────────────────────────────────────────────────────────

/// Outcome for one checklist item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistResult {
    pub item: String,
    pub compliant: bool,
}

/// An ordered list of requirement statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checklist {
    items: Vec<String>,
}

impl Default for Checklist {
    fn default() -> Self {
        Self::foa_requirements()
    }
}

impl Checklist {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// The funding-opportunity-announcement requirements of COMAR 14.26.02.
    pub fn foa_requirements() -> Self {
        Self::new(FOA_REQUIREMENTS.iter().copied())
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// An item is compliant when its full text appears in `document_text`,
    /// ignoring case.
    pub fn evaluate(&self, document_text: &str) -> Vec<ChecklistResult> {
        let haystack = document_text.to_lowercase();
        self.items
            .iter()
            .map(|item| ChecklistResult {
                item: item.clone(),
                compliant: haystack.contains(&item.to_lowercase()),
            })
            .collect()
    }

    /// Evaluate `document_text` and, when a source is given, attach its
    /// supporting evidence.
    pub fn review(
        &self,
        document_text: &str,
        evidence: Option<&dyn EvidenceSource>,
    ) -> Result<ComplianceReport> {
        let results = self.evaluate(document_text);
        let evidence = match evidence {
            Some(source) => Some(source.supporting_evidence(document_text, REFERENCE_TEXT)?),
            None => None,
        };

        info!(
            items = results.len(),
            compliant = results.iter().filter(|r| r.compliant).count(),
            "checklist evaluated"
        );
        Ok(ComplianceReport { results, evidence })
    }
}

// ── Evidence ─────────────────────────────────────────────────────────────────

/// Produces free-text supporting evidence for a document against the
/// reference regulation, typically by calling a text-generation service.
pub trait EvidenceSource {
    fn supporting_evidence(&self, document_text: &str, reference_text: &str) -> Result<String>;
}

// ── ComplianceReport ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceReport {
    pub results: Vec<ChecklistResult>,
    pub evidence: Option<String>,
}

impl ComplianceReport {
    pub fn compliant_count(&self) -> usize {
        self.results.iter().filter(|r| r.compliant).count()
    }

    /// CSV with columns `Checklist Item`, `Compliance` (`Yes`/`No`) and
    /// `Supporting Evidence`; the evidence is written on the first row only.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Checklist Item", "Compliance", "Supporting Evidence"])?;

        for (idx, result) in self.results.iter().enumerate() {
            let evidence = match (&self.evidence, idx) {
                (Some(text), 0) => text.as_str(),
                _ => "",
            };
            let compliance = if result.compliant { "Yes" } else { "No" };
            writer.write_record([result.item.as_str(), compliance, evidence])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| BulkDocxError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| BulkDocxError::Decoding(e.to_string()))
    }
}
