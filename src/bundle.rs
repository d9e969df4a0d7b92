//! Appending Word documents and PDF pages onto the documents of a ZIP bundle.
//!
//! The body content of each attachment (everything inside `w:body` except its
//! closing section properties) is copied to the end of the target body, just
//! before the target's own `w:sectPr`, so the target keeps its page setup.
//! PDF attachments arrive as rendered pages and are added as pictures.

use crate::fonts::set_run_font;
use crate::package::{read_entry, MAIN_DOCUMENT_PART};
use crate::pages::{embed_pages, max_drawing_id, rasterize_pdf, PageImage, PageRasterizer};
use crate::paragraphs::{is_word_empty, is_word_tag, next_event};
use crate::{AppendConfig, BulkDocxError, DocxPackage, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{NsReader, Writer};
use std::borrow::Cow;
use std::io::{Cursor, Write};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const BODY: &[u8] = b"body";
const SECTION_PROPERTIES: &[u8] = b"sectPr";

/// Something appended to the end of a Word document.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// The body content of another Word document.
    Document(DocxPackage),

    /// Rendered PDF pages, one picture per page with page breaks between.
    Pages(Vec<PageImage>),
}

impl Attachment {
    /// Render every page of `pdf` with `rasterizer`.
    pub fn from_pdf(pdf: &[u8], rasterizer: &dyn PageRasterizer) -> Result<Self> {
        Ok(Self::Pages(rasterize_pdf(pdf, rasterizer)?))
    }
}

impl From<DocxPackage> for Attachment {
    fn from(document: DocxPackage) -> Self {
        Self::Document(document)
    }
}

/// Result of [`append_to_bundle`].
#[derive(Debug, Clone)]
pub struct BundleOutcome {
    /// The rewritten bundle.
    pub bytes: Vec<u8>,

    /// `.docx` entries that received the attachments.
    pub updated: Vec<String>,

    /// `.docx` entries that could not be opened and were copied unchanged.
    pub skipped: Vec<String>,
}

/// Append every attachment to every `.docx` entry of the ZIP `bundle`.
///
/// Entries keep their order; non-Word entries and directories are copied
/// as they are.
pub fn append_to_bundle(
    bundle: &[u8],
    attachments: &[Attachment],
    config: &AppendConfig,
) -> Result<BundleOutcome> {
    let prepared = prepare(attachments)?;

    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut updated = Vec::new();
    let mut skipped = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if entry.is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }

        let declared = entry.size();
        let mut data = read_entry(&mut entry, &name, declared, bundle.len())?;

        if name.to_ascii_lowercase().ends_with(".docx") {
            match DocxPackage::from_bytes(&data).and_then(|doc| append_prepared(&doc, &prepared, config)) {
                Ok(merged) => {
                    data = merged.to_bytes()?;
                    updated.push(name.clone());
                }
                Err(e) => {
                    warn!(entry = %name, error = %e, "copying unreadable document unchanged");
                    skipped.push(name.clone());
                }
            }
        }

        writer.start_file(name, options)?;
        writer.write_all(&data)?;
    }

    info!(
        updated = updated.len(),
        skipped = skipped.len(),
        attachments = attachments.len(),
        "bundle processed"
    );

    Ok(BundleOutcome {
        bytes: writer.finish()?.into_inner(),
        updated,
        skipped,
    })
}

/// Append each attachment, in order, to `target`.
pub fn append_documents(
    target: &DocxPackage,
    attachments: &[Attachment],
    config: &AppendConfig,
) -> Result<DocxPackage> {
    append_prepared(target, &prepare(attachments)?, config)
}

// ── Body extraction ──────────────────────────────────────────────────────────

/// Body children of one document plus the namespaces its root declares.
#[derive(Clone)]
struct BodyContent {
    events: Vec<Event<'static>>,
    namespaces: Vec<(String, String)>,
}

/// An attachment ready to be appended to any number of targets.
enum Prepared<'a> {
    Body(BodyContent),
    Pages(&'a [PageImage]),
}

fn prepare<'a>(attachments: &'a [Attachment]) -> Result<Vec<Prepared<'a>>> {
    if attachments.is_empty() {
        return Err(BulkDocxError::InvalidDocument(
            "at least one document to append is required".into(),
        ));
    }
    attachments
        .iter()
        .map(|attachment| -> Result<Prepared<'a>> {
            match attachment {
                Attachment::Document(doc) => Ok(Prepared::Body(extract_body(doc.main_document()?)?)),
                Attachment::Pages(pages) => Ok(Prepared::Pages(pages.as_slice())),
            }
        })
        .collect()
}

fn extract_body(xml: &[u8]) -> Result<BodyContent> {
    let mut reader = NsReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut events = Vec::new();
    let mut namespaces = Vec::new();
    let mut depth = 0usize;
    let mut body_level: Option<usize> = None;
    let mut skip_level: Option<usize> = None;

    loop {
        let (word, event) = next_event(&mut reader, &mut buf)?;

        match &event {
            Event::Eof => break,
            Event::Start(e) => {
                let level = depth;
                depth += 1;
                if level == 0 {
                    namespaces = declared_namespaces(e);
                    continue;
                }
                let Some(body) = body_level else {
                    if is_word_tag(word, &event, BODY, true) {
                        body_level = Some(level);
                    }
                    continue;
                };
                if skip_level.is_some() {
                    continue;
                }
                if level == body + 1 && is_word_tag(word, &event, SECTION_PROPERTIES, true) {
                    skip_level = Some(level);
                    continue;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                let level = depth;
                let Some(body) = body_level else {
                    continue;
                };
                if level == body && is_word_tag(word, &event, BODY, false) {
                    body_level = None;
                    continue;
                }
                if let Some(skip) = skip_level {
                    if level == skip {
                        skip_level = None;
                    }
                    continue;
                }
            }
            Event::Empty(_) => {
                let Some(body) = body_level else {
                    continue;
                };
                if skip_level.is_some()
                    || (depth == body + 1 && is_word_empty(word, &event, SECTION_PROPERTIES))
                {
                    continue;
                }
            }
            _ => {
                if body_level.is_none() || skip_level.is_some() {
                    continue;
                }
            }
        }

        events.push(event);
    }

    Ok(BodyContent { events, namespaces })
}

/// `xmlns` and `xmlns:*` declarations of an element.
fn declared_namespaces(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            (key == "xmlns" || key.starts_with("xmlns:"))
                .then(|| (key, String::from_utf8_lossy(&attr.value).into_owned()))
        })
        .collect()
}

// ── Body insertion ───────────────────────────────────────────────────────────

fn append_prepared(
    target: &DocxPackage,
    prepared: &[Prepared<'_>],
    config: &AppendConfig,
) -> Result<DocxPackage> {
    let mut merged = target.clone();
    let mut next_drawing_id = max_drawing_id(target.main_document()?)? + 1;
    let mut contents: Vec<Cow<'_, BodyContent>> = Vec::with_capacity(prepared.len());

    for item in prepared {
        match item {
            Prepared::Body(body) => contents.push(Cow::Borrowed(body)),
            Prepared::Pages(pages) => {
                let xml = embed_pages(&mut merged, pages, &mut next_drawing_id)?;
                contents.push(Cow::Owned(extract_body(xml.as_bytes())?));
            }
        }
    }

    let mut xml = insert_body_content(target.main_document()?, &contents)?;
    if let Some((font, points)) = &config.font {
        xml = set_run_font(&xml, font, *points)?;
    }
    merged.set_part(MAIN_DOCUMENT_PART, xml);
    debug!(attachments = contents.len(), "attachments appended");
    Ok(merged)
}

fn insert_body_content(xml: &[u8], contents: &[Cow<'_, BodyContent>]) -> Result<Vec<u8>> {
    let mut reader = NsReader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut body_level: Option<usize> = None;
    let mut inserted = false;

    loop {
        let (word, event) = next_event(&mut reader, &mut buf)?;
        let body_start = is_word_tag(word, &event, BODY, true);
        let body_end = is_word_tag(word, &event, BODY, false);
        let section_start = is_word_tag(word, &event, SECTION_PROPERTIES, true)
            || is_word_empty(word, &event, SECTION_PROPERTIES);
        let empty_body = is_word_empty(word, &event, BODY);

        match event {
            Event::Eof => break,
            Event::Start(mut e) => {
                let level = depth;
                depth += 1;
                if level == 0 {
                    add_missing_namespaces(&mut e, contents);
                } else if body_level.is_none() && body_start {
                    body_level = Some(level);
                } else if !inserted && body_level == Some(level - 1) && section_start {
                    write_contents(&mut writer, contents)?;
                    inserted = true;
                }
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) => {
                if !inserted && body_level.is_none() && depth == 1 && empty_body {
                    // `<w:body/>`
                    let end = e.to_end().into_owned();
                    writer.write_event(Event::Start(e))?;
                    write_contents(&mut writer, contents)?;
                    writer.write_event(Event::End(end))?;
                    inserted = true;
                    continue;
                }
                if !inserted && depth > 0 && body_level == Some(depth - 1) && section_start {
                    write_contents(&mut writer, contents)?;
                    inserted = true;
                }
                writer.write_event(Event::Empty(e))?;
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if body_level == Some(depth) && body_end {
                    if !inserted {
                        write_contents(&mut writer, contents)?;
                        inserted = true;
                    }
                    body_level = None;
                }
                writer.write_event(Event::End(e))?;
            }
            other => writer.write_event(other)?,
        }
    }

    if !inserted {
        return Err(BulkDocxError::InvalidDocument(
            "main document has no w:body element".into(),
        ));
    }
    Ok(writer.into_inner())
}

fn write_contents(writer: &mut Writer<Vec<u8>>, contents: &[Cow<'_, BodyContent>]) -> Result<()> {
    for content in contents {
        for event in &content.events {
            writer.write_event(event.clone())?;
        }
    }
    Ok(())
}

/// Declare on the target root every attachment namespace prefix it lacks.
fn add_missing_namespaces(root: &mut BytesStart<'static>, contents: &[Cow<'_, BodyContent>]) {
    let mut declared: Vec<String> = root
        .attributes()
        .flatten()
        .map(|a| String::from_utf8_lossy(a.key.as_ref()).into_owned())
        .collect();

    for content in contents {
        for (key, value) in &content.namespaces {
            if !declared.contains(key) {
                root.push_attribute((key.as_str(), value.as_str()));
                declared.push(key.clone());
            }
        }
    }
}
