use crate::{paragraphs, BulkDocxError, Result};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Part name of the main document body inside a `.docx` package.
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

/// Largest expansion over the container size used to presize an entry buffer.
const MAX_EXPANSION: u64 = 64;

/// Read one ZIP entry fully, checking it against the size its header
/// declares.
///
/// The declared size only bounds the initial buffer, so a forged header
/// cannot force a huge allocation.
pub(crate) fn read_entry<R: Read>(
    entry: &mut R,
    name: &str,
    declared: u64,
    container_len: usize,
) -> Result<Vec<u8>> {
    let hint = declared.min(container_len as u64 * MAX_EXPANSION);
    let mut bytes = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
    entry.read_to_end(&mut bytes)?;
    if bytes.len() as u64 != declared {
        return Err(BulkDocxError::InvalidDocument(format!(
            "entry {name} declares {declared} bytes but holds {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

// ── DocxPart ─────────────────────────────────────────────────────────────────

/// One entry of an OOXML package: its ZIP entry name and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocxPart {
    pub name: String,
    pub data: Vec<u8>,
}

// ── DocxPackage ──────────────────────────────────────────────────────────────

/// A Word document held in memory as the ordered list of its package parts.
///
/// Cloning a package is a deep copy: every part's bytes are duplicated, so
/// edits to the clone never reach the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocxPackage {
    parts: Vec<DocxPart>,
}

impl DocxPackage {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Open a `.docx` from an in-memory byte slice.
    ///
    /// Fails when the bytes are not a ZIP container or the container has no
    /// `word/document.xml` part.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let declared = entry.size();
            let bytes = read_entry(&mut entry, &name, declared, data.len())?;
            parts.push(DocxPart { name, data: bytes });
        }

        let package = Self { parts };
        if package.part(MAIN_DOCUMENT_PART).is_none() {
            return Err(BulkDocxError::InvalidDocument(format!(
                "package has no {MAIN_DOCUMENT_PART} part"
            )));
        }
        Ok(package)
    }

    /// Open a `.docx` from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    // ── Serialisation ─────────────────────────────────────────────────────────

    /// Serialise the package back into `.docx` bytes, parts in their
    /// original order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.data)?;
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Write the serialised package to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    // ── Part access ───────────────────────────────────────────────────────────

    /// All parts in package order.
    pub fn parts(&self) -> &[DocxPart] {
        &self.parts
    }

    /// The bytes of the part named `name`, if present.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    /// Replace the bytes of an existing part, or append a new part.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(DocxPart {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// The main document body XML.
    pub fn main_document(&self) -> Result<&[u8]> {
        self.part(MAIN_DOCUMENT_PART).ok_or_else(|| {
            BulkDocxError::InvalidDocument(format!("package has no {MAIN_DOCUMENT_PART} part"))
        })
    }

    /// Names of every header part (`word/header1.xml`, `word/header2.xml`, …).
    ///
    /// A document has one header part per header variant per section, so
    /// this covers the headers of all sections.
    pub fn header_part_names(&self) -> Vec<String> {
        self.story_part_names("header")
    }

    /// Names of every footer part.
    pub fn footer_part_names(&self) -> Vec<String> {
        self.story_part_names("footer")
    }

    fn story_part_names(&self, kind: &str) -> Vec<String> {
        let prefix = format!("word/{kind}");
        self.parts
            .iter()
            .filter(|p| {
                p.name
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix(".xml"))
                    .map(|n| n.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
            .map(|p| p.name.clone())
            .collect()
    }

    // ── Text ──────────────────────────────────────────────────────────────────

    /// The visible text of every paragraph in the main body, in document
    /// order (table cells included).
    pub fn body_paragraphs(&self) -> Result<Vec<String>> {
        paragraphs::paragraph_texts(self.main_document()?)
    }

    /// The visible text of every header paragraph, header parts in package
    /// order.
    pub fn header_paragraphs(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for name in self.header_part_names() {
            if let Some(xml) = self.part(&name) {
                out.extend(paragraphs::paragraph_texts(xml)?);
            }
        }
        Ok(out)
    }
}
