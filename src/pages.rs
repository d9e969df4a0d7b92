//! PDF pages embedded as inline pictures.
//!
//! Rendering a page is left to a [`PageRasterizer`]; this module counts the
//! pages with `lopdf`, stores each rendered PNG as a media part of the target
//! package and builds the body paragraphs that display them.

use crate::{BulkDocxError, DocxPackage, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

const DOCUMENT_RELATIONSHIPS: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const IMAGE_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const EMPTY_RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#
);

/// Namespaces used by the generated picture paragraphs.
const PICTURE_NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#
);

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Width of every embedded page: 6 inches in EMU.
pub const PAGE_WIDTH_EMU: u64 = 6 * 914_400;

// ── Rasterizer seam ──────────────────────────────────────────────────────────

/// Renders single PDF pages to PNG images, typically through an external
/// PDF renderer.
pub trait PageRasterizer {
    /// Render page `index` (0-based) of `pdf`.
    fn render_page(&self, pdf: &[u8], index: usize) -> Result<Vec<u8>>;
}

/// One rendered page: PNG bytes and their pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PageImage {
    /// Wrap PNG bytes, reading the dimensions from the `IHDR` chunk.
    pub fn from_png(png: Vec<u8>) -> Result<Self> {
        // signature, IHDR length, "IHDR", width, height
        if png.len() < 24 || !png.starts_with(PNG_SIGNATURE) || &png[12..16] != b"IHDR" {
            return Err(BulkDocxError::InvalidDocument(
                "rendered page is not a PNG image".into(),
            ));
        }
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        if width == 0 || height == 0 {
            return Err(BulkDocxError::InvalidDocument(
                "rendered page has no pixels".into(),
            ));
        }
        Ok(Self { png, width, height })
    }

    /// Height in EMU when scaled to [`PAGE_WIDTH_EMU`].
    fn height_emu(&self) -> u64 {
        PAGE_WIDTH_EMU * u64::from(self.height) / u64::from(self.width)
    }
}

/// Render every page of `pdf`, in page order.
pub fn rasterize_pdf(pdf: &[u8], rasterizer: &dyn PageRasterizer) -> Result<Vec<PageImage>> {
    let count = lopdf::Document::load_mem(pdf)?.get_pages().len();
    if count == 0 {
        return Err(BulkDocxError::InvalidDocument("PDF has no pages".into()));
    }
    let pages = (0..count)
        .map(|index| PageImage::from_png(rasterizer.render_page(pdf, index)?))
        .collect::<Result<Vec<_>>>()?;
    debug!(pages = count, "PDF rasterized");
    Ok(pages)
}

// ── Embedding ────────────────────────────────────────────────────────────────

/// Store `pages` in `package` and return a standalone document whose body
/// holds one picture paragraph per page, with a page break between pages.
///
/// `next_id` is the next free drawing id of the target document and is
/// advanced past the ids used here.
pub(crate) fn embed_pages(
    package: &mut DocxPackage,
    pages: &[PageImage],
    next_id: &mut u32,
) -> Result<String> {
    let content_types = package.part(CONTENT_TYPES).ok_or_else(|| {
        BulkDocxError::InvalidDocument(format!("package has no {CONTENT_TYPES} part"))
    })?;
    let content_types = with_png_default(content_types)?;
    package.set_part(CONTENT_TYPES, content_types);

    let relationships = package
        .part(DOCUMENT_RELATIONSHIPS)
        .unwrap_or(EMPTY_RELATIONSHIPS.as_bytes())
        .to_vec();
    let mut taken = relationship_ids(&relationships)?;
    let mut added = Vec::with_capacity(pages.len());
    let mut body = String::new();

    for (n, page) in pages.iter().enumerate() {
        let media = free_media_name(package);
        let rel_id = free_relationship_id(&taken);
        taken.push(rel_id.clone());

        let target = media.trim_start_matches("word/").to_string();
        package.set_part(&media, page.png.clone());
        added.push((rel_id.clone(), target));

        let id = *next_id;
        *next_id += 1;
        let file_name = media.rsplit('/').next().unwrap_or(media.as_str());
        body.push_str(&picture_paragraph(id, &rel_id, file_name, page));
        if n + 1 < pages.len() {
            body.push_str(PAGE_BREAK);
        }
    }

    package.set_part(
        DOCUMENT_RELATIONSHIPS,
        with_relationships(&relationships, &added)?,
    );

    Ok(format!(
        r#"<w:document {PICTURE_NAMESPACES}><w:body>{body}</w:body></w:document>"#
    ))
}

/// Largest `wp:docPr` id in a main document part.
pub(crate) fn max_drawing_id(xml: &[u8]) -> Result<u32> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut max = 0;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"docPr" => {
                if let Some(id) = attribute(&e, b"id").and_then(|v| v.parse::<u32>().ok()) {
                    max = max.max(id);
                }
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(max)
}

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

fn picture_paragraph(id: u32, rel_id: &str, file_name: &str, page: &PageImage) -> String {
    format!(
        concat!(
            r#"<w:p><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Picture {id}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
            r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
        ),
        cx = PAGE_WIDTH_EMU,
        cy = page.height_emu(),
        id = id,
        name = file_name,
        rel = rel_id,
    )
}

fn free_media_name(package: &DocxPackage) -> String {
    (1..)
        .map(|n| format!("word/media/image{n}.png"))
        .find(|name| package.part(name).is_none())
        .unwrap_or_default()
}

fn free_relationship_id(taken: &[String]) -> String {
    (1..)
        .map(|n| format!("rId{n}"))
        .find(|id| !taken.contains(id))
        .unwrap_or_default()
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn relationship_ids(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut ids = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                ids.extend(attribute(&e, b"Id"));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(ids)
}

/// The relationships part with an image relationship appended per
/// `(id, target)`.
fn with_relationships(xml: &[u8], added: &[(String, String)]) -> Result<Vec<u8>> {
    let write_added = |writer: &mut Writer<Vec<u8>>| -> Result<()> {
        for (id, target) in added {
            let mut rel = BytesStart::new("Relationship");
            rel.push_attribute(("Id", id.as_str()));
            rel.push_attribute(("Type", IMAGE_RELATIONSHIP));
            rel.push_attribute(("Target", target.as_str()));
            writer.write_event(Event::Empty(rel))?;
        }
        Ok(())
    };

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + added.len() * 160));
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match event {
            Event::Eof => break,
            Event::Empty(e) if e.local_name().as_ref() == b"Relationships" => {
                let end = e.to_end().into_owned();
                writer.write_event(Event::Start(e))?;
                write_added(&mut writer)?;
                writer.write_event(Event::End(end))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"Relationships" => {
                write_added(&mut writer)?;
                writer.write_event(Event::End(e))?;
            }
            other => writer.write_event(other)?,
        }
    }
    Ok(writer.into_inner())
}

/// The content types part with a `png` default, added when missing.
fn with_png_default(xml: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Default" => {
                if attribute(&e, b"Extension").is_some_and(|x| x.eq_ignore_ascii_case("png")) {
                    return Ok(xml.to_vec());
                }
            }
            _ => {}
        }
        buf.clear();
    }
    buf.clear();

    let mut png = BytesStart::new("Default");
    png.push_attribute(("Extension", "png"));
    png.push_attribute(("ContentType", "image/png"));

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 64));
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match event {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"Types" => {
                writer.write_event(Event::Start(e))?;
                writer.write_event(Event::Empty(png.borrow()))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"Types" => {
                let end = e.to_end().into_owned();
                writer.write_event(Event::Start(e))?;
                writer.write_event(Event::Empty(png.borrow()))?;
                writer.write_event(Event::End(end))?;
            }
            other => writer.write_event(other)?,
        }
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        out.extend_from_slice(&13u32.to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out
    }

    #[test]
    fn reads_png_dimensions() {
        let page = PageImage::from_png(png(850, 1100)).unwrap();
        assert_eq!((page.width, page.height), (850, 1100));
        assert_eq!(page.height_emu(), PAGE_WIDTH_EMU * 1100 / 850);
    }

    #[test]
    fn rejects_non_png_bytes() {
        assert!(PageImage::from_png(b"GIF89a".to_vec()).is_err());
        assert!(PageImage::from_png(png(0, 10)).is_err());
    }

    #[test]
    fn png_default_is_added_once() {
        let types = br#"<Types xmlns="urn:ct"><Default Extension="xml" ContentType="application/xml"/></Types>"#;
        let out = with_png_default(types).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(
            text.starts_with(r#"<Types xmlns="urn:ct"><Default Extension="png" ContentType="image/png"/>"#),
            "{text}"
        );
        assert_eq!(with_png_default(&out).unwrap(), out);
    }

    #[test]
    fn relationships_are_appended_to_empty_part() {
        let out = with_relationships(
            EMPTY_RELATIONSHIPS.as_bytes(),
            &[("rId1".into(), "media/image1.png".into())],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(
            text.ends_with(&format!(
                r#"><Relationship Id="rId1" Type="{IMAGE_RELATIONSHIP}" Target="media/image1.png"/></Relationships>"#
            )),
            "{text}"
        );
    }

    #[test]
    fn drawing_ids_are_read_from_any_prefix() {
        let xml = br#"<w:document><wp:docPr id="7" name="a"/><x:docPr id="3"/></w:document>"#;
        assert_eq!(max_drawing_id(xml).unwrap(), 7);
    }
}
