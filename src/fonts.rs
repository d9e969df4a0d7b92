//! Uniform run font for a main document part.
//!
//! Every run (`w:r`) gets `w:rFonts` with the `ascii`, `hAnsi` and
//! `eastAsia` faces set and a `w:sz` in half-points. Other run properties
//! are kept and the schema order of `w:rPr` children is respected.

use crate::paragraphs::{is_word_empty, is_word_tag, next_event};
use crate::Result;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{NsReader, Writer};

const RUN: &[u8] = b"r";
const RUN_PROPERTIES: &[u8] = b"rPr";
const RUN_STYLE: &[u8] = b"rStyle";
const FONTS: &[u8] = b"rFonts";
const SIZE: &[u8] = b"sz";

/// `w:rFonts` attributes replaced by the new face. The theme attributes
/// would otherwise take precedence over the explicit ones.
const REPLACED_FONT_ATTRIBUTES: [&[u8]; 6] = [
    b"ascii",
    b"hAnsi",
    b"eastAsia",
    b"asciiTheme",
    b"hAnsiTheme",
    b"eastAsiaTheme",
];

/// `w:rPr` children that follow `w:sz` in the schema sequence.
const AFTER_SIZE: [&[u8]; 16] = [
    b"szCs",
    b"highlight",
    b"u",
    b"effect",
    b"bdr",
    b"shd",
    b"fitText",
    b"vertAlign",
    b"rtl",
    b"cs",
    b"em",
    b"lang",
    b"eastAsianLayout",
    b"specVanish",
    b"oMath",
    b"rPrChange",
];

/// Set `font` at `points` size on every run of `xml`.
pub(crate) fn set_run_font(xml: &[u8], font: &str, points: u32) -> Result<Vec<u8>> {
    let face = RunFace {
        font,
        half_points: (points * 2).to_string(),
    };
    let mut reader = NsReader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    // (children depth, element prefix) of a run whose first child is pending
    let mut pending_run: Option<(usize, String)> = None;
    let mut props: Option<PropertiesBuffer> = None;

    loop {
        let (word, event) = next_event(&mut reader, &mut buf)?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(buffer) = props.as_mut() {
            match &event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                _ => {}
            }
            if depth == buffer.level && is_word_tag(word, &event, RUN_PROPERTIES, false) {
                if let Some(buffer) = props.take() {
                    buffer.write(&mut writer, &face, event)?;
                }
            } else {
                buffer.events.push((word, event));
            }
            continue;
        }

        if let Some((level, prefix)) = pending_run.take() {
            if matches!(&event, Event::Text(t) if t.iter().all(u8::is_ascii_whitespace)) {
                pending_run = Some((level, prefix));
                writer.write_event(event)?;
                continue;
            }
            match &event {
                Event::Start(e) if depth == level && is_word_tag(word, &event, RUN_PROPERTIES, true) => {
                    props = Some(PropertiesBuffer {
                        level,
                        start: e.to_owned(),
                        prefix,
                        events: Vec::new(),
                    });
                    depth += 1;
                    continue;
                }
                Event::Empty(e) if depth == level && is_word_empty(word, &event, RUN_PROPERTIES) => {
                    let buffer = PropertiesBuffer {
                        level,
                        start: e.to_owned(),
                        prefix,
                        events: Vec::new(),
                    };
                    let end = e.to_end().into_owned();
                    buffer.write(&mut writer, &face, Event::End(end))?;
                    continue;
                }
                _ => write_new_properties(&mut writer, &prefix, &face)?,
            }
        }

        match &event {
            Event::Start(e) => {
                if is_word_tag(word, &event, RUN, true) {
                    pending_run = Some((depth + 1, prefix_of(e)));
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
        writer.write_event(event)?;
    }

    Ok(writer.into_inner())
}

struct RunFace<'a> {
    font: &'a str,
    half_points: String,
}

impl RunFace<'_> {
    fn fonts(&self, prefix: &str, existing: Option<&BytesStart<'_>>) -> BytesStart<'static> {
        let mut el = BytesStart::new(qualified(prefix, "rFonts"));
        if let Some(existing) = existing {
            for attr in existing.attributes().flatten() {
                let local = attr.key.local_name();
                if !REPLACED_FONT_ATTRIBUTES.iter().any(|r| *r == local.as_ref()) {
                    el.push_attribute(attr);
                }
            }
        }
        for name in ["ascii", "hAnsi", "eastAsia"] {
            el.push_attribute((qualified(prefix, name).as_str(), self.font));
        }
        el
    }

    fn size(&self, prefix: &str) -> BytesStart<'static> {
        let mut el = BytesStart::new(qualified(prefix, "sz"));
        el.push_attribute((qualified(prefix, "val").as_str(), self.half_points.as_str()));
        el
    }
}

/// A buffered `w:rPr` element of one run.
struct PropertiesBuffer {
    level: usize,
    start: BytesStart<'static>,
    prefix: String,
    events: Vec<(bool, Event<'static>)>,
}

/// One direct child of `w:rPr`.
struct Child {
    /// Local name of a WordprocessingML element; `None` for anything else.
    name: Option<Vec<u8>>,
    element: bool,
    events: Vec<Event<'static>>,
}

impl Child {
    fn is(&self, local: &[u8]) -> bool {
        self.name.as_deref() == Some(local)
    }
}

impl PropertiesBuffer {
    fn children(self) -> (BytesStart<'static>, String, Vec<Child>) {
        let mut children: Vec<Child> = Vec::new();
        let mut depth = 0usize;
        for (word, event) in self.events {
            if depth == 0 {
                let (name, element) = match &event {
                    Event::Start(e) | Event::Empty(e) => {
                        (word.then(|| e.local_name().as_ref().to_vec()), true)
                    }
                    _ => (None, false),
                };
                children.push(Child {
                    name,
                    element,
                    events: Vec::new(),
                });
            }
            match &event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth = depth.saturating_sub(1),
                _ => {}
            }
            if let Some(child) = children.last_mut() {
                child.events.push(event);
            }
        }
        (self.start, self.prefix, children)
    }

    fn write(self, writer: &mut Writer<Vec<u8>>, face: &RunFace<'_>, end: Event<'static>) -> Result<()> {
        let (start, prefix, mut children) = self.children();

        let existing_fonts = children
            .iter()
            .find(|c| c.is(FONTS))
            .and_then(|c| match c.events.first() {
                Some(Event::Start(e)) | Some(Event::Empty(e)) => Some(face.fonts(&prefix, Some(e))),
                _ => None,
            });
        let fonts = existing_fonts.unwrap_or_else(|| face.fonts(&prefix, None));
        children.retain(|c| !c.is(FONTS) && !c.is(SIZE));

        let fonts_at = children
            .iter()
            .position(|c| c.is(RUN_STYLE))
            .map_or(0, |i| i + 1);
        children.insert(fonts_at, generated(fonts));

        let size_at = children
            .iter()
            .position(|c| {
                c.element
                    && match &c.name {
                        Some(name) => AFTER_SIZE.iter().any(|a| *a == name.as_slice()),
                        None => true,
                    }
            })
            .unwrap_or(children.len());
        children.insert(size_at, generated(face.size(&prefix)));

        writer.write_event(Event::Start(start))?;
        for child in children {
            for event in child.events {
                writer.write_event(event)?;
            }
        }
        writer.write_event(end)?;
        Ok(())
    }
}

fn generated(el: BytesStart<'static>) -> Child {
    Child {
        name: None,
        element: false,
        events: vec![Event::Empty(el)],
    }
}

/// `w:rPr` for a run that had none.
fn write_new_properties(writer: &mut Writer<Vec<u8>>, prefix: &str, face: &RunFace<'_>) -> Result<()> {
    let name = qualified(prefix, "rPr");
    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
    writer.write_event(Event::Empty(face.fonts(prefix, None)))?;
    writer.write_event(Event::Empty(face.size(prefix)))?;
    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    Ok(())
}

fn prefix_of(e: &BytesStart<'_>) -> String {
    e.name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
        .unwrap_or_else(|| "w".to_string())
}

fn qualified(prefix: &str, local: &str) -> String {
    format!("{prefix}:{local}")
}
