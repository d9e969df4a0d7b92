//! Streaming access to WordprocessingML paragraphs.
//!
//! Paragraphs (`w:p`) are buffered one at a time while the rest of the part
//! streams straight through the writer. A paragraph's text is the
//! concatenation of the `w:t` elements it owns directly; a paragraph nested
//! inside a text box is its own paragraph.
//!
//! Elements are matched by namespace and local name, so a part that binds
//! WordprocessingML to a prefix other than `w` is handled the same way.

use crate::Result;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Writer};
use tracing::warn;

/// WordprocessingML namespaces (transitional and strict).
const WORD_NAMESPACES: [&[u8]; 2] = [
    b"http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    b"http://purl.oclc.org/ooxml/wordprocessingml/main",
];

const PARAGRAPH: &[u8] = b"p";
const TEXT: &[u8] = b"t";

// ── Namespace-aware reading ──────────────────────────────────────────────────

/// Read the next event as an owned value, together with whether its element
/// belongs to the WordprocessingML namespace.
pub(crate) fn next_event(
    reader: &mut NsReader<&[u8]>,
    buf: &mut Vec<u8>,
) -> Result<(bool, Event<'static>)> {
    let (ns, event) = reader.read_resolved_event_into(buf)?;
    let word = matches!(ns, ResolveResult::Bound(Namespace(uri))
        if WORD_NAMESPACES.iter().any(|w| *w == uri));
    let event = event.into_owned();
    buf.clear();
    Ok((word, event))
}

/// `true` when `event` opens (`start`) or closes the WordprocessingML
/// element `local`.
pub(crate) fn is_word_tag(word: bool, event: &Event<'_>, local: &[u8], start: bool) -> bool {
    word && match event {
        Event::Start(e) if start => e.local_name().as_ref() == local,
        Event::End(e) if !start => e.local_name().as_ref() == local,
        _ => false,
    }
}

/// `true` when `event` is the self-closing WordprocessingML element `local`.
pub(crate) fn is_word_empty(word: bool, event: &Event<'_>, local: &[u8]) -> bool {
    word && matches!(event, Event::Empty(e) if e.local_name().as_ref() == local)
}

// ── Paragraph buffering ──────────────────────────────────────────────────────

/// One `w:t` element inside a buffered paragraph: the index of its start
/// event and the indices of its text events.
struct TextSlot {
    start: usize,
    texts: Vec<usize>,
}

#[derive(Default)]
struct ParagraphFrame {
    events: Vec<Event<'static>>,
    slots: Vec<TextSlot>,
    open_slot: Option<usize>,
}

impl ParagraphFrame {
    fn push(&mut self, event: Event<'static>) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    fn run_texts(&self) -> Result<Vec<String>> {
        self.slots
            .iter()
            .map(|slot| {
                let mut text = String::new();
                for &idx in &slot.texts {
                    if let Event::Text(t) = &self.events[idx] {
                        text.push_str(&t.unescape().map_err(quick_xml::Error::from)?);
                    }
                }
                Ok(text)
            })
            .collect()
    }

    /// Overwrite every `w:t` with the matching entry of `runs`.
    fn write_back(&mut self, runs: &[String]) {
        for (slot, text) in self.slots.iter().zip(runs) {
            if let Event::Start(start) = &self.events[slot.start] {
                self.events[slot.start] = Event::Start(preserve_space(start));
            }
            for (n, &idx) in slot.texts.iter().enumerate() {
                let content = if n == 0 { text.as_str() } else { "" };
                self.events[idx] = Event::Text(BytesText::new(content).into_owned());
            }
        }
    }
}

/// Copy of a `w:t` start tag carrying `xml:space="preserve"`, so leading
/// and trailing spaces of substituted text survive.
fn preserve_space(start: &BytesStart<'_>) -> BytesStart<'static> {
    let mut out = start.to_owned();
    out.clear_attributes();
    for attr in start.attributes().flatten() {
        if attr.key.as_ref() != b"xml:space" {
            out.push_attribute(attr);
        }
    }
    out.push_attribute(("xml:space", "preserve"));
    out.into_owned()
}

/// Stream `xml`, handing the run texts of every paragraph to `edit`.
///
/// `edit` returns `true` when it changed the runs; those paragraphs are
/// written back. Returns the rewritten part and the number of paragraphs
/// that changed.
pub(crate) fn rewrite_paragraphs<F>(xml: &[u8], mut edit: F) -> Result<(Vec<u8>, usize)>
where
    F: FnMut(&mut [String]) -> bool,
{
    let mut reader = NsReader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut stack: Vec<ParagraphFrame> = Vec::new();
    let mut changed = 0;
    let mut buf = Vec::new();
    let mut root_seen = false;

    loop {
        let (word, event) = next_event(&mut reader, &mut buf)?;

        if matches!(event, Event::Eof) {
            break;
        }

        if !root_seen && matches!(event, Event::Start(_) | Event::Empty(_)) {
            root_seen = true;
            if !word {
                warn!("part root is not in the WordprocessingML namespace; no paragraphs found");
            }
        }

        if is_word_tag(word, &event, PARAGRAPH, true) {
            let mut frame = ParagraphFrame::default();
            frame.push(event);
            stack.push(frame);
            continue;
        }

        if is_word_tag(word, &event, PARAGRAPH, false) {
            if let Some(mut frame) = stack.pop() {
                frame.push(event);

                let mut runs = frame.run_texts()?;
                if edit(&mut runs) {
                    frame.write_back(&runs);
                    changed += 1;
                }

                match stack.last_mut() {
                    Some(parent) => parent.events.extend(frame.events),
                    None => {
                        for ev in frame.events {
                            writer.write_event(ev)?;
                        }
                    }
                }
                continue;
            }
        }

        match stack.last_mut() {
            Some(frame) => track_text(frame, word, event),
            None => writer.write_event(event)?,
        }
    }

    Ok((writer.into_inner(), changed))
}

/// Buffer `event` in the innermost paragraph, recording `w:t` slots.
fn track_text(frame: &mut ParagraphFrame, word: bool, event: Event<'static>) {
    if is_word_tag(word, &event, TEXT, true) {
        let idx = frame.push(event);
        frame.slots.push(TextSlot {
            start: idx,
            texts: Vec::new(),
        });
        frame.open_slot = Some(frame.slots.len() - 1);
    } else if is_word_tag(word, &event, TEXT, false) {
        if let Some(slot) = frame.open_slot.take() {
            if frame.slots[slot].texts.is_empty() {
                // `<w:t></w:t>` still needs a text event to write into
                let idx = frame.push(Event::Text(BytesText::new("")));
                frame.slots[slot].texts.push(idx);
            }
        }
        frame.push(event);
    } else if let (Event::Text(_), Some(slot)) = (&event, frame.open_slot) {
        let idx = frame.push(event);
        frame.slots[slot].texts.push(idx);
    } else {
        frame.push(event);
    }
}

/// The visible text of every paragraph in `xml`, in document order.
///
/// A nested paragraph is listed before the paragraph that contains it,
/// because it closes first.
pub fn paragraph_texts(xml: &[u8]) -> Result<Vec<String>> {
    let mut texts = Vec::new();
    rewrite_paragraphs(xml, |runs| {
        texts.push(runs.concat());
        false
    })?;
    Ok(texts)
}
