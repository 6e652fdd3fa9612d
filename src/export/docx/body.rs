//! Block model of `word/document.xml`.
//!
//! The body is split once into its top-level blocks (paragraphs, tables, the
//! final section descriptor) and serialized once after surgery. Paragraph
//! text is read through a "virtual text" view: the concatenated contents of
//! every `w:t` element, with a byte map back into the markup, so tokens split
//! across formatting runs can be found and rewritten.

use std::ops::Range;

use lazy_static::lazy_static;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::PackageError;

lazy_static! {
    static ref TEXT_RE: Regex =
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("valid text regex");
}

const PARAGRAPH_CLOSE: &str = "</w:p>";

/// A top-level child of `w:body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    Table(String),
    SectionProperties(String),
    Other(String),
}

impl Block {
    fn classify(name: &[u8], xml: String) -> Self {
        match name {
            b"w:p" => Self::Paragraph(xml),
            b"w:tbl" => Self::Table(xml),
            b"w:sectPr" => Self::SectionProperties(xml),
            _ => Self::Other(xml),
        }
    }

    pub fn xml(&self) -> &str {
        match self {
            Self::Paragraph(xml)
            | Self::Table(xml)
            | Self::SectionProperties(xml)
            | Self::Other(xml) => xml,
        }
    }

    pub fn xml_mut(&mut self) -> &mut String {
        match self {
            Self::Paragraph(xml)
            | Self::Table(xml)
            | Self::SectionProperties(xml)
            | Self::Other(xml) => xml,
        }
    }

    pub fn is_paragraph(&self) -> bool {
        matches!(self, Self::Paragraph(_))
    }

    /// Virtual text of everything inside the block.
    pub fn text(&self) -> String {
        VirtualText::scan(self.xml()).text
    }

    /// A paragraph whose properties close a section.
    pub fn has_section_break(&self) -> bool {
        self.is_paragraph() && self.xml().contains("<w:sectPr")
    }

    /// A paragraph with no text content.
    pub fn is_blank_paragraph(&self) -> bool {
        self.is_paragraph() && self.text().trim().is_empty() && !self.xml().contains("<w:drawing")
    }
}

/// Parsed `word/document.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentBody {
    head: String,
    blocks: Vec<Block>,
    tail: String,
}

impl DocumentBody {
    pub fn parse(xml: &str) -> Result<Self, PackageError> {
        let open = xml
            .find("<w:body")
            .ok_or_else(|| PackageError::MalformedBody("missing <w:body>".into()))?;
        let open_end = xml[open..]
            .find('>')
            .map(|i| open + i + 1)
            .ok_or_else(|| PackageError::MalformedBody("unterminated <w:body>".into()))?;
        let close = xml
            .rfind("</w:body>")
            .filter(|close| *close >= open_end)
            .ok_or_else(|| PackageError::MalformedBody("missing </w:body>".into()))?;

        let inner = &xml[open_end..close];
        let mut reader = Reader::from_str(inner);
        let mut blocks = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        let mut name = Vec::new();

        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(e) => {
                    if depth == 0 {
                        start = before;
                        name = e.name().as_ref().to_vec();
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        PackageError::MalformedBody("unbalanced end tag".into())
                    })?;
                    if depth == 0 {
                        let end = reader.buffer_position() as usize;
                        blocks.push(Block::classify(&name, inner[start..end].to_string()));
                    }
                }
                Event::Empty(e) if depth == 0 => {
                    let end = reader.buffer_position() as usize;
                    blocks.push(Block::classify(e.name().as_ref(), inner[before..end].to_string()));
                }
                Event::Eof => break,
                _ if depth == 0 => {
                    let end = reader.buffer_position() as usize;
                    let raw = &inner[before..end];
                    if !raw.trim().is_empty() {
                        blocks.push(Block::Other(raw.to_string()));
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(PackageError::MalformedBody("unclosed element".into()));
        }

        Ok(Self {
            head: xml[..open_end].to_string(),
            blocks,
            tail: xml[close..].to_string(),
        })
    }

    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(
            self.head.len() + self.tail.len() + self.blocks.iter().map(|b| b.xml().len()).sum::<usize>(),
        );
        out.push_str(&self.head);
        for block in &self.blocks {
            out.push_str(block.xml());
        }
        out.push_str(&self.tail);
        out
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    /// Index of the first top-level block at or after `from` matching `pred`.
    pub fn position_from(&self, from: usize, pred: impl Fn(&Block) -> bool) -> Option<usize> {
        self.blocks
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, b)| pred(b))
            .map(|(i, _)| i)
    }

    /// The body-level section descriptor closing the document.
    pub fn final_section(&self) -> Option<&str> {
        self.blocks.iter().rev().find_map(|block| match block {
            Block::SectionProperties(xml) => Some(xml.as_str()),
            _ => None,
        })
    }

    /// Apply `f` to every leaf paragraph, including those nested in tables.
    pub fn map_paragraphs(&mut self, mut f: impl FnMut(&str) -> Option<String>) {
        for block in &mut self.blocks {
            if matches!(block, Block::SectionProperties(_)) {
                continue;
            }
            let mapped = map_leaf_paragraphs(block.xml(), &mut f);
            *block.xml_mut() = mapped;
        }
    }
}

/// Byte ranges of paragraphs that contain no other paragraph.
///
/// Each closing tag is paired with the nearest opening tag before it; an
/// outer paragraph whose inner paragraph was already paired is skipped.
pub fn leaf_paragraphs(xml: &str) -> Vec<Range<usize>> {
    let mut events: Vec<(usize, bool)> = Vec::new();
    for (pos, _) in xml.match_indices("<w:p") {
        let next = xml[pos + 4..].chars().next();
        if !matches!(next, Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r')) {
            continue;
        }
        let self_closing = xml[pos..]
            .find('>')
            .map(|end| xml[..pos + end].ends_with('/'))
            .unwrap_or(true);
        if !self_closing {
            events.push((pos, true));
        }
    }
    for (pos, _) in xml.match_indices(PARAGRAPH_CLOSE) {
        events.push((pos, false));
    }
    events.sort_by_key(|(pos, _)| *pos);

    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    for (pos, is_open) in events {
        if is_open {
            open = Some(pos);
        } else if let Some(start) = open.take() {
            spans.push(start..pos + PARAGRAPH_CLOSE.len());
        }
    }
    spans
}

/// Rewrite leaf paragraphs; `f` returns the replacement or `None` to keep.
pub fn map_leaf_paragraphs(xml: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for span in leaf_paragraphs(xml) {
        out.push_str(&xml[cursor..span.start]);
        let paragraph = &xml[span.clone()];
        match f(paragraph) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(paragraph),
        }
        cursor = span.end;
    }
    out.push_str(&xml[cursor..]);
    out
}

#[derive(Debug, Clone)]
struct Segment {
    tag: Range<usize>,
    content: Range<usize>,
    offset: usize,
}

/// Concatenated `w:t` contents of a fragment with a map back to the markup.
#[derive(Debug, Clone, Default)]
pub struct VirtualText {
    pub text: String,
    segments: Vec<Segment>,
}

impl VirtualText {
    pub fn scan(xml: &str) -> Self {
        let mut text = String::new();
        let mut segments = Vec::new();
        for caps in TEXT_RE.captures_iter(xml) {
            let (Some(whole), Some(content)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            segments.push(Segment {
                tag: whole.start()..content.start(),
                content: content.range(),
                offset: text.len(),
            });
            text.push_str(content.as_str());
        }
        Self { text, segments }
    }

    fn segment_at(&self, position: usize) -> Option<usize> {
        self.segments
            .iter()
            .rposition(|s| s.offset <= position && position < s.offset + s.content.len())
    }

    /// Number of `w:t` elements the virtual range touches.
    pub fn segments_spanned(&self, range: Range<usize>) -> usize {
        match (self.segment_at(range.start), self.segment_at(range.end.saturating_sub(1))) {
            (Some(first), Some(last)) => last - first + 1,
            _ => 0,
        }
    }

    /// Replace the virtual range with `replacement`, written into the first
    /// touched `w:t`; the rest of the range is removed from later elements.
    pub fn splice(&self, xml: &str, range: Range<usize>, replacement: &str) -> Option<String> {
        if range.start >= range.end {
            return None;
        }
        let first = self.segment_at(range.start)?;
        let last = self.segment_at(range.end - 1)?;

        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        for index in first..=last {
            let segment = &self.segments[index];
            let content = &xml[segment.content.clone()];
            let local_start = range.start.saturating_sub(segment.offset).min(content.len());
            let local_end = (range.end - segment.offset).min(content.len());

            let new_content = if index == first {
                let tail = if index == last { &content[local_end..] } else { "" };
                format!("{}{}{}", &content[..local_start], replacement, tail)
            } else if index == last {
                content[local_end..].to_string()
            } else {
                String::new()
            };

            edits.push((segment.content.clone(), new_content));
            if index == first {
                edits.push((segment.tag.clone(), "<w:t xml:space=\"preserve\">".to_string()));
            }
        }

        edits.sort_by_key(|(r, _)| r.start);
        let mut out = String::with_capacity(xml.len() + replacement.len());
        let mut cursor = 0;
        for (r, text) in edits {
            out.push_str(&xml[cursor..r.start]);
            out.push_str(&text);
            cursor = r.end;
        }
        out.push_str(&xml[cursor..]);
        Some(out)
    }
}

/// Rewrite `w:t` elements. `f` receives the opening tag and the escaped
/// content and returns a replacement for the whole element.
pub fn map_text_elements(xml: &str, mut f: impl FnMut(&str, &str) -> Option<String>) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for caps in TEXT_RE.captures_iter(xml) {
        let (Some(whole), Some(content)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let tag = &xml[whole.start()..content.start()];
        if let Some(replacement) = f(tag, content.as_str()) {
            out.push_str(&xml[cursor..whole.start()]);
            out.push_str(&replacement);
            cursor = whole.end();
        }
    }
    out.push_str(&xml[cursor..]);
    out
}
