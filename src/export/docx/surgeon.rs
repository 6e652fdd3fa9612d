//! Template surgery run before merging.
//!
//! Every step is idempotent and best-effort: a step whose target is absent,
//! or already in its final form, leaves the markup untouched. Steps never
//! rely on an earlier step having matched.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use super::body::{map_leaf_paragraphs, map_text_elements, Block, DocumentBody, VirtualText};
use super::wordml::section_break_paragraph;
use super::{CLOSE_BRACE_SENTINEL, OPEN_BRACE_SENTINEL};

lazy_static! {
    /// Anything the merge step treats as a marker: `{key}`, `{@key}`,
    /// `{#key}`, `{/key}` and `{%key}`.
    pub static ref MARKER_RE: Regex =
        Regex::new(r"\{[#/@%]?[A-Za-z_][A-Za-z0-9_]*\}").expect("valid marker regex");
    static ref PAGE_SIZE_RE: Regex = Regex::new(r"<w:pgSz\b[^>]*/>").expect("valid pgSz regex");
    static ref WIDTH_RE: Regex = Regex::new(r#"\bw:w="(\d+)""#).expect("valid width regex");
    static ref HEIGHT_RE: Regex = Regex::new(r#"\bw:h="(\d+)""#).expect("valid height regex");
}

/// A4 portrait with 3cm/2cm margins, used when the template has no
/// body-level section descriptor.
const DEFAULT_SECTION: &str = "<w:sectPr><w:pgSz w:w=\"11906\" w:h=\"16838\"/>\
<w:pgMar w:top=\"1701\" w:right=\"1134\" w:bottom=\"1134\" w:left=\"1701\" w:header=\"709\" w:footer=\"709\" w:gutter=\"0\"/></w:sectPr>";

/// A context-scoped correction of a template authoring mistake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFix {
    /// Text the paragraph must contain for the fix to apply; empty matches all.
    pub context: String,
    pub find: String,
    pub replace: String,
}

impl TemplateFix {
    pub fn new(context: &str, find: &str, replace: &str) -> Self {
        Self {
            context: context.to_string(),
            find: find.to_string(),
            replace: replace.to_string(),
        }
    }
}

/// A repeating region `{#name}…{/name}` collapsed into `{@marker}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatingRegion {
    pub name: String,
    pub marker: String,
}

/// A tag whose table is laid out on its own landscape pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandscapeTag {
    pub tag: String,
    /// Title paragraph preceding the tag in the template; the builder
    /// emits its own.
    pub title: String,
}

/// Configured set of surgery steps.
#[derive(Debug, Clone, Default)]
pub struct TemplateSurgeon {
    regions: Vec<RepeatingRegion>,
    table_tags: Vec<String>,
    landscape: Option<LandscapeTag>,
    fixes: Vec<TemplateFix>,
}

/// A paragraph holding only the `{@key}` raw marker.
pub fn raw_marker_paragraph(key: &str) -> String {
    format!("<w:p><w:r><w:t>{{@{}}}</w:t></w:r></w:p>", key)
}

impl TemplateSurgeon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, name: &str, marker: &str) -> Self {
        self.regions.push(RepeatingRegion {
            name: name.to_string(),
            marker: marker.to_string(),
        });
        self
    }

    pub fn table_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn landscape(mut self, tag: &str, title: &str) -> Self {
        self.landscape = Some(LandscapeTag {
            tag: tag.to_string(),
            title: title.to_string(),
        });
        self
    }

    pub fn fix(mut self, fix: TemplateFix) -> Self {
        self.fixes.push(fix);
        self
    }

    /// Full surgery for the main document body.
    pub fn prepare_document(&self, body: &mut DocumentBody) {
        self.replace_repeating_regions(body);
        self.replace_table_tags(body);
        self.apply_landscape_section(body);
        body.map_paragraphs(|p| self.fix_paragraph(p));
        body.map_paragraphs(consolidate_paragraph);
        for block in body.blocks_mut() {
            if !matches!(block, Block::SectionProperties(_)) {
                let sanitized = sanitize_braces(block.xml());
                *block.xml_mut() = sanitized;
            }
        }
    }

    /// Surgery for header and footer parts: defect fixes, consolidation and
    /// brace sanitization.
    pub fn prepare_part(&self, xml: &str) -> String {
        let fixed = map_leaf_paragraphs(xml, |p| self.fix_paragraph(p));
        let consolidated = map_leaf_paragraphs(&fixed, consolidate_paragraph);
        sanitize_braces(&consolidated)
    }

    /// Collapse each `{#name}…{/name}` range of blocks into one marker
    /// paragraph. Tokens may be split across runs.
    pub fn replace_repeating_regions(&self, body: &mut DocumentBody) {
        for region in &self.regions {
            let open = format!("{{#{}}}", region.name);
            let close = format!("{{/{}}}", region.name);
            while let Some(start) = body.position_from(0, |b| b.text().contains(&open)) {
                // Without a closing token only the opening block goes.
                let end = (start..body.blocks().len())
                    .find(|&i| {
                        let text = body.blocks()[i].text();
                        if i == start {
                            text.find(&open)
                                .map(|at| text[at..].contains(&close))
                                .unwrap_or(false)
                        } else {
                            text.contains(&close)
                        }
                    })
                    .unwrap_or(start);
                debug!(
                    "collapsing region `{}` over blocks {}..={}",
                    region.name, start, end
                );
                body.blocks_mut().splice(
                    start..=end,
                    [Block::Paragraph(raw_marker_paragraph(&region.marker))],
                );
            }
        }
    }

    /// Replace every paragraph carrying a table tag with a lone `{@tag}`
    /// paragraph, wherever the paragraph sits.
    pub fn replace_table_tags(&self, body: &mut DocumentBody) {
        if self.table_tags.is_empty() {
            return;
        }
        body.map_paragraphs(|paragraph| {
            let text = VirtualText::scan(paragraph).text;
            let tag = self.table_tags.iter().find(|tag| {
                text.contains(&format!("{{{}}}", tag)) || text.contains(&format!("{{@{}}}", tag))
            })?;
            let replacement = raw_marker_paragraph(tag);
            (replacement != paragraph).then_some(replacement)
        });
    }

    /// Put the landscape table in its own section: a portrait break before
    /// it and a landscape descriptor in the first paragraph after it.
    pub fn apply_landscape_section(&self, body: &mut DocumentBody) {
        let Some(landscape) = &self.landscape else {
            return;
        };
        let marker = format!("{{@{}}}", landscape.tag);
        let Some(mut index) =
            body.position_from(0, |b| b.is_paragraph() && b.text().trim() == marker)
        else {
            return;
        };

        let already_applied = body
            .position_from(index + 1, Block::is_paragraph)
            .map(|next| {
                let block = &body.blocks()[next];
                block.has_section_break() && block.xml().contains("w:orient=\"landscape\"")
            })
            .unwrap_or(false);
        if already_applied {
            return;
        }

        if let Some(title) = previous_title(body, index, &landscape.title) {
            body.blocks_mut().remove(title);
            index -= 1;
        }

        let (portrait, landscape_section) = section_variants(body.final_section());
        body.blocks_mut()
            .insert(index, Block::Paragraph(section_break_paragraph(&portrait)));
        index += 1;

        match body.position_from(index + 1, Block::is_paragraph) {
            Some(next)
                if !body.blocks()[next].has_section_break()
                    && !body.blocks()[next].text().contains("{@") =>
            {
                let block = &mut body.blocks_mut()[next];
                let updated = inject_section(block.xml(), &landscape_section);
                *block.xml_mut() = updated;
            }
            _ => {
                body.blocks_mut().insert(
                    index + 1,
                    Block::Paragraph(section_break_paragraph(&landscape_section)),
                );
            }
        }
        debug!("landscape section applied around `{}`", landscape.tag);
    }

    fn fix_paragraph(&self, paragraph: &str) -> Option<String> {
        let mut current: Option<String> = None;
        for fix in &self.fixes {
            if fix.find.is_empty() {
                continue;
            }
            let xml = current.as_deref().unwrap_or(paragraph);
            let text = VirtualText::scan(xml);
            if !text.text.contains(&fix.context) {
                continue;
            }
            let mut updated = xml.to_string();
            let mut from = 0;
            loop {
                let view = VirtualText::scan(&updated);
                let Some(at) = view.text.get(from..).and_then(|t| t.find(&fix.find)) else {
                    break;
                };
                let start = from + at;
                let Some(next) = view.splice(&updated, start..start + fix.find.len(), &fix.replace)
                else {
                    break;
                };
                updated = next;
                from = start + fix.replace.len();
            }
            if updated != xml {
                current = Some(updated);
            }
        }
        current
    }
}

/// Index of the title paragraph just before `index`, skipping blank
/// paragraphs.
fn previous_title(body: &DocumentBody, index: usize, title: &str) -> Option<usize> {
    let wanted = title.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    let blocks = body.blocks();
    let mut i = index;
    while i > 0 {
        i -= 1;
        let block = &blocks[i];
        if block.is_blank_paragraph() && !block.has_section_break() {
            continue;
        }
        let matches = block.is_paragraph()
            && !block.has_section_break()
            && block.text().to_lowercase().contains(&wanted);
        return matches.then_some(i);
    }
    None
}

/// Portrait and landscape copies of the document's section descriptor.
pub fn section_variants(final_section: Option<&str>) -> (String, String) {
    let base = final_section.unwrap_or(DEFAULT_SECTION);
    let (width, height) = PAGE_SIZE_RE
        .find(base)
        .map(|m| {
            let tag = m.as_str();
            let read = |re: &Regex| {
                re.captures(tag)
                    .and_then(|c| c.get(1))
                    .and_then(|v| v.as_str().parse::<u32>().ok())
            };
            (read(&WIDTH_RE).unwrap_or(11906), read(&HEIGHT_RE).unwrap_or(16838))
        })
        .unwrap_or((11906, 16838));
    let short = width.min(height);
    let long = width.max(height);

    let portrait_size = format!("<w:pgSz w:w=\"{}\" w:h=\"{}\"/>", short, long);
    let landscape_size = format!(
        "<w:pgSz w:w=\"{}\" w:h=\"{}\" w:orient=\"landscape\"/>",
        long, short
    );
    (
        with_page_size(base, &portrait_size),
        with_page_size(base, &landscape_size),
    )
}

fn with_page_size(section: &str, page_size: &str) -> String {
    if PAGE_SIZE_RE.is_match(section) {
        return PAGE_SIZE_RE.replace(section, page_size).into_owned();
    }
    match section.find('>') {
        Some(end) if !section[..end].ends_with('/') => {
            format!("{}{}{}", &section[..=end], page_size, &section[end + 1..])
        }
        _ => format!("<w:sectPr>{}</w:sectPr>", page_size),
    }
}

/// Add a section descriptor to a paragraph's properties.
pub fn inject_section(paragraph: &str, section: &str) -> String {
    if let Some(close) = paragraph.find("</w:pPr>") {
        return format!("{}{}{}", &paragraph[..close], section, &paragraph[close..]);
    }
    if paragraph.contains("<w:pPr/>") {
        return paragraph.replacen("<w:pPr/>", &format!("<w:pPr>{}</w:pPr>", section), 1);
    }
    let properties = format!("<w:pPr>{}</w:pPr>", section);
    match paragraph.find('>') {
        Some(end) if paragraph[..end].ends_with('/') => {
            format!("{}>{}</w:p>", &paragraph[..end - 1].trim_end(), properties)
        }
        Some(end) => format!("{}{}{}", &paragraph[..=end], properties, &paragraph[end + 1..]),
        None => paragraph.to_string(),
    }
}

/// Join markers whose characters are spread over several `w:t` elements.
fn consolidate_paragraph(paragraph: &str) -> Option<String> {
    let mut current = paragraph.to_string();
    let mut changed = false;
    loop {
        let view = VirtualText::scan(&current);
        let split = MARKER_RE
            .find_iter(&view.text)
            .find(|m| view.segments_spanned(m.range()) > 1);
        let Some(marker) = split else {
            break;
        };
        let token = marker.as_str().to_string();
        match view.splice(&current, marker.range(), &token) {
            Some(next) if next != current => {
                current = next;
                changed = true;
            }
            _ => break,
        }
    }
    changed.then_some(current)
}

/// Escape braces in text that are not part of a marker.
pub fn sanitize_braces(xml: &str) -> String {
    map_text_elements(xml, |tag, content| {
        if !content.contains(['{', '}']) {
            return None;
        }
        let mut out = String::with_capacity(content.len());
        let mut cursor = 0;
        for marker in MARKER_RE.find_iter(content) {
            out.push_str(&escape_stray(&content[cursor..marker.start()]));
            out.push_str(marker.as_str());
            cursor = marker.end();
        }
        out.push_str(&escape_stray(&content[cursor..]));
        (out != content).then(|| format!("{}{}</w:t>", tag, out))
    })
}

fn escape_stray(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '{' => OPEN_BRACE_SENTINEL,
            '}' => CLOSE_BRACE_SENTINEL,
            other => other,
        })
        .collect()
}
