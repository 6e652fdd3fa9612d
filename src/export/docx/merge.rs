//! Marker substitution.
//!
//! `{key}` markers are replaced inside the `w:t` element that carries them;
//! `{@key}` markers replace their whole paragraph with ready-made markup.
//! Everything inserted has its braces swapped for sentinels so it is never
//! read as a marker again.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::body::{map_leaf_paragraphs, map_text_elements, VirtualText};
use super::wordml::BLANK_PARAGRAPH;
use super::{escape_braces, MergeError};
use crate::export::generators::common::escape_xml;

lazy_static! {
    static ref TEXT_MARKER_RE: Regex =
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid text marker regex");
    static ref RAW_MARKER_RE: Regex =
        Regex::new(r"\{@([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid raw marker regex");
}

const CHECK_SUFFIX: &str = "_check";
const UNCHECKED: &str = "  ";
const LINE_BREAK: &str = "</w:t><w:br/><w:t xml:space=\"preserve\">";

/// Flat merge map: plain text values and raw markup values.
#[derive(Debug, Clone, Default)]
pub struct MergeData {
    pub text: BTreeMap<String, String>,
    pub raw: BTreeMap<String, String>,
}

impl MergeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.text.insert(key.into(), value.into());
    }

    pub fn insert_raw(&mut self, key: impl Into<String>, markup: impl Into<String>) {
        self.raw.insert(key.into(), markup.into());
    }

    pub fn text_value(&self, key: &str) -> Option<&str> {
        self.text.get(key).map(String::as_str)
    }

    pub fn raw_value(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }
}

/// Applies a [`MergeData`] map to WordprocessingML parts.
pub struct TemplateMerger<'a> {
    data: &'a MergeData,
}

impl<'a> TemplateMerger<'a> {
    /// Check every raw fragment before anything is merged.
    pub fn new(data: &'a MergeData) -> Result<Self, MergeError> {
        for (key, markup) in &data.raw {
            check_well_formed(markup).map_err(|reason| MergeError::MalformedMarkup {
                key: key.clone(),
                reason,
            })?;
        }
        Ok(Self { data })
    }

    pub fn merge_part(&self, xml: &str) -> String {
        let with_raw = self.merge_raw(xml);
        self.merge_text(&with_raw)
    }

    fn merge_raw(&self, xml: &str) -> String {
        map_leaf_paragraphs(xml, |paragraph| {
            let text = VirtualText::scan(paragraph).text;
            let key = RAW_MARKER_RE.captures(&text)?.get(1)?.as_str().to_string();
            match self.data.raw_value(&key) {
                Some(markup) => Some(escape_braces(markup)),
                None => {
                    debug!("No markup for {{@{}}}, leaving a blank paragraph", key);
                    Some(BLANK_PARAGRAPH.to_string())
                }
            }
        })
    }

    fn merge_text(&self, xml: &str) -> String {
        map_text_elements(xml, |_tag, content| {
            if !TEXT_MARKER_RE.is_match(content) {
                return None;
            }
            let replaced = TEXT_MARKER_RE.replace_all(content, |caps: &regex::Captures| {
                let key = &caps[1];
                let value = self.data.text_value(key).unwrap_or(if key.ends_with(CHECK_SUFFIX) {
                    UNCHECKED
                } else {
                    ""
                });
                encode_value(value)
            });
            Some(format!("<w:t xml:space=\"preserve\">{}</w:t>", replaced))
        })
    }
}

/// Escape a text value for a `w:t` body, turning newlines into breaks.
fn encode_value(value: &str) -> String {
    let normalized = value.replace("\r\n", "\n").replace('\r', "\n");
    escape_xml(&escape_braces(&normalized)).replace('\n', LINE_BREAK)
}

/// Parse `markup` as element content; every element must be closed.
pub fn check_well_formed(markup: &str) -> Result<(), String> {
    let wrapped = format!("<fragment>{}</fragment>", markup);
    let mut reader = Reader::from_str(&wrapped);
    let mut depth: i64 = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                depth -= 1;
                if depth < 0 {
                    return Err("unexpected closing tag".to_string());
                }
            }
            Ok(Event::Text(text)) => {
                text.unescape().map_err(|e| e.to_string())?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                ))
            }
        }
    }
    if depth != 0 {
        return Err(format!("{} unclosed element(s)", depth));
    }
    Ok(())
}
