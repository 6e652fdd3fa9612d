//! Rich-content renderer.
//!
//! Converts the editor's JSON document tree (or plain text from the drafting
//! assistant) into WordprocessingML block markup. Rendering never fails:
//! unknown nodes degrade to their text and empty input becomes one blank
//! paragraph. Images found along the way are recorded in the caller's
//! [`ImageRegistry`]; their parts are added to the package after merging.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::export::docx::media::{
    decode_data_url, drawing_run, ImageRegistry, ImageSize, ImageSource, MAX_IMAGE_WIDTH,
};
use crate::export::docx::wordml::{
    paragraph, run, text_paragraph, Align, ParagraphStyle, RunStyle, BLANK_PARAGRAPH,
};

/// A rich-text field as posted by the wizard.
///
/// Any JSON value decodes: strings, numbers and booleans become text,
/// objects and arrays become a tree, and malformed tree members are dropped
/// or read as text.
#[derive(Debug, Clone, Default)]
pub enum RichField {
    #[default]
    Empty,
    Text(String),
    Tree(RichNode),
}

impl RichField {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(text) => Self::Text(text.clone()),
            Value::Bool(_) | Value::Number(_) => Self::Text(value.to_string()),
            Value::Array(_) | Value::Object(_) => Self::Tree(RichNode::from_value(value)),
        }
    }
}

impl<'de> Deserialize<'de> for RichField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// One node of the editor document tree.
#[derive(Debug, Clone, Default)]
pub struct RichNode {
    pub kind: String,
    pub content: Vec<RichNode>,
    pub text: Option<String>,
    pub marks: Vec<Mark>,
    pub attrs: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Mark {
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Doc,
    Paragraph,
    Heading,
    BulletList,
    OrderedList,
    ListItem,
    Blockquote,
    Image,
    Text,
    HardBreak,
    Unknown,
}

impl NodeKind {
    fn of(node: &RichNode) -> Self {
        match node.kind.as_str() {
            "doc" | "document" => Self::Doc,
            "paragraph" => Self::Paragraph,
            "heading" => Self::Heading,
            "bulletList" | "bullet_list" => Self::BulletList,
            "orderedList" | "ordered_list" => Self::OrderedList,
            "listItem" | "list_item" => Self::ListItem,
            "blockquote" => Self::Blockquote,
            "image" => Self::Image,
            "text" => Self::Text,
            "hardBreak" | "hard_break" | "lineBreak" => Self::HardBreak,
            _ => Self::Unknown,
        }
    }
}

impl RichNode {
    /// Read a node leniently. Scalars become text nodes, arrays become a
    /// document of their members, and `null` members are skipped.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(object) => Self {
                kind: object
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                content: match object.get("content") {
                    Some(Value::Array(children)) => children
                        .iter()
                        .filter(|child| !child.is_null())
                        .map(Self::from_value)
                        .collect(),
                    Some(child @ Value::Object(_)) => vec![Self::from_value(child)],
                    _ => Vec::new(),
                },
                text: object.get("text").and_then(scalar_text),
                marks: match object.get("marks") {
                    Some(Value::Array(marks)) => marks.iter().filter_map(Mark::from_value).collect(),
                    _ => Vec::new(),
                },
                attrs: match object.get("attrs") {
                    Some(Value::Object(attrs)) => attrs.clone(),
                    _ => Map::new(),
                },
            },
            Value::Array(children) => Self::with_kind(
                "doc",
                children
                    .iter()
                    .filter(|child| !child.is_null())
                    .map(Self::from_value)
                    .collect(),
            ),
            other => match scalar_text(other) {
                Some(text) => Self::with_kind("paragraph", vec![Self::text_node(&text)]),
                None => Self::default(),
            },
        }
    }

    fn text_node(text: &str) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    fn with_kind(kind: &str, content: Vec<RichNode>) -> Self {
        Self {
            kind: kind.into(),
            content,
            ..Self::default()
        }
    }

    /// Build a document from plain text: blank lines separate paragraphs,
    /// single newlines are line breaks.
    pub fn from_plain_text(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        let paragraphs = normalized
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(|block| {
                let mut content = Vec::new();
                for (i, line) in block.trim_matches('\n').split('\n').enumerate() {
                    if i > 0 {
                        content.push(Self::with_kind("hardBreak", Vec::new()));
                    }
                    if !line.is_empty() {
                        content.push(Self::text_node(line));
                    }
                }
                Self::with_kind("paragraph", content)
            })
            .collect();
        Self::with_kind("doc", paragraphs)
    }

    /// Concatenated text of this node and its descendants.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match NodeKind::of(self) {
            NodeKind::Text => out.push_str(self.text.as_deref().unwrap_or_default()),
            NodeKind::HardBreak => out.push('\n'),
            _ => {
                for (i, child) in self.content.iter().enumerate() {
                    let block = !matches!(NodeKind::of(child), NodeKind::Text | NodeKind::HardBreak);
                    if block && i > 0 && !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    child.collect_text(out);
                }
            }
        }
    }

    fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    fn attr_u64(&self, key: &str) -> Option<u64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_f64().filter(|v| *v > 0.0).map(|v| v.round() as u64),
            Value::String(s) => s
                .trim()
                .trim_end_matches("px")
                .parse::<f64>()
                .ok()
                .filter(|v| *v > 0.0)
                .map(|v| v.round() as u64),
            _ => None,
        }
    }

    fn run_style(&self) -> RunStyle {
        let mut style = RunStyle::default();
        for mark in &self.marks {
            match mark.kind.as_str() {
                "bold" | "strong" => style.bold = true,
                "italic" | "em" => style.italic = true,
                "underline" => style.underline = true,
                "strike" | "strikethrough" => style.strike = true,
                _ => {}
            }
        }
        style
    }
}

impl Mark {
    fn from_value(value: &Value) -> Option<Self> {
        let kind = match value {
            Value::Object(object) => object.get("type")?.as_str()?,
            Value::String(kind) => kind.as_str(),
            _ => return None,
        };
        Some(Self {
            kind: kind.to_string(),
        })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

/// Decides how bullet-list items are presented.
///
/// The default follows an authoring convention: a bullet line ending with a
/// colon introduces a group of items and is rendered as a bold "module"
/// header instead of a bullet. Swap the policy to change the heuristic
/// without touching the traversal.
pub trait ListItemPolicy {
    fn is_module_header(&self, text: &str) -> bool;
}

/// Treats bullet lines ending in `:` as module headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColonHeaderPolicy;

impl ListItemPolicy for ColonHeaderPolicy {
    fn is_module_header(&self, text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.chars().count() > 1 && trimmed.ends_with(':')
    }
}

/// Never treats a bullet line as a header.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainListPolicy;

impl ListItemPolicy for PlainListPolicy {
    fn is_module_header(&self, _text: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Blank,
    Heading,
    List,
    Image,
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

enum Segment<'a> {
    Text(&'a str, RunStyle),
    Image(&'a RichNode),
}

const LIST_INDENT: u32 = 720;
const LIST_HANGING: u32 = 360;
const NESTED_STEP: u32 = 360;

/// Renders rich fields with a configurable list policy.
#[derive(Debug, Clone, Default)]
pub struct RichTextRenderer<P = ColonHeaderPolicy> {
    policy: P,
}

impl RichTextRenderer<ColonHeaderPolicy> {
    pub fn new() -> Self {
        Self {
            policy: ColonHeaderPolicy,
        }
    }
}

impl<P: ListItemPolicy> RichTextRenderer<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    /// Render a field into block markup. Never returns an empty string.
    pub fn render(&self, field: Option<&RichField>, registry: &mut ImageRegistry) -> String {
        let tree = match field {
            None | Some(RichField::Empty) => None,
            Some(RichField::Text(text)) => Some(RichNode::from_plain_text(text)),
            Some(RichField::Tree(node)) => Some(node.clone()),
        };

        let mut pass = RenderPass {
            policy: &self.policy,
            registry,
            blocks: Vec::new(),
            last: None,
            seen_module_header: false,
        };
        if let Some(root) = tree.as_ref() {
            pass.render_root(root);
        }

        if pass.blocks.is_empty() {
            BLANK_PARAGRAPH.to_string()
        } else {
            pass.blocks.concat()
        }
    }
}

/// State of one render call.
struct RenderPass<'a, P> {
    policy: &'a P,
    registry: &'a mut ImageRegistry,
    blocks: Vec<String>,
    last: Option<BlockKind>,
    seen_module_header: bool,
}

impl<'a, P: ListItemPolicy> RenderPass<'a, P> {
    fn render_root(&mut self, root: &RichNode) {
        match NodeKind::of(root) {
            NodeKind::Doc => {
                for child in &root.content {
                    self.render_block(child);
                }
            }
            _ => self.render_block(root),
        }
    }

    fn push(&mut self, kind: BlockKind, xml: String) {
        self.blocks.push(xml);
        self.last = Some(kind);
    }

    fn render_block(&mut self, node: &RichNode) {
        match NodeKind::of(node) {
            NodeKind::Doc => {
                for child in &node.content {
                    self.render_block(child);
                }
            }
            NodeKind::Paragraph => self.render_paragraph(node, &ParagraphStyle::body()),
            NodeKind::Text | NodeKind::HardBreak => {
                let wrapper = RichNode::with_kind("paragraph", vec![node.clone()]);
                self.render_paragraph(&wrapper, &ParagraphStyle::body());
            }
            NodeKind::Heading => self.render_heading(node),
            NodeKind::BulletList => self.render_list(node, ListKind::Bullet, 0),
            NodeKind::OrderedList => self.render_list(node, ListKind::Ordered, 0),
            NodeKind::ListItem => {
                let wrapper = RichNode::with_kind("bulletList", vec![node.clone()]);
                self.render_list(&wrapper, ListKind::Bullet, 0);
            }
            NodeKind::Blockquote => self.render_quote(node),
            NodeKind::Image => {
                let xml = self.image_paragraph(node);
                self.push(BlockKind::Image, xml);
            }
            NodeKind::Unknown => {
                let text = node.plain_text();
                if !text.trim().is_empty() {
                    let wrapper = RichNode::from_plain_text(&text.replace('\n', "\n\n"));
                    for child in &wrapper.content {
                        self.render_paragraph(child, &ParagraphStyle::body());
                    }
                }
            }
        }
    }

    /// Split inline content into lines at hard breaks.
    fn lines<'n>(node: &'n RichNode) -> Vec<Vec<Segment<'n>>> {
        let mut lines = vec![Vec::new()];
        Self::collect_segments(node, &mut lines);
        lines
    }

    fn collect_segments<'n>(node: &'n RichNode, lines: &mut Vec<Vec<Segment<'n>>>) {
        for child in &node.content {
            match NodeKind::of(child) {
                NodeKind::Text => {
                    if let Some(text) = child.text.as_deref() {
                        if let Some(line) = lines.last_mut() {
                            line.push(Segment::Text(text, child.run_style()));
                        }
                    }
                }
                NodeKind::HardBreak => lines.push(Vec::new()),
                NodeKind::Image => {
                    if let Some(line) = lines.last_mut() {
                        line.push(Segment::Image(child));
                    }
                }
                _ => Self::collect_segments(child, lines),
            }
        }
    }

    fn paragraph_style_for(node: &RichNode, base: &ParagraphStyle) -> ParagraphStyle {
        let align = match node.attr_str("textAlign") {
            Some("center") => Some(Align::Center),
            Some("right") => Some(Align::Right),
            Some("left") => Some(Align::Left),
            Some("justify") => Some(Align::Both),
            _ => base.align,
        };
        ParagraphStyle { align, ..*base }
    }

    fn render_paragraph(&mut self, node: &RichNode, base: &ParagraphStyle) {
        let style = Self::paragraph_style_for(node, base);
        let lines = Self::lines(node);
        let has_image = lines
            .iter()
            .flatten()
            .any(|segment| matches!(segment, Segment::Image(_)));
        let has_text = lines.iter().flatten().any(|segment| match segment {
            Segment::Text(text, _) => !text.trim().is_empty(),
            Segment::Image(_) => false,
        });

        if !has_text && !has_image {
            self.push(BlockKind::Blank, BLANK_PARAGRAPH.to_string());
            return;
        }

        if !has_image && self.last == Some(BlockKind::Text) {
            self.blocks.push(BLANK_PARAGRAPH.to_string());
        }

        let mut out = String::new();
        for line in &lines {
            let mut runs = String::new();
            for segment in line {
                match segment {
                    Segment::Text(text, run_style) => runs.push_str(&run(text, run_style)),
                    Segment::Image(image) => {
                        if !runs.is_empty() {
                            out.push_str(&paragraph(&runs, &style));
                            runs.clear();
                        }
                        out.push_str(&self.image_paragraph(image));
                    }
                }
            }
            if !runs.is_empty() {
                out.push_str(&paragraph(&runs, &style));
            } else if !has_image {
                out.push_str(BLANK_PARAGRAPH);
            }
        }

        let kind = if has_image {
            BlockKind::Image
        } else {
            BlockKind::Text
        };
        self.push(kind, out);
    }

    fn render_heading(&mut self, node: &RichNode) {
        let size = match node.attr_u64("level").unwrap_or(1) {
            1 => 32,
            2 => 28,
            _ => 26,
        };
        let style = ParagraphStyle {
            keep_next: true,
            spacing_before: Some(240),
            spacing_after: Some(60),
            ..Self::paragraph_style_for(node, &ParagraphStyle::default())
        };

        let mut out = String::new();
        for line in Self::lines(node) {
            let runs: String = line
                .iter()
                .filter_map(|segment| match segment {
                    Segment::Text(text, run_style) => {
                        let emphasized = RunStyle {
                            bold: true,
                            size: Some(size),
                            ..*run_style
                        };
                        Some(run(text, &emphasized))
                    }
                    Segment::Image(_) => None,
                })
                .collect();
            if !runs.is_empty() {
                out.push_str(&paragraph(&runs, &style));
            }
        }
        if out.is_empty() {
            self.push(BlockKind::Blank, BLANK_PARAGRAPH.to_string());
        } else {
            self.push(BlockKind::Heading, out);
        }
    }

    fn render_list(&mut self, node: &RichNode, kind: ListKind, depth: u32) {
        let mut out = String::new();
        let mut number = 0u32;
        for item in &node.content {
            number += 1;
            self.render_list_item(item, kind, depth, number, &mut out);
        }
        if !out.is_empty() {
            self.push(BlockKind::List, out);
        }
    }

    fn render_list_item(
        &mut self,
        item: &RichNode,
        kind: ListKind,
        depth: u32,
        number: u32,
        out: &mut String,
    ) {
        let left = LIST_INDENT + depth * NESTED_STEP;
        let item_style = ParagraphStyle {
            spacing_after: Some(60),
            ..ParagraphStyle::default().indented(left, Some(LIST_HANGING))
        };
        let continuation = ParagraphStyle {
            spacing_after: Some(60),
            ..ParagraphStyle::default().indented(left, None)
        };

        // Items without a paragraph wrapper carry their inline content directly.
        let children: Vec<RichNode> = if item
            .content
            .iter()
            .all(|c| matches!(NodeKind::of(c), NodeKind::Text | NodeKind::HardBreak))
        {
            vec![RichNode::with_kind("paragraph", item.content.clone())]
        } else {
            item.content.clone()
        };

        let mut first = true;
        for child in &children {
            match NodeKind::of(child) {
                NodeKind::BulletList | NodeKind::OrderedList => {
                    let nested_kind = if NodeKind::of(child) == NodeKind::OrderedList {
                        ListKind::Ordered
                    } else {
                        ListKind::Bullet
                    };
                    let mut nested_number = 0u32;
                    for nested in &child.content {
                        nested_number += 1;
                        self.render_list_item(nested, nested_kind, depth + 1, nested_number, out);
                    }
                }
                NodeKind::Image => out.push_str(&self.image_paragraph(child)),
                _ => {
                    let text = child.plain_text();
                    if first
                        && kind == ListKind::Bullet
                        && self.policy.is_module_header(&text)
                    {
                        if self.seen_module_header {
                            out.push_str(BLANK_PARAGRAPH);
                        }
                        self.seen_module_header = true;
                        let header_style = ParagraphStyle {
                            keep_next: true,
                            spacing_after: Some(60),
                            ..ParagraphStyle::default()
                        };
                        out.push_str(&text_paragraph(text.trim(), &RunStyle::bold(), &header_style));
                        first = false;
                        continue;
                    }

                    for (line_no, line) in Self::lines(child).into_iter().enumerate() {
                        let mut runs = String::new();
                        if first && line_no == 0 {
                            let prefix = match kind {
                                ListKind::Bullet => "•\t".to_string(),
                                ListKind::Ordered => format!("{}.\t", number),
                            };
                            runs.push_str(&run(&prefix, &RunStyle::default()));
                        }
                        for segment in &line {
                            match segment {
                                Segment::Text(text, run_style) => {
                                    runs.push_str(&run(text, run_style))
                                }
                                Segment::Image(image) => {
                                    let xml = self.image_paragraph(image);
                                    out.push_str(&xml);
                                }
                            }
                        }
                        if !runs.is_empty() {
                            let style = if first && line_no == 0 {
                                &item_style
                            } else {
                                &continuation
                            };
                            out.push_str(&paragraph(&runs, style));
                        }
                    }
                    first = false;
                }
            }
        }
    }

    fn render_quote(&mut self, node: &RichNode) {
        let style = ParagraphStyle::body().indented(LIST_INDENT, None);
        let mut out = String::new();
        for child in &node.content {
            let text_lines: Vec<String> = match NodeKind::of(child) {
                NodeKind::Paragraph | NodeKind::Heading | NodeKind::Text => Self::lines(child)
                    .iter()
                    .map(|line| {
                        line.iter()
                            .filter_map(|segment| match segment {
                                Segment::Text(text, run_style) => Some(run(text, run_style)),
                                Segment::Image(_) => None,
                            })
                            .collect()
                    })
                    .collect(),
                _ => child
                    .plain_text()
                    .lines()
                    .map(|line| run(line, &RunStyle::default()))
                    .collect(),
            };
            for runs in text_lines.into_iter().filter(|r| !r.is_empty()) {
                out.push_str(&paragraph(&runs, &style));
            }
        }
        if out.is_empty() {
            self.push(BlockKind::Blank, BLANK_PARAGRAPH.to_string());
        } else {
            self.push(BlockKind::Quote, out);
        }
    }

    fn image_paragraph(&mut self, node: &RichNode) -> String {
        let src = node.attr_str("src").unwrap_or_default().trim();
        let centered = ParagraphStyle::body().aligned(Align::Center);
        let explicit = match (node.attr_u64("width"), node.attr_u64("height")) {
            (Some(w), Some(h)) => Some(ImageSize::from_pixels(w, h).fit_width(MAX_IMAGE_WIDTH)),
            _ => None,
        };
        let name = node.attr_str("alt").unwrap_or("Imagem");

        let source = if let Some(path) = local_upload_path(src) {
            Some(ImageSource::Upload(path.to_string()))
        } else {
            decode_data_url(src).map(ImageSource::Embedded)
        };

        match source {
            Some(source) => {
                let (rel_id, drawing_id) = self.registry.register(source, explicit);
                let size = self.registry.entries()[self.registry.len() - 1].size;
                paragraph(&drawing_run(&rel_id, drawing_id, name, size), &centered)
            }
            None => {
                let label = if src.is_empty() {
                    "[Imagem]".to_string()
                } else {
                    format!("[Imagem externa: {}]", src)
                };
                text_paragraph(&label, &RunStyle::muted_italic(), &centered)
            }
        }
    }
}

/// Relative upload path for sources served from the uploads area.
pub fn local_upload_path(src: &str) -> Option<&str> {
    src.strip_prefix("/uploads/")
        .or_else(|| src.strip_prefix("uploads/"))
        .filter(|rest| !rest.is_empty())
}
