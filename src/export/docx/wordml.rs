//! WordprocessingML fragment builders.
//!
//! Everything the renderers emit goes through these helpers so element and
//! property ordering stays schema-valid in one place.

use crate::export::generators::common::escape_xml;

/// Paragraph used wherever a fragment must not be empty.
pub const BLANK_PARAGRAPH: &str = "<w:p><w:pPr><w:spacing w:after=\"0\"/></w:pPr></w:p>";

/// Text shown in place of an empty section.
pub const NOT_APPLICABLE: &str = "Não se aplica.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
    Both,
}

impl Align {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Both => "both",
        }
    }
}

/// Run-level formatting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    /// Hex colour without `#`.
    pub color: Option<&'static str>,
    /// Size in half-points.
    pub size: Option<u32>,
}

impl RunStyle {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    pub fn muted_italic() -> Self {
        Self {
            italic: true,
            color: Some("808080"),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, half_points: u32) -> Self {
        self.size = Some(half_points);
        self
    }

    fn properties(&self) -> String {
        let mut props = String::new();
        if self.bold {
            props.push_str("<w:b/><w:bCs/>");
        }
        if self.italic {
            props.push_str("<w:i/><w:iCs/>");
        }
        if self.strike {
            props.push_str("<w:strike/>");
        }
        if let Some(color) = self.color {
            props.push_str(&format!("<w:color w:val=\"{}\"/>", color));
        }
        if let Some(size) = self.size {
            props.push_str(&format!("<w:sz w:val=\"{size}\"/><w:szCs w:val=\"{size}\"/>"));
        }
        if self.underline {
            props.push_str("<w:u w:val=\"single\"/>");
        }
        if props.is_empty() {
            props
        } else {
            format!("<w:rPr>{}</w:rPr>", props)
        }
    }
}

/// Paragraph-level formatting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParagraphStyle {
    pub align: Option<Align>,
    pub keep_next: bool,
    /// Spacing in twentieths of a point.
    pub spacing_before: Option<u32>,
    pub spacing_after: Option<u32>,
    /// Indentation in twentieths of a point.
    pub indent_left: Option<u32>,
    pub hanging: Option<u32>,
}

impl ParagraphStyle {
    pub fn body() -> Self {
        Self {
            align: Some(Align::Both),
            spacing_after: Some(120),
            ..Self::default()
        }
    }

    pub fn compact() -> Self {
        Self {
            spacing_before: Some(0),
            spacing_after: Some(0),
            ..Self::default()
        }
    }

    pub fn aligned(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn indented(mut self, left: u32, hanging: Option<u32>) -> Self {
        self.indent_left = Some(left);
        self.hanging = hanging;
        self
    }

    fn properties(&self) -> String {
        let mut props = String::new();
        if self.keep_next {
            props.push_str("<w:keepNext/>");
        }
        if self.spacing_before.is_some() || self.spacing_after.is_some() {
            props.push_str("<w:spacing");
            if let Some(before) = self.spacing_before {
                props.push_str(&format!(" w:before=\"{}\"", before));
            }
            if let Some(after) = self.spacing_after {
                props.push_str(&format!(" w:after=\"{}\"", after));
            }
            props.push_str("/>");
        }
        if let Some(left) = self.indent_left {
            props.push_str(&format!("<w:ind w:left=\"{}\"", left));
            if let Some(hanging) = self.hanging {
                props.push_str(&format!(" w:hanging=\"{}\"", hanging));
            }
            props.push_str("/>");
        }
        if let Some(align) = self.align {
            props.push_str(&format!("<w:jc w:val=\"{}\"/>", align.as_str()));
        }
        if props.is_empty() {
            props
        } else {
            format!("<w:pPr>{}</w:pPr>", props)
        }
    }
}

/// A single run. Newlines become `w:br`, tabs become `w:tab`.
pub fn run(text: &str, style: &RunStyle) -> String {
    let mut body = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            body.push_str("<w:br/>");
        }
        for (j, chunk) in line.split('\t').enumerate() {
            if j > 0 {
                body.push_str("<w:tab/>");
            }
            if !chunk.is_empty() {
                body.push_str(&format!(
                    "<w:t xml:space=\"preserve\">{}</w:t>",
                    escape_xml(chunk.trim_end_matches('\r'))
                ));
            }
        }
    }
    format!("<w:r>{}{}</w:r>", style.properties(), body)
}

/// A paragraph around pre-rendered runs.
pub fn paragraph(runs: &str, style: &ParagraphStyle) -> String {
    format!("<w:p>{}{}</w:p>", style.properties(), runs)
}

/// A paragraph holding one run of text.
pub fn text_paragraph(text: &str, run_style: &RunStyle, style: &ParagraphStyle) -> String {
    paragraph(&run(text, run_style), style)
}

/// A `Label: value` line with a bold label.
pub fn labeled_paragraph(label: &str, value: &str) -> String {
    let runs = format!(
        "{}{}",
        run(&format!("{}: ", label), &RunStyle::bold()),
        run(value, &RunStyle::default())
    );
    paragraph(&runs, &ParagraphStyle::body())
}

/// The italic "not applicable" paragraph used for empty sections.
pub fn placeholder_paragraph() -> String {
    text_paragraph(NOT_APPLICABLE, &RunStyle::muted_italic(), &ParagraphStyle::body())
}

/// A paragraph carrying a section descriptor, closing the current section.
pub fn section_break_paragraph(sect_pr: &str) -> String {
    format!("<w:p><w:pPr>{}</w:pPr></w:p>", sect_pr)
}

/// One table cell.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    text: String,
    style: RunStyle,
    align: Option<Align>,
    shade: Option<&'static str>,
    span: u32,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            span: 1,
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.style.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.style.italic = true;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn right(self) -> Self {
        self.align(Align::Right)
    }

    pub fn center(self) -> Self {
        self.align(Align::Center)
    }

    pub fn shade(mut self, fill: &'static str) -> Self {
        self.shade = Some(fill);
        self
    }

    pub fn span(mut self, columns: u32) -> Self {
        self.span = columns.max(1);
        self
    }

    fn render(&self, width: u32, font_size: u32) -> String {
        let mut props = format!("<w:tcW w:w=\"{}\" w:type=\"dxa\"/>", width);
        if self.span > 1 {
            props.push_str(&format!("<w:gridSpan w:val=\"{}\"/>", self.span));
        }
        if let Some(fill) = self.shade {
            props.push_str(&format!(
                "<w:shd w:val=\"clear\" w:color=\"auto\" w:fill=\"{}\"/>",
                fill
            ));
        }
        props.push_str("<w:vAlign w:val=\"center\"/>");

        let para_style = ParagraphStyle {
            align: self.align,
            ..ParagraphStyle::compact()
        };
        let style = self.style.with_size(font_size);
        let runs = if self.text.is_empty() {
            String::new()
        } else {
            run(&self.text, &style)
        };
        format!("<w:tc><w:tcPr>{}</w:tcPr>{}</w:tc>", props, paragraph(&runs, &para_style))
    }
}

/// Builder for a bordered, fixed-layout table.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    widths: Vec<u32>,
    font_size: u32,
    rows: Vec<String>,
}

impl TableBuilder {
    /// Create a table with column widths in twentieths of a point.
    pub fn new(widths: Vec<u32>) -> Self {
        Self {
            widths,
            font_size: 18,
            rows: Vec::new(),
        }
    }

    /// Set the type size (half-points) for every cell.
    pub fn font_size(mut self, half_points: u32) -> Self {
        self.font_size = half_points;
        self
    }

    /// Add a header row, repeated on every page.
    pub fn header(self, cells: Vec<Cell>) -> Self {
        self.push_row(cells, true)
    }

    pub fn row(self, cells: Vec<Cell>) -> Self {
        self.push_row(cells, false)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn push_row(mut self, cells: Vec<Cell>, header: bool) -> Self {
        let mut column = 0usize;
        let mut xml = String::from("<w:tr>");
        if header {
            xml.push_str("<w:trPr><w:cantSplit/><w:tblHeader/></w:trPr>");
        } else {
            xml.push_str("<w:trPr><w:cantSplit/></w:trPr>");
        }
        for cell in &cells {
            let span = cell.span as usize;
            let width: u32 = self.widths.iter().skip(column).take(span).sum();
            xml.push_str(&cell.render(width, self.font_size));
            column += span;
        }
        xml.push_str("</w:tr>");
        self.rows.push(xml);
        self
    }

    /// Serialize the table followed by a spacer paragraph, so the fragment
    /// stays valid where a table may not close a container.
    pub fn build(self) -> String {
        let grid: String = self
            .widths
            .iter()
            .map(|w| format!("<w:gridCol w:w=\"{}\"/>", w))
            .collect();
        let total: u32 = self.widths.iter().sum();
        let border = "w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"000000\"";
        format!(
            "<w:tbl><w:tblPr><w:tblW w:w=\"{total}\" w:type=\"dxa\"/><w:jc w:val=\"center\"/>\
             <w:tblBorders><w:top {b}/><w:left {b}/><w:bottom {b}/><w:right {b}/>\
             <w:insideH {b}/><w:insideV {b}/></w:tblBorders><w:tblLayout w:type=\"fixed\"/>\
             <w:tblCellMar><w:left w:w=\"57\" w:type=\"dxa\"/><w:right w:w=\"57\" w:type=\"dxa\"/></w:tblCellMar>\
             </w:tblPr><w:tblGrid>{grid}</w:tblGrid>{rows}</w:tbl>{spacer}",
            total = total,
            b = border,
            grid = grid,
            rows = self.rows.concat(),
            spacer = BLANK_PARAGRAPH,
        )
    }
}
