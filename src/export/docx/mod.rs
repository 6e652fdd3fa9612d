//! WordprocessingML package handling: container codec, body model, template
//! surgery, marker merging and post-merge fix-ups.

pub mod body;
pub mod media;
pub mod merge;
pub mod package;
pub mod postprocess;
pub mod surgeon;
pub mod wordml;

pub use body::{Block, DocumentBody};
pub use media::{ImageRegistry, ImageSource, RegisteredImage};
pub use merge::{MergeData, TemplateMerger};
pub use package::DocxPackage;
pub use postprocess::{Logos, PostProcessor};
pub use surgeon::TemplateSurgeon;

use thiserror::Error;

/// Errors raised while reading, editing or writing a package.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("missing package part: {0}")]
    MissingPart(String),
    #[error("part is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("malformed document body: {0}")]
    MalformedBody(String),
}

/// Errors raised by the marker merge step.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("markup for `{key}` is not well-formed: {reason}")]
    MalformedMarkup { key: String, reason: String },
}

/// Private-use stand-ins for braces that must survive merging literally.
pub const OPEN_BRACE_SENTINEL: char = '\u{E000}';
pub const CLOSE_BRACE_SENTINEL: char = '\u{E001}';

/// Swap every brace for its sentinel.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', &OPEN_BRACE_SENTINEL.to_string())
        .replace('}', &CLOSE_BRACE_SENTINEL.to_string())
}

/// Turn sentinels back into braces.
pub fn restore_braces(text: &str) -> String {
    text.replace(OPEN_BRACE_SENTINEL, "{")
        .replace(CLOSE_BRACE_SENTINEL, "}")
}
