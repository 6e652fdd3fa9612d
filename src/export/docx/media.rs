//! Image media: registry, type detection and inline drawing markup.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;
use uuid::Uuid;

use crate::export::generators::common::escape_xml;

/// English Metric Units per centimetre.
pub const EMU_PER_CM: u64 = 360_000;
/// English Metric Units per pixel at 96 dpi.
pub const EMU_PER_PX: u64 = 9_525;
/// Widest an inline content image may be.
pub const MAX_IMAGE_WIDTH: u64 = 14 * EMU_PER_CM;
/// Default box used until the real dimensions are known.
pub const DEFAULT_IMAGE_SIZE: ImageSize = ImageSize {
    cx: 14 * EMU_PER_CM,
    cy: 105 * EMU_PER_CM / 10,
};

/// Supported raster formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    /// Detect the format from magic bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.starts_with(b"GIF8") {
            return Some(Self::Gif);
        }
        if data.starts_with(b"BM") {
            return Some(Self::Bmp);
        }
        None
    }

    /// Parse from a MIME type string.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Guess from a file name, via its registered MIME type.
    pub fn from_path(path: &Path) -> Option<Self> {
        let guess = mime_guess::from_path(path).first()?;
        Self::from_mime(guess.essence_str())
    }
}

/// Extent of a drawing in EMUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub cx: u64,
    pub cy: u64,
}

/// Largest extent a drawing may declare (`ST_PositiveCoordinate`).
pub const MAX_EXTENT: u64 = 27_273_042_316_900;

/// `value * num / den` without overflow, clamped to [`MAX_EXTENT`].
fn scale(value: u64, num: u64, den: u64) -> u64 {
    (value as u128 * num as u128 / den as u128).min(MAX_EXTENT as u128) as u64
}

impl ImageSize {
    pub fn from_pixels(width: u64, height: u64) -> Self {
        Self {
            cx: width.saturating_mul(EMU_PER_PX).min(MAX_EXTENT),
            cy: height.saturating_mul(EMU_PER_PX).min(MAX_EXTENT),
        }
    }

    /// Scale down proportionally so the width does not exceed `max_cx`.
    pub fn fit_width(self, max_cx: u64) -> Self {
        if self.cx <= max_cx || self.cx == 0 {
            return self;
        }
        Self {
            cx: max_cx,
            cy: scale(self.cy, max_cx, self.cx),
        }
    }

    /// Scale proportionally to an exact height.
    pub fn with_height(self, cy: u64) -> Self {
        if self.cy == 0 {
            return Self { cx: cy, cy };
        }
        Self {
            cx: scale(self.cx, cy, self.cy),
            cy,
        }
    }
}

/// Read pixel dimensions from a PNG, GIF, BMP or JPEG header.
pub fn pixel_dimensions(data: &[u8]) -> Option<(u64, u64)> {
    let be32 = |at: usize| -> Option<u64> {
        let b = data.get(at..at + 4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64)
    };
    let le16 = |at: usize| -> Option<u64> {
        let b = data.get(at..at + 2)?;
        Some(u16::from_le_bytes([b[0], b[1]]) as u64)
    };
    let le32 = |at: usize| -> Option<u64> {
        let b = data.get(at..at + 4)?;
        Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]).unsigned_abs() as u64)
    };

    match ImageFormat::from_bytes(data)? {
        ImageFormat::Png => Some((be32(16)?, be32(20)?)),
        ImageFormat::Gif => Some((le16(6)?, le16(8)?)),
        ImageFormat::Bmp => Some((le32(18)?, le32(22)?)),
        ImageFormat::Jpeg => jpeg_dimensions(data),
    }
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u64, u64)> {
    let mut pos = 2;
    while pos + 9 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        // SOF0..SOF15 except DHT (C4), JPG (C8) and DAC (CC)
        if (0xC0..=0xCF).contains(&marker) && ![0xC4, 0xC8, 0xCC].contains(&marker) {
            let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u64;
            let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]) as u64;
            return Some((width, height));
        }
        pos += 2 + length;
    }
    None
}

/// Decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decode a base64 `data:` URL. Returns `None` for anything else.
pub fn decode_data_url(url: &str) -> Option<DataUrl> {
    let rest = url.trim().strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(cleaned.as_bytes()).ok()?;
    Some(DataUrl {
        mime: mime.to_string(),
        bytes,
    })
}

/// Where the bytes of a registered image come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Path relative to the uploads root.
    Upload(String),
    /// Bytes carried inline by the rich text.
    Embedded(DataUrl),
}

/// An image referenced by rendered markup whose part is added after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredImage {
    pub rel_id: String,
    pub drawing_id: u32,
    pub source: ImageSource,
    pub size: ImageSize,
    /// False when `size` is the default box and should be corrected.
    pub explicit_size: bool,
}

/// Images registered during one render call.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    entries: Vec<RegisteredImage>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image and return its relationship id and drawing id.
    pub fn register(&mut self, source: ImageSource, size: Option<ImageSize>) -> (String, u32) {
        let rel_id = format!("rIdImg{}", Uuid::new_v4().simple());
        let drawing_id = 1000 + self.entries.len() as u32;
        self.entries.push(RegisteredImage {
            rel_id: rel_id.clone(),
            drawing_id,
            source,
            size: size.unwrap_or(DEFAULT_IMAGE_SIZE),
            explicit_size: size.is_some(),
        });
        (rel_id, drawing_id)
    }

    pub fn entries(&self) -> &[RegisteredImage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<RegisteredImage> {
        self.entries
    }
}

/// Inline drawing run referencing relationship `rel_id`.
pub fn drawing_run(rel_id: &str, drawing_id: u32, name: &str, size: ImageSize) -> String {
    let name = escape_xml(name);
    format!(
        "<w:r><w:drawing><wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">\
         <wp:extent cx=\"{cx}\" cy=\"{cy}\"/><wp:docPr id=\"{id}\" name=\"{name}\"/>\
         <wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" noChangeAspect=\"1\"/></wp:cNvGraphicFramePr>\
         <a:graphic xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\">\
         <a:graphicData uri=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">\
         <pic:pic xmlns:pic=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">\
         <pic:nvPicPr><pic:cNvPr id=\"{id}\" name=\"{name}\"/><pic:cNvPicPr/></pic:nvPicPr>\
         <pic:blipFill><a:blip r:embed=\"{rel}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>\
         <pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>\
         <a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>\
         </a:graphicData></a:graphic></wp:inline></w:drawing></w:r>",
        cx = size.cx,
        cy = size.cy,
        id = drawing_id,
        name = name,
        rel = rel_id,
    )
}
