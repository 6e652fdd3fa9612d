//! Post-merge fix-ups: lost section breaks, header logos and content images.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use uuid::Uuid;

use super::body::leaf_paragraphs;
use super::media::{
    decode_data_url, drawing_run, pixel_dimensions, ImageFormat, ImageRegistry, ImageSize,
    ImageSource, RegisteredImage, EMU_PER_CM, MAX_IMAGE_WIDTH,
};
use super::package::{DocxPackage, DOCUMENT_PART, IMAGE_RELATIONSHIP};
use super::wordml::{run, section_break_paragraph, RunStyle};
use super::PackageError;

lazy_static! {
    static ref SECTION_RE: Regex =
        Regex::new(r"(?s)<w:sectPr\b[^>]*?(?:/>|>.*?</w:sectPr>)").expect("valid sectPr regex");
}

const LANDSCAPE_MARK: &str = "w:orient=\"landscape\"";
const UNAVAILABLE_IMAGE: &str = "[Imagem indisponível]";
const LOGO_MAX_WIDTH: u64 = 5 * EMU_PER_CM;
const LOGO_MAX_HEIGHT: u64 = 3 * EMU_PER_CM / 2;
const DRAWING_RUN_START: &str = "<w:r><w:drawing>";

const DRAWING_NAMESPACES: [(&str, &str); 2] = [
    (
        "xmlns:wp",
        "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing",
    ),
    (
        "xmlns:r",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    ),
];

/// Logo data URLs for the two header slots.
#[derive(Debug, Clone, Default)]
pub struct Logos {
    pub company: Option<String>,
    pub partner: Option<String>,
}

impl Logos {
    fn slots(&self) -> [(&'static str, Option<&str>); 2] {
        [
            ("company_logo", self.company.as_deref()),
            ("partner_logo", self.partner.as_deref()),
        ]
    }
}

pub struct PostProcessor {
    uploads_dir: PathBuf,
}

impl PostProcessor {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Run every fix-up. Section repair comes before image injection.
    pub fn run(
        &self,
        package: &mut DocxPackage,
        pristine_document: &str,
        registry: ImageRegistry,
        logos: &Logos,
    ) -> Result<(), PackageError> {
        let merged = package.part_str(DOCUMENT_PART)?;
        let repaired = repair_section_breaks(pristine_document, &merged);
        if repaired != merged {
            package.set_part_str(DOCUMENT_PART, repaired);
        }

        self.inject_header_logos(package, logos)?;
        self.inject_content_images(package, registry)?;
        Ok(())
    }

    pub fn inject_header_logos(
        &self,
        package: &mut DocxPackage,
        logos: &Logos,
    ) -> Result<(), PackageError> {
        // slot -> (media target, size)
        let mut stored: HashMap<&str, Option<(String, ImageSize)>> = HashMap::new();
        let mut drawing_id = 900;

        for header in package.header_parts() {
            let original = package.part_str(&header)?;
            let mut xml = original.clone();

            for (slot, data) in logos.slots() {
                let token = format!("{{%{}}}", slot);
                if !xml.contains(&token) {
                    continue;
                }

                if !stored.contains_key(slot) {
                    let media = data.and_then(|url| store_logo(package, slot, url).transpose());
                    let media = media.transpose()?;
                    if data.is_some() && media.is_none() {
                        warn!("Logo {} could not be decoded, removing its token", slot);
                    }
                    stored.insert(slot, media);
                }

                match stored.get(slot).cloned().flatten() {
                    Some((target, size)) => {
                        let rel_id = format!("rIdLogo{}", Uuid::new_v4().simple());
                        package.add_relationship(&header, &rel_id, IMAGE_RELATIONSHIP, &target)?;
                        while xml.contains(&token) {
                            drawing_id += 1;
                            let drawing = drawing_run(&rel_id, drawing_id, slot, size);
                            xml = replace_token_run(&xml, &token, &drawing);
                        }
                    }
                    None => xml = xml.replace(&token, ""),
                }
            }

            if xml != original {
                debug!("Header logos placed in {}", header);
                package.set_part_str(&header, ensure_root_namespaces(&xml));
            }
        }
        Ok(())
    }

    pub fn inject_content_images(
        &self,
        package: &mut DocxPackage,
        registry: ImageRegistry,
    ) -> Result<(), PackageError> {
        if registry.is_empty() {
            return Ok(());
        }

        let mut document = package.part_str(DOCUMENT_PART)?;
        let mut embedded = 0;

        for image in registry.into_entries() {
            if drawing_span(&document, &image.rel_id).is_none() {
                debug!(
                    "Image {} is not referenced by the document, skipping",
                    describe(&image.source)
                );
                continue;
            }
            let Some((bytes, format)) = self.load_image(&image.source) else {
                warn!("Image {} is unavailable, using a placeholder", describe(&image.source));
                document = replace_drawing(&document, &image.rel_id, |_| {
                    run(UNAVAILABLE_IMAGE, &RunStyle::muted_italic())
                });
                continue;
            };

            let part_name = package.unique_media_name("image", format.extension());
            package.set_part(&part_name, bytes.clone());
            package.ensure_default_content_type(format.extension(), format.mime_type())?;
            let target = part_name.trim_start_matches("word/").to_string();
            package.add_relationship(DOCUMENT_PART, &image.rel_id, IMAGE_RELATIONSHIP, &target)?;

            if !image.explicit_size {
                if let Some(actual) = natural_size(&bytes) {
                    document = correct_extent(&document, &image, actual);
                }
            }
            embedded += 1;
        }

        info!("Embedded {} content image(s)", embedded);
        package.set_part_str(DOCUMENT_PART, ensure_root_namespaces(&document));
        Ok(())
    }

    fn load_image(&self, source: &ImageSource) -> Option<(Vec<u8>, ImageFormat)> {
        match source {
            ImageSource::Embedded(data) => {
                let format = ImageFormat::from_bytes(&data.bytes)
                    .or_else(|| ImageFormat::from_mime(&data.mime))?;
                Some((data.bytes.clone(), format))
            }
            ImageSource::Upload(relative) => {
                let path = resolve_upload_path(&self.uploads_dir, relative)?;
                let bytes = match fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        debug!("Cannot read {}: {}", path.display(), e);
                        return None;
                    }
                };
                let format =
                    ImageFormat::from_bytes(&bytes).or_else(|| ImageFormat::from_path(&path))?;
                Some((bytes, format))
            }
        }
    }
}

fn describe(source: &ImageSource) -> &str {
    match source {
        ImageSource::Upload(path) => path,
        ImageSource::Embedded(_) => "(embedded)",
    }
}

fn store_logo(
    package: &mut DocxPackage,
    slot: &str,
    url: &str,
) -> Result<Option<(String, ImageSize)>, PackageError> {
    let Some(data) = decode_data_url(url) else {
        return Ok(None);
    };
    let Some(format) =
        ImageFormat::from_bytes(&data.bytes).or_else(|| ImageFormat::from_mime(&data.mime))
    else {
        return Ok(None);
    };

    let size = logo_size(&data.bytes);
    let part_name = package.unique_media_name(slot, format.extension());
    package.set_part(&part_name, data.bytes);
    package.ensure_default_content_type(format.extension(), format.mime_type())?;
    Ok(Some((part_name.trim_start_matches("word/").to_string(), size)))
}

/// Fit a logo inside the header slot, keeping its aspect ratio.
fn logo_size(bytes: &[u8]) -> ImageSize {
    let Some((width, height)) = pixel_dimensions(bytes) else {
        return ImageSize {
            cx: LOGO_MAX_WIDTH,
            cy: LOGO_MAX_HEIGHT,
        };
    };
    let natural = ImageSize::from_pixels(width, height);
    let bounded = if natural.cy > LOGO_MAX_HEIGHT {
        natural.with_height(LOGO_MAX_HEIGHT)
    } else {
        natural
    };
    bounded.fit_width(LOGO_MAX_WIDTH)
}

fn natural_size(bytes: &[u8]) -> Option<ImageSize> {
    let (width, height) = pixel_dimensions(bytes)?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(ImageSize::from_pixels(width, height).fit_width(MAX_IMAGE_WIDTH))
}

/// Join a relative upload path onto the uploads root. Each component is
/// sanitized; traversal components reject the path.
pub fn resolve_upload_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut pushed = false;
    for component in relative.split(['/', '\\']) {
        match component {
            "" | "." => continue,
            ".." => return None,
            name => {
                let clean = sanitize_filename::sanitize(name);
                if clean.is_empty() {
                    return None;
                }
                path.push(clean);
                pushed = true;
            }
        }
    }
    pushed.then_some(path)
}

/// Re-insert section descriptors the merge dropped. They go before the
/// landscape marker paragraph, or before the final body descriptor.
pub fn repair_section_breaks(pristine: &str, merged: &str) -> String {
    let mut available: HashMap<&str, usize> = HashMap::new();
    for m in SECTION_RE.find_iter(merged) {
        *available.entry(m.as_str()).or_insert(0) += 1;
    }

    let mut missing = Vec::new();
    for m in SECTION_RE.find_iter(pristine) {
        match available.get_mut(m.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(m.as_str()),
        }
    }
    if missing.is_empty() {
        return merged.to_string();
    }

    let Some(at) = landscape_paragraph_start(merged).or_else(|| final_section_start(merged))
    else {
        warn!("{} section break(s) lost with nowhere to restore them", missing.len());
        return merged.to_string();
    };

    info!("Restoring {} lost section break(s)", missing.len());
    let restored: String = missing
        .iter()
        .map(|descriptor| section_break_paragraph(descriptor))
        .collect();
    let mut out = String::with_capacity(merged.len() + restored.len());
    out.push_str(&merged[..at]);
    out.push_str(&restored);
    out.push_str(&merged[at..]);
    out
}

fn landscape_paragraph_start(xml: &str) -> Option<usize> {
    leaf_paragraphs(xml)
        .into_iter()
        .find(|span| xml[span.clone()].contains(LANDSCAPE_MARK))
        .map(|span| span.start)
}

fn final_section_start(xml: &str) -> Option<usize> {
    let last = SECTION_RE.find_iter(xml).last()?;
    xml[last.end()..]
        .trim_start()
        .starts_with("</w:body>")
        .then_some(last.start())
}

/// Replace the run holding `token`: the token is removed from it and
/// `drawing` follows it, so other text in the run survives.
fn replace_token_run(xml: &str, token: &str, drawing: &str) -> String {
    let Some(at) = xml.find(token) else {
        return xml.to_string();
    };
    let run_start = ["<w:r>", "<w:r "]
        .iter()
        .filter_map(|open| xml[..at].rfind(open))
        .max();
    let run_end = xml[at..].find("</w:r>").map(|end| at + end + "</w:r>".len());

    match (run_start, run_end) {
        (Some(start), Some(end)) => {
            let cleaned = xml[start..end].replacen(token, "", 1);
            format!("{}{}{}{}", &xml[..start], cleaned, drawing, &xml[end..])
        }
        _ => xml.replacen(token, "", 1),
    }
}

/// Byte range of the drawing run embedding `rel_id`.
fn drawing_span(xml: &str, rel_id: &str) -> Option<(usize, usize)> {
    let embed = xml.find(&format!("r:embed=\"{}\"", rel_id))?;
    let start = xml[..embed].rfind(DRAWING_RUN_START)?;
    let end = embed + xml[embed..].find("</w:r>")? + "</w:r>".len();
    Some((start, end))
}

fn replace_drawing(xml: &str, rel_id: &str, f: impl FnOnce(&str) -> String) -> String {
    match drawing_span(xml, rel_id) {
        Some((start, end)) => format!("{}{}{}", &xml[..start], f(&xml[start..end]), &xml[end..]),
        None => xml.to_string(),
    }
}

fn correct_extent(xml: &str, image: &RegisteredImage, actual: ImageSize) -> String {
    let old = format!("cx=\"{}\" cy=\"{}\"", image.size.cx, image.size.cy);
    let new = format!("cx=\"{}\" cy=\"{}\"", actual.cx, actual.cy);
    replace_drawing(xml, &image.rel_id, |drawing| drawing.replace(&old, &new))
}

/// Declare the drawing namespaces on the root element when absent.
pub fn ensure_root_namespaces(xml: &str) -> String {
    let Some(root) = root_element_start(xml) else {
        return xml.to_string();
    };
    let Some(close) = xml[root..].find('>').map(|end| root + end) else {
        return xml.to_string();
    };
    let insert_at = if xml[..close].ends_with('/') { close - 1 } else { close };
    let tag = &xml[root..insert_at];

    let missing: String = DRAWING_NAMESPACES
        .iter()
        .filter(|(prefix, _)| !tag.contains(&format!("{}=", prefix)))
        .map(|(prefix, uri)| format!(" {}=\"{}\"", prefix, uri))
        .collect();
    if missing.is_empty() {
        return xml.to_string();
    }
    format!("{}{}{}", &xml[..insert_at], missing, &xml[insert_at..])
}

fn root_element_start(xml: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = xml[from..].find('<') {
        let at = from + offset;
        match xml[at + 1..].chars().next() {
            Some('?') | Some('!') => from = at + 1,
            Some(_) => return Some(at),
            None => return None,
        }
    }
    None
}
