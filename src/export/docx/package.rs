//! Zip container of a `.docx` package and its manifests.
//!
//! Parts are kept as ordered `(name, bytes)` entries so a rewritten package
//! lists its parts in the template's order. Media parts are stored, every
//! other part is deflated.

use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};

use super::PackageError;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const IMAGE_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const EMPTY_RELATIONSHIPS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"></Relationships>";

/// An opened `.docx` package.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push((name, data));
        }
        if !entries.iter().any(|(name, _)| name == DOCUMENT_PART) {
            return Err(PackageError::MissingPart(DOCUMENT_PART.to_string()));
        }
        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);

        for (name, data) in &self.entries {
            let options = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// A part decoded as UTF-8 text.
    pub fn part_str(&self, name: &str) -> Result<String, PackageError> {
        let data = self
            .part(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))?;
        String::from_utf8(data.to_vec()).map_err(|_| PackageError::Encoding(name.to_string()))
    }

    /// Replace a part in place, or append it when new.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    pub fn set_part_str(&mut self, name: &str, xml: String) {
        self.set_part(name, xml.into_bytes());
    }

    /// Header and footer parts, in package order.
    pub fn header_footer_parts(&self) -> Vec<String> {
        self.part_names()
            .filter(|name| is_header_or_footer(name))
            .map(str::to_string)
            .collect()
    }

    pub fn header_parts(&self) -> Vec<String> {
        self.part_names()
            .filter(|name| name.starts_with("word/header") && name.ends_with(".xml"))
            .map(str::to_string)
            .collect()
    }

    /// A media part name not used yet, e.g. `word/media/image-3.png`.
    pub fn unique_media_name(&self, stem: &str, extension: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("word/media/{}-{}.{}", stem, n, extension);
            if !self.has_part(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Add a relationship from `source_part`, creating its `.rels` part when
    /// missing. An existing relationship with the same id is kept.
    pub fn add_relationship(
        &mut self,
        source_part: &str,
        id: &str,
        rel_type: &str,
        target: &str,
    ) -> Result<(), PackageError> {
        let rels_name = rels_part_for(source_part);
        let current = match self.part(&rels_name) {
            Some(_) => self.part_str(&rels_name)?,
            None => EMPTY_RELATIONSHIPS.to_string(),
        };
        if let Some(updated) = add_relationship_xml(&current, id, rel_type, target)? {
            self.set_part_str(&rels_name, updated);
        } else if self.part(&rels_name).is_none() {
            self.set_part_str(&rels_name, current);
        }
        Ok(())
    }

    /// Register a default content type for a file extension if absent.
    pub fn ensure_default_content_type(
        &mut self,
        extension: &str,
        content_type: &str,
    ) -> Result<(), PackageError> {
        let current = self.part_str(CONTENT_TYPES_PART)?;
        if let Some(updated) = add_default_content_type_xml(&current, extension, content_type)? {
            self.set_part_str(CONTENT_TYPES_PART, updated);
        }
        Ok(())
    }
}

pub fn is_header_or_footer(name: &str) -> bool {
    (name.starts_with("word/header") || name.starts_with("word/footer")) && name.ends_with(".xml")
}

/// `word/header1.xml` -> `word/_rels/header1.xml.rels`.
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

fn attribute_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, PackageError> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if local_name(attr.key.as_ref()) == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Append a child element before the closing root tag unless `exists`
/// reports a matching child. Returns `None` when nothing changed.
fn append_child_xml(
    xml: &str,
    root: &[u8],
    child: &[u8],
    exists: impl Fn(&BytesStart<'_>) -> Result<bool, PackageError>,
    build: impl Fn() -> BytesStart<'static>,
) -> Result<Option<String>, PackageError> {
    let mut reader = XmlReader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(false);
    let mut writer = XmlWriter::new(Vec::with_capacity(xml.len() + 256));
    let mut buf = Vec::new();
    let mut found = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == child && !found =>
            {
                found = exists(e)?;
                writer.write_event(event.borrow())?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == root => {
                if !found {
                    writer.write_event(Event::Empty(build()))?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == root => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Empty(build()))?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if found {
        return Ok(None);
    }
    String::from_utf8(writer.into_inner())
        .map(Some)
        .map_err(|_| PackageError::Encoding("manifest".to_string()))
}

pub fn add_relationship_xml(
    xml: &str,
    id: &str,
    rel_type: &str,
    target: &str,
) -> Result<Option<String>, PackageError> {
    append_child_xml(
        xml,
        b"Relationships",
        b"Relationship",
        |e| Ok(attribute_value(e, b"Id")?.as_deref() == Some(id)),
        || {
            let mut el = BytesStart::new("Relationship");
            el.push_attribute(("Id", id));
            el.push_attribute(("Type", rel_type));
            el.push_attribute(("Target", target));
            el.into_owned()
        },
    )
}

pub fn add_default_content_type_xml(
    xml: &str,
    extension: &str,
    content_type: &str,
) -> Result<Option<String>, PackageError> {
    append_child_xml(
        xml,
        b"Types",
        b"Default",
        |e| {
            Ok(attribute_value(e, b"Extension")?
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false))
        },
        || {
            let mut el = BytesStart::new("Default");
            el.push_attribute(("Extension", extension));
            el.push_attribute(("ContentType", content_type));
            el.into_owned()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &str = "<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"xml\" ContentType=\"application/xml\"/></Types>";

    #[test]
    fn test_rels_part_for() {
        assert_eq!(rels_part_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_part_for("word/header2.xml"), "word/_rels/header2.xml.rels");
    }

    #[test]
    fn test_content_type_added_once() {
        let updated = add_default_content_type_xml(TYPES, "png", "image/png")
            .unwrap()
            .unwrap();
        assert!(updated.contains("<Default Extension=\"png\" ContentType=\"image/png\"/></Types>"));
        assert!(add_default_content_type_xml(&updated, "PNG", "image/png")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_relationship_merges_with_existing() {
        let rels = add_relationship_xml(EMPTY_RELATIONSHIPS, "rId1", IMAGE_RELATIONSHIP, "media/a.png")
            .unwrap()
            .unwrap();
        let rels = add_relationship_xml(&rels, "rId2", IMAGE_RELATIONSHIP, "media/b.png")
            .unwrap()
            .unwrap();
        assert!(rels.contains("Id=\"rId1\""));
        assert!(rels.contains("Id=\"rId2\""));
        assert!(add_relationship_xml(&rels, "rId1", IMAGE_RELATIONSHIP, "media/a.png")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_package_round_trip_keeps_order() {
        let mut package = DocxPackage::default();
        package.set_part_str(CONTENT_TYPES_PART, TYPES.to_string());
        package.set_part_str(DOCUMENT_PART, "<w:document/>".to_string());
        package.set_part("word/media/logo-1.png", vec![1, 2, 3]);

        let bytes = package.to_bytes().unwrap();
        let reopened = DocxPackage::from_bytes(&bytes).unwrap();
        let names: Vec<&str> = reopened.part_names().collect();
        assert_eq!(names, vec![CONTENT_TYPES_PART, DOCUMENT_PART, "word/media/logo-1.png"]);
        assert_eq!(reopened.part("word/media/logo-1.png"), Some(&[1u8, 2, 3][..]));
        assert_eq!(reopened.unique_media_name("logo", "png"), "word/media/logo-2.png");
    }

    #[test]
    fn test_missing_document_is_rejected() {
        let mut package = DocxPackage::default();
        package.set_part_str(CONTENT_TYPES_PART, TYPES.to_string());
        let bytes = package.to_bytes().unwrap();
        assert!(matches!(
            DocxPackage::from_bytes(&bytes),
            Err(PackageError::MissingPart(_))
        ));
    }
}
