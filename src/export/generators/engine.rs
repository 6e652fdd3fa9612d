//! `.docx` rendering engine.
//!
//! Handles the low-level details of opening the template package, running
//! template surgery, merging the marker map, post-processing and writing the
//! output package.

use std::path::PathBuf;

use log::{debug, info};

use super::common::{format_long_date, sanitize_filename};
use super::{ExportError, GeneratedDocument};
use crate::export::docx::package::DOCUMENT_PART;
use crate::export::docx::{
    restore_braces, DocumentBody, DocxPackage, ImageRegistry, Logos, MergeData, PostProcessor,
    TemplateMerger, TemplateSurgeon,
};

const OUTPUT_PREFIX: &str = "plano-de-trabalho";

/// Everything one render call needs besides the template.
pub struct RenderJob<'a> {
    pub surgeon: &'a TemplateSurgeon,
    pub data: &'a MergeData,
    pub registry: ImageRegistry,
    pub logos: &'a Logos,
}

/// Engine for rendering a template package into a finished document.
pub struct DocxRenderEngine {
    uploads_dir: PathBuf,
}

impl DocxRenderEngine {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Render `template` with the job's merge data.
    ///
    /// # Arguments
    /// * `template` - The packaged `.docx` template bytes.
    /// * `job` - Surgery configuration, merge map, image registry and logos.
    /// * `output_name_base` - The base name for the output file (e.g., the plan name).
    pub fn render(
        &self,
        template: &[u8],
        job: RenderJob<'_>,
        output_name_base: &str,
    ) -> Result<GeneratedDocument, ExportError> {
        let generated_at = format_long_date();
        let docx = self.render_package(template, job)?;

        let filename = format!(
            "{}-{}.docx",
            OUTPUT_PREFIX,
            sanitize_filename(output_name_base, "plano")
        );
        info!("Rendered {} ({} bytes)", filename, docx.len());

        Ok(GeneratedDocument {
            filename,
            docx,
            generated_at,
        })
    }

    /// Run the whole pipeline and return the package bytes.
    pub fn render_package(
        &self,
        template: &[u8],
        job: RenderJob<'_>,
    ) -> Result<Vec<u8>, ExportError> {
        let mut package = DocxPackage::from_bytes(template)?;
        let pristine = package.part_str(DOCUMENT_PART)?;

        let mut body = DocumentBody::parse(&pristine)?;
        job.surgeon.prepare_document(&mut body);
        let prepared = body.serialize();
        debug!("Template surgery done ({} blocks)", body.blocks().len());

        let merger = TemplateMerger::new(job.data)?;
        package.set_part_str(DOCUMENT_PART, merger.merge_part(&prepared));

        let side_parts = package.header_footer_parts();
        for name in &side_parts {
            let xml = package.part_str(name)?;
            let merged = merger.merge_part(&job.surgeon.prepare_part(&xml));
            package.set_part_str(name, merged);
        }
        debug!(
            "Merged {} text and {} markup entries",
            job.data.text.len(),
            job.data.raw.len()
        );

        PostProcessor::new(self.uploads_dir.clone()).run(
            &mut package,
            &pristine,
            job.registry,
            job.logos,
        )?;

        for name in std::iter::once(DOCUMENT_PART.to_string()).chain(side_parts) {
            let xml = package.part_str(&name)?;
            package.set_part_str(&name, restore_braces(&xml));
        }

        Ok(package.to_bytes()?)
    }
}
