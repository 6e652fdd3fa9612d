//! Generators - business logic for assembling `.docx` documents from a
//! packaged template.
//!
//! - `rich_text` and `sections` turn plan records into WordprocessingML
//! - `finance` holds the pure cost computations behind the financial tables
//! - `engine` drives a template through surgery, merging and post-processing
//! - `work_plan` wires a [`PlanData`](crate::export::model::PlanData) into the engine

pub mod common;
pub mod engine;
pub mod finance;
pub mod rich_text;
pub mod sections;
pub mod traits;
pub mod work_plan;

pub use engine::{DocxRenderEngine, RenderJob};
pub use traits::Generator;
pub use work_plan::WorkPlanGenerator;

use thiserror::Error;

use crate::export::docx::{MergeError, PackageError};

/// Errors that can occur during document generation.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to load template: {0}")]
    TemplateIo(#[source] std::io::Error),
    #[error("invalid template package: {0}")]
    Package(#[from] PackageError),
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
}

/// Result of a successful document generation.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub filename: String,
    pub docx: Vec<u8>,
    /// Long-form generation date, e.g. "7 de março de 2025".
    pub generated_at: String,
}
