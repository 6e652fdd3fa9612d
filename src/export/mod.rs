//! Work-plan document export.
//!
//! `model` holds the posted plan data, `generators` turns it into markup and
//! drives rendering, `docx` edits the template package and `handlers`
//! exposes the export endpoint.

pub mod docx;
pub mod generators;
pub mod handlers;
pub mod model;

pub use generators::{ExportError, GeneratedDocument, Generator, WorkPlanGenerator};
pub use handlers::ExportState;
pub use model::PlanData;
