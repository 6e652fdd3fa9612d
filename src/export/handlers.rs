//! HTTP handlers for the export endpoint.
//!
//! Rendering is CPU-bound and synchronous, so each request runs on the
//! blocking thread pool.

use actix_web::error::InternalError;
use actix_web::{http::header, web, HttpResponse, Responder};
use log::{error, info};

use crate::export::generators::{Generator, WorkPlanGenerator};
use crate::export::model::PlanData;
use crate::ErrorResponse;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Plans carry inline logos and images as data URLs.
const MAX_PLAN_BYTES: usize = 32 * 1024 * 1024;

/// Export state shared across workers.
pub struct ExportState {
    pub generator: WorkPlanGenerator,
}

impl ExportState {
    pub fn new(generator: WorkPlanGenerator) -> Self {
        Self { generator }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Export Service",
    post,
    path = "/plans/export",
    request_body(
        content = serde_json::Value,
        description = "Work-plan data (camelCase JSON)",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Generated work-plan document", content_type = "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        (status = 400, description = "Malformed plan data", body = ErrorResponse),
        (status = 500, description = "Export failed", body = ErrorResponse)
    )
)]
pub async fn export_plan(
    state: web::Data<ExportState>,
    body: web::Json<PlanData>,
) -> impl Responder {
    let plan = body.into_inner();
    info!("Received export request for '{}'", plan.plan_name);

    let result = web::block(move || state.generator.generate(&plan)).await;

    match result {
        Ok(Ok(document)) => HttpResponse::Ok()
            .content_type(DOCX_CONTENT_TYPE)
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.filename),
            ))
            .body(document.docx),
        Ok(Err(e)) => {
            error!("Export failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
        Err(e) => {
            error!("Export task did not complete: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Export task did not complete"))
        }
    }
}

/// JSON extractor settings: a larger body limit and `ErrorResponse` bodies
/// for undecodable input.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_PLAN_BYTES)
        .error_handler(|err, _req| {
            let message = err.to_string();
            InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message)),
            )
            .into()
        })
}

/// Configure export routes.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::resource("/plans/export").route(web::post().to(export_plan)));
}
