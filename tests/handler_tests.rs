mod common;

use actix_web::{http::header, test, web, App};
use common::*;

use workplan_export::export::handlers::DOCX_CONTENT_TYPE;
use workplan_export::export::WorkPlanGenerator;
use workplan_export::{configure_app, ErrorResponse, ExportState};

fn state(template: Vec<u8>) -> web::Data<ExportState> {
    web::Data::new(ExportState::new(WorkPlanGenerator::from_bytes(
        template, "uploads",
    )))
}

fn sample_template() -> Vec<u8> {
    build_docx(&document_xml(&sample_template_body()), None)
}

#[actix_web::test]
async fn test_export_returns_docx_attachment() {
    let app = test::init_service(
        App::new()
            .app_data(state(sample_template()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/plans/export")
        .set_json(sample_plan_json())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
    assert_eq!(content_type.to_str().unwrap(), DOCX_CONTENT_TYPE);
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        disposition,
        "attachment; filename=\"plano-de-trabalho-plano-sensores-2025.docx\""
    );

    let body = test::read_body(resp).await;
    let xml = read_part(&body, "word/document.xml");
    assert!(xml.contains("Acme Inovação Ltda"));
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(state(sample_template()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/plans/export")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{ malformed json ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    let error: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(error.error, "BadRequest");
}

#[actix_web::test]
async fn test_broken_template_is_internal_error() {
    let app = test::init_service(
        App::new()
            .app_data(state(b"not a zip".to_vec()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/plans/export")
        .set_json(sample_plan_json())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 500);

    let error: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(error.error, "InternalServerError");
    assert!(!error.timestamp.is_empty());
}

#[actix_web::test]
async fn test_openapi_document_lists_export() {
    let app = test::init_service(
        App::new()
            .app_data(state(sample_template()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api-doc/openapi.json")
        .to_request();
    let doc: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(doc["paths"]["/api/plans/export"]["post"].is_object());
}

#[actix_web::test]
async fn test_unknown_route_is_not_found() {
    let app = test::init_service(
        App::new()
            .app_data(state(sample_template()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/postings").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[::core::prelude::v1::test]
fn test_error_response_struct() {
    let error_response = ErrorResponse::new("TestError", "Test message");
    assert_eq!(error_response.error, "TestError");
    assert_eq!(error_response.message, "Test message");
    assert!(!error_response.timestamp.is_empty());
}
