use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

pub mod config;
pub mod export;

pub use crate::config::ExportConfig;
pub use crate::export::handlers::ExportState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(crate::export::handlers::export_plan),
    components(schemas(ErrorResponse)),
    tags(
        (name = "Export Service", description = "Work-plan document export.")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::not_found("Resource not found"))
}

/// Register every route; shared by the server and the HTTP tests.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(export::handlers::config))
        .route("/api-doc/openapi.json", web::get().to(openapi_json))
        .default_service(web::route().to(not_found));
}

fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers(vec![header::CONTENT_DISPOSITION])
        .max_age(3600)
}

pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ExportConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let generator = match export::WorkPlanGenerator::from_path(
        &config.template_path,
        config.uploads_dir.clone(),
    ) {
        Ok(generator) => generator,
        Err(e) => {
            log::error!(
                "Failed to load the work-plan template from {}. Please check TEMPLATE_PATH in .env. Error: {}",
                config.template_path.display(),
                e
            );
            std::process::exit(1);
        }
    };
    let state = web::Data::new(ExportState::new(generator));

    log::info!(
        "Starting server at http://{}:{} (uploads: {})",
        config.host,
        config.port,
        config.uploads_dir.display()
    );

    let allowed_origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(cors(&allowed_origins))
            .app_data(state.clone())
            .configure(configure_app)
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
