#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the crime dashboard.
//!
//! Serves the three dashboard tables as JSON for an external chart
//! renderer. Each request carries its complete filter and is answered by a
//! fresh set of aggregate queries; the server keeps no per-client state.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::error::{InternalError, QueryPayloadError};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, middleware, web};
use crime_dashboard_database::{CrimeStore, db};
use crime_dashboard_server_models::ApiError;

/// Default bind address when `BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default port when `PORT` is unset or invalid.
pub const DEFAULT_PORT: u16 = 8080;

/// Shared application state.
pub struct AppState {
    /// Incident store.
    pub store: Arc<CrimeStore>,
}

/// Rejects unparseable query strings with the same JSON error body as
/// every other failure.
fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ApiError {
        error: format!("Invalid query string: {err}"),
    });
    InternalError::from_response(err, response).into()
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::QueryConfig::default().error_handler(query_error))
            .route("/health", web::get().to(handlers::health))
            .route("/options", web::get().to(handlers::options))
            .route("/offenses", web::get().to(handlers::offenses))
            .route("/top-categories", web::get().to(handlers::top_categories))
            .route("/heatmap", web::get().to(handlers::heatmap))
            .route("/dashboard", web::get().to(handlers::dashboard)),
    );
}

/// Reads `BIND_ADDR` and `PORT` from the environment.
#[must_use]
pub fn bind_from_env() -> (String, u16) {
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    (bind_addr, port)
}

/// Starts the dashboard API server.
///
/// Connects to the store named by `DATABASE_URL` and serves until
/// shutdown. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`) and initializes logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store connection fails or
/// the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    log::info!("Connecting to database...");
    let store = db::connect_from_env()
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {e}")))?;

    serve(Arc::new(store), bind_from_env()).await
}

/// Serves the API over an already-open store.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn serve(
    store: Arc<CrimeStore>,
    (bind_addr, port): (String, u16),
) -> std::io::Result<()> {
    let state = web::Data::new(AppState { store });

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
