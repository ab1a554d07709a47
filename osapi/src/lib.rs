//! # osapi: HTTP API for S3-compatible object storage
//!
//! `osapi` puts a small HTTP API in front of an S3-compatible object store (AWS S3, MinIO and the
//! like). Clients can create buckets, request presigned URLs to upload directly to the store,
//! check whether an object exists, and upload batches of files through the service itself.
//!
//! ## Overview
//!
//! Every endpoint maps onto one object store call, except batch upload. An upload request carries
//! any number of files; the [`upload::BatchUploader`] writes them concurrently under a
//! configurable ceiling, waits for all of them, and reports an outcome per file in the order the
//! files were sent. One failing file never affects the others, and files that were stored stay
//! stored: there is no rollback.
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum). Handlers in [`api`] share
//! an [`AppState`] holding the configuration, the object store and the batch uploader.
//!
//! The object store sits behind the [`storage::ObjectStore`] trait, built once at startup from
//! configuration: [`storage::S3ObjectStore`] talks to any S3-compatible service through the AWS
//! SDK, and [`storage::InMemoryObjectStore`] keeps everything in process for development and
//! tests.
//!
//! Errors are converted into HTTP responses by [`errors::Error`], always as a JSON
//! `{"message": ...}` body.
//!
//! ## Configuration
//!
//! See [`config`]: a YAML file plus `OSAPI_`-prefixed environment variables, and the usual
//! `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_URL_ENDPOINT` variables for the store.
//!
//! ## Getting Started
//!
//! ```no_run
//! use osapi::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = Application::new(config)?;
//!     app.serve(async { tokio::signal::ctrl_c().await.unwrap() }).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod storage;
pub mod telemetry;
pub mod upload;

#[cfg(test)]
mod test_utils;

use crate::{
    config::CorsOrigin,
    openapi::ApiDoc,
    storage::{ObjectStore, create_object_store},
    upload::BatchUploader,
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .uploader(uploader)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub uploader: BatchUploader,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let origins = cors_config
            .allowed_origins
            .iter()
            .map(|origin| origin.header_value().parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    // Mirroring is the credential-compatible way of allowing any method and header
    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(vec![header::LOCATION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// `/upload/` gets its own body limit (`upload.max_request_size`); the other endpoints keep
/// axum's default.
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = match state.config.upload.max_request_size {
        0 => DefaultBodyLimit::disable(),
        limit => DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX)),
    };
    let upload_router = Router::new().route("/upload/", post(api::handlers::uploads::upload_files).layer(body_limit));

    let router = Router::new()
        .route("/", get(api::handlers::root::redirect_to_docs))
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/create-bucket/", post(api::handlers::buckets::create_bucket))
        .route("/generate-presigned-url/", post(api::handlers::objects::generate_presigned_url))
        .route("/check-file-exist/", post(api::handlers::objects::check_file_exists))
        .merge(upload_router)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let router = router.layer(create_cors_layer(&state.config)?);

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The HTTP service: object store, uploader and router, ready to serve.
///
/// 1. **Create**: [`Application::new`] builds the configured object store and the router
/// 2. **Serve**: [`Application::serve`] binds to the configured address and handles requests
///    until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application with the object store selected in configuration
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting object storage API with configuration: {:#?}", config);
        let store = create_object_store(&config.storage)?;
        Self::new_with_store(config, store)
    }

    /// Create a new application on top of an existing object store
    pub fn new_with_store(config: Config, store: Arc<dyn ObjectStore>) -> anyhow::Result<Self> {
        let uploader = BatchUploader::new(store.clone(), &config.upload);
        let state = AppState::builder()
            .config(config.clone())
            .store(store)
            .uploader(uploader)
            .build();

        let router = build_router(state)?;
        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Object storage API listening on http://{}, docs at http://localhost:{}/docs",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
