//! qrcard-server library
//!
//! HTTP service that turns contact details into QR codes and records
//! scanned QR payloads in the configured record store.

use std::path::PathBuf;

use axum::Router;
use qrcard_common::config::ServiceConfig;
use qrcard_common::PayloadFormat;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod export;
pub mod qr;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use crate::qr::QrEmitter;
use crate::store::SharedStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Record store handle, constructed once at startup
    pub store: SharedStore,
    /// QR renderer with the configured parameters
    pub emitter: QrEmitter,
    /// Encoding used for generated payloads
    pub payload_format: PayloadFormat,
    /// Directory for saved QR images
    pub static_dir: PathBuf,
}

impl AppState {
    /// Create application state from a store and the resolved configuration
    pub fn new(store: SharedStore, config: &ServiceConfig) -> Self {
        Self {
            store,
            emitter: QrEmitter::new(config.qr.clone()),
            payload_format: config.payload_format,
            static_dir: config.static_dir.clone(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .merge(api::ui_routes())
        .merge(api::generate_routes())
        .merge(api::scan_routes())
        .merge(api::health_routes())
        .nest_service("/static", static_files)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
