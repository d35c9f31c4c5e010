use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::{convert, handlers, middleware::metrics_middleware};
use crate::metrics::metrics_handler;
use crate::state::AppState;

/// Default location of the built web front end.
const DEFAULT_WEB_DIR: &str = "web/dist";

pub fn create_router(state: Arc<AppState>) -> Router {
    // Web front-end static files path (configurable via env)
    let web_dir = std::env::var("HEICS_WEB_DIR").unwrap_or_else(|_| DEFAULT_WEB_DIR.to_string());
    let upload_limit = state.config().server.max_upload_bytes;

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Format catalog
        .route("/formats", get(handlers::list_formats))
        // Conversion
        .route("/convert", post(convert::convert))
        .route("/convert/upload", post(convert::convert_upload))
        .layer(DefaultBodyLimit::max(upload_limit))
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    // Serve web front end with SPA fallback
    let index_path = format!("{}/index.html", web_dir);
    let serve_dir = ServeDir::new(&web_dir).fallback(ServeFile::new(&index_path));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(metrics_handler))
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
}
