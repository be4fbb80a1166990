use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer,
};

use crate::handlers::{analyze_edf, handle_404, health_check};
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let config = &state.config;

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let upload_limit = config.max_upload_size.saturating_add(MULTIPART_OVERHEAD);

    let upload_routes = Router::new()
        .route("/analyze-edf/", post(analyze_edf))
        .route("/analyze-edf", post(analyze_edf))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    Router::new()
        .route("/health", get(health_check))
        .merge(upload_routes)
        .nest_service("/static", ServeDir::new(&config.static_directory))
        .fallback(handle_404)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state.clone())
}
