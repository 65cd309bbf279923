use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod content;
pub mod downloads;
mod error;
pub mod events;
mod types;

pub use error::ApiError;
pub use types::*;

#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .route("/home", get(content::get_home))
        .route("/search", get(content::search))
        .route("/content/{media_type}/{id}", get(content::get_details))
        .route("/content/{media_type}/{id}/links", get(content::get_links))
        .route("/providers", get(content::list_providers))
        .route("/providers/active", put(content::set_active_provider))
        .route("/downloads", get(downloads::list_downloads))
        .route("/downloads", post(downloads::enqueue_download))
        .route("/downloads/queue", get(downloads::get_queue))
        .route("/downloads/{id}", get(downloads::get_download))
        .route("/downloads/{id}", delete(downloads::delete_download))
        .route("/downloads/{id}/pause", post(downloads::pause_download))
        .route("/downloads/{id}/resume", post(downloads::resume_download))
        .route("/downloads/{id}/cancel", post(downloads::cancel_download))
        .route("/downloads/{id}/convert", post(downloads::convert_download))
        .route("/downloads/{id}/path", put(downloads::update_download_path))
        .merge(events::router())
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
