use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, UpdatePathRequest};
use crate::events::QueueSnapshot;
use crate::models::{Download, DownloadRequest};
use crate::state::AppState;

pub async fn list_downloads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Download>>>, ApiError> {
    let downloads = state.engine.list().await?;
    Ok(Json(ApiResponse::success(downloads)))
}

pub async fn enqueue_download(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<ApiResponse<Download>>, ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("title must not be empty"));
    }
    if request.link.url.trim().is_empty() {
        return Err(ApiError::validation("link URL must not be empty"));
    }

    let download = state.engine.enqueue(request).await?;
    Ok(Json(ApiResponse::success(download)))
}

pub async fn get_queue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<QueueSnapshot>>, ApiError> {
    let snapshot = state.engine.snapshot().await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Download>>, ApiError> {
    let download = require_download(&state, &id).await?;
    Ok(Json(ApiResponse::success(download)))
}

async fn require_download(state: &AppState, id: &str) -> Result<Download, ApiError> {
    state
        .engine
        .get(id)
        .await?
        .ok_or_else(|| ApiError::download_not_found(id))
}

pub async fn pause_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    require_download(&state, &id).await?;
    state.engine.pause(&id).await?;
    Ok(Json(ApiResponse::success("Pause requested".to_string())))
}

pub async fn resume_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    require_download(&state, &id).await?;
    state.engine.resume(&id).await?;
    Ok(Json(ApiResponse::success("Resume requested".to_string())))
}

pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    require_download(&state, &id).await?;
    state.engine.cancel(&id).await?;
    Ok(Json(ApiResponse::success("Cancel requested".to_string())))
}

pub async fn delete_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    require_download(&state, &id).await?;
    state.engine.delete(&id).await?;
    Ok(Json(ApiResponse::success("Download deleted".to_string())))
}

pub async fn convert_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    require_download(&state, &id).await?;
    state.engine.convert(&id).await?;
    Ok(Json(ApiResponse::success("Conversion started".to_string())))
}

pub async fn update_download_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePathRequest>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    if request.path.trim().is_empty() {
        return Err(ApiError::validation("path must not be empty"));
    }

    require_download(&state, &id).await?;
    state.engine.update_file_path(&id, &request.path).await?;
    Ok(Json(ApiResponse::success("File path updated".to_string())))
}
