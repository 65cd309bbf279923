use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, ProviderList, SetProviderRequest};
use crate::models::{Carousel, Content, ExtractedLink, MediaType, SearchPage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub q: String,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LinksRequest {
    pub season: Option<String>,
    pub episode: Option<String>,
}

fn parse_media_type(raw: &str) -> Result<MediaType, ApiError> {
    raw.parse::<MediaType>().map_err(ApiError::ValidationError)
}

pub async fn get_home(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Carousel>>>, ApiError> {
    let provider = state.providers.active().await;
    let carousels = provider.fetch_home().await?;
    Ok(Json(ApiResponse::success(carousels)))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(request): Query<SearchRequest>,
) -> Result<Json<ApiResponse<SearchPage>>, ApiError> {
    let query = request.q.trim();
    if query.is_empty() {
        return Err(ApiError::validation("query must not be empty"));
    }

    let provider = state.providers.active().await;
    let page = provider.search(query, request.page.unwrap_or(1)).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_details(
    State(state): State<Arc<AppState>>,
    Path((media_type, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Content>>, ApiError> {
    let media_type = parse_media_type(&media_type)?;
    let provider = state.providers.active().await;
    let content = provider.fetch_details(&id, media_type).await?;
    Ok(Json(ApiResponse::success(content)))
}

pub async fn get_links(
    State(state): State<Arc<AppState>>,
    Path((media_type, id)): Path<(String, String)>,
    Query(request): Query<LinksRequest>,
) -> Result<Json<ApiResponse<Vec<ExtractedLink>>>, ApiError> {
    let media_type = parse_media_type(&media_type)?;
    let links = state
        .resolver
        .resolve(
            &id,
            media_type,
            request.season.as_deref(),
            request.episode.as_deref(),
        )
        .await?;
    Ok(Json(ApiResponse::success(links)))
}

pub async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ProviderList>>, ApiError> {
    let list = ProviderList {
        active: state.providers.active_name().await.to_string(),
        available: state
            .providers
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    Ok(Json(ApiResponse::success(list)))
}

pub async fn set_active_provider(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetProviderRequest>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.providers.set_active(&request.name).await?;
    let _ = state
        .event_bus
        .send(crate::events::NotificationEvent::ProviderChanged {
            name: request.name.clone(),
        });
    Ok(Json(ApiResponse::success(format!(
        "Active provider set to {}",
        request.name
    ))))
}
