//! Review session API endpoints.
//!
//! Handlers for the review actions: submit a storage location, select an
//! asset, navigate pages, fetch the current raster and overlays, and manage
//! field highlighting.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::asset::Asset;
use crate::error::ServiceError;
use crate::raster::RASTER_MIME_TYPE;
use crate::review::{PageDirection, ReviewView, SessionSnapshot};

use super::AppState;

/// Request to open a review session against a storage location
#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub root_path: String,
    #[serde(default)]
    pub folder_path: String,
}

/// Request to select an asset
#[derive(Deserialize)]
pub struct SelectAssetRequest {
    pub asset_id: String,
}

/// Request to navigate pages
#[derive(Deserialize)]
pub struct NavigatePageRequest {
    pub direction: PageDirection,
}

/// Request to highlight a field. `navigate` marks a click (which may jump
/// to the field's page) as opposed to a hover.
#[derive(Deserialize)]
pub struct HighlightRequest {
    pub field: String,
    #[serde(default)]
    pub navigate: bool,
}

/// Open a session: list the assets under the submitted location
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    let snapshot = state
        .service
        .submit_location(&request.root_path, &request.folder_path)
        .await?;
    Ok(Json(snapshot))
}

pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    Ok(Json(state.service.snapshot(&session_id).await?))
}

pub async fn list_assets_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Asset>>, ServiceError> {
    Ok(Json(state.service.assets(&session_id).await?))
}

pub async fn select_asset_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SelectAssetRequest>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    let snapshot = state
        .service
        .select_asset(&session_id, &request.asset_id)
        .await?;
    Ok(Json(snapshot))
}

pub async fn navigate_page_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<NavigatePageRequest>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    let snapshot = state
        .service
        .navigate_page(&session_id, request.direction)
        .await?;
    Ok(Json(snapshot))
}

/// Serve the current page's raster as image bytes
pub async fn get_raster_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Response, ServiceError> {
    let raster = state.service.raster(&session_id).await?;
    Ok(([(header::CONTENT_TYPE, RASTER_MIME_TYPE)], raster.data).into_response())
}

/// Serve the assembled view: raster data URI, overlays, and predictions
pub async fn get_view_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ReviewView>, ServiceError> {
    Ok(Json(state.service.review_view(&session_id).await?))
}

pub async fn set_highlight_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<HighlightRequest>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    let snapshot = state
        .service
        .set_highlight(&session_id, &request.field, request.navigate)
        .await?;
    Ok(Json(snapshot))
}

pub async fn clear_highlight_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    Ok(Json(state.service.clear_highlight(&session_id).await?))
}
