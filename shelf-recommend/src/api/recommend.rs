//! Recommendation endpoints
//!
//! - `POST /recommend`: title flow, JSON body
//! - `POST /recommend/image`: image flow, raw image body with query parameters

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Query, State},
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::engine::{ImageRecommendation, TitleRecommendation};
use crate::error::{ApiError, ApiResult};
use crate::types::RecommendRequest;
use crate::AppState;

/// Upper bound on an uploaded shelf photo
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// POST /recommend request body
#[derive(Debug, Deserialize)]
pub struct RecommendBody {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default = "default_title_count")]
    pub n: usize,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_hardness")]
    pub hardness: String,
}

/// POST /recommend/image query parameters
#[derive(Debug, Deserialize)]
pub struct ImageParams {
    #[serde(default = "default_image_count")]
    pub n: usize,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_hardness")]
    pub hardness: String,
}

fn default_title_count() -> usize {
    5
}

fn default_image_count() -> usize {
    8
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_hardness() -> String {
    "auto".to_string()
}

/// POST /recommend
pub async fn recommend_titles(
    State(state): State<AppState>,
    payload: Result<Json<RecommendBody>, JsonRejection>,
) -> ApiResult<Json<TitleRecommendation>> {
    let Json(body) = payload?;
    if body.titles.iter().all(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("titles required".to_string()));
    }
    info!(titles = body.titles.len(), n = body.n, "Title recommendation requested");

    let request = RecommendRequest {
        n: body.n,
        language: body.language,
        hardness: body.hardness,
    };
    let result = state.engine.recommend_from_titles(&body.titles, &request).await?;
    Ok(Json(result))
}

/// POST /recommend/image
pub async fn recommend_image(
    State(state): State<AppState>,
    Query(params): Query<ImageParams>,
    headers: HeaderMap,
    image: Bytes,
) -> ApiResult<Json<ImageRecommendation>> {
    if image.is_empty() {
        return Err(ApiError::BadRequest("image required".to_string()));
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or("image/jpeg");
    info!(bytes = image.len(), mime, n = params.n, "Image recommendation requested");

    let request = RecommendRequest {
        n: params.n,
        language: params.language,
        hardness: params.hardness,
    };
    let result = state.engine.recommend_from_image(&image, mime, &request).await?;
    Ok(Json(result))
}

/// Build recommendation routes
pub fn recommend_routes() -> Router<AppState> {
    Router::new().route("/recommend", post(recommend_titles)).route(
        "/recommend/image",
        post(recommend_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
    )
}
