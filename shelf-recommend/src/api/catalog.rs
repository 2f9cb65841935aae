//! Catalog and list endpoints
//!
//! - `GET /lookup?isbn=`: search both backends, store matches, add them to the library
//! - `POST /save`: store items and attach them to one list
//! - `GET /library`, `GET /recommended`, `DELETE /recommended/:id`
//! - `POST /library/:book_id/toggle`, `POST /recommended/:book_id/toggle`

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::db::{ListEntry, ToggleStatus};
use crate::error::{ApiError, ApiResult};
use crate::types::{null_as_empty, BookSource, CatalogRecord, RecommendationSource, SavedBook};
use crate::AppState;

const DEFAULT_LIBRARY_LIMIT: i64 = 500;
const DEFAULT_RECOMMENDED_LIMIT: i64 = 200;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub isbn: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub matches: Vec<SavedBook>,
    pub saved: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// Item source as sent by clients: a catalog record's source name, or the
/// provenance object of an enriched recommendation
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SaveSource {
    Name(BookSource),
    Provenance(RecommendationSource),
}

/// One item of a POST /save request (a catalog record or a recommendation)
#[derive(Debug, Clone, Deserialize)]
pub struct SaveItem {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub authors: Vec<String>,
    pub isbn13: Option<String>,
    pub language: Option<String>,
    pub published_year: Option<i32>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub source: Option<SaveSource>,
    pub source_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub reason: Option<String>,
}

impl SaveItem {
    fn to_record(&self) -> CatalogRecord {
        let (source, provenance_id) = match &self.source {
            Some(SaveSource::Name(source)) => (*source, None),
            Some(SaveSource::Provenance(p)) => (p.api, Some(p.id.clone())),
            None => (BookSource::Manual, None),
        };

        CatalogRecord {
            title: self.title.trim().to_string(),
            authors: self.authors.clone(),
            isbn13: self.isbn13.clone(),
            language: self.language.clone(),
            published_year: self.published_year,
            description: self.description.clone().unwrap_or_default(),
            cover_url: self.cover_url.clone().unwrap_or_default(),
            source,
            source_id: self
                .source_id
                .clone()
                .filter(|id| !id.is_empty())
                .or(provenance_id.filter(|id| !id.is_empty())),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveBody {
    pub list: String,
    #[serde(default)]
    pub items: Vec<SaveItem>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub saved: usize,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<ListEntry>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub status: ToggleStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /lookup?isbn=
pub async fn lookup(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> ApiResult<Json<LookupResponse>> {
    let isbn = params
        .isbn
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("isbn required".to_string()))?;

    let matches = state.engine.lookup_isbn(&isbn).await?;
    let saved_books = state.store.upsert_books(&matches).await?;
    let ids: Vec<Uuid> = saved_books.iter().map(|b| b.id).collect();
    let saved = state.store.add_library(&ids).await?;

    info!(isbn = %isbn, matches = saved_books.len(), saved, "ISBN lookup stored");
    Ok(Json(LookupResponse {
        matches: saved_books,
        saved,
    }))
}

/// POST /save
pub async fn save(
    State(state): State<AppState>,
    payload: Result<Json<SaveBody>, JsonRejection>,
) -> ApiResult<Json<SaveResponse>> {
    let Json(body) = payload?;
    if body.items.is_empty() {
        return Err(ApiError::BadRequest("no items".to_string()));
    }
    if body.list != "library" && body.list != "recommended" {
        return Err(ApiError::BadRequest(format!("invalid list: {}", body.list)));
    }
    if body.items.iter().any(|item| item.title.trim().is_empty()) {
        return Err(ApiError::BadRequest("every item needs a title".to_string()));
    }

    let records: Vec<CatalogRecord> = body.items.iter().map(SaveItem::to_record).collect();
    let saved_books = state.store.upsert_books(&records).await?;

    let saved = if body.list == "library" {
        let ids: Vec<Uuid> = saved_books.iter().map(|b| b.id).collect();
        state.store.add_library(&ids).await?
    } else {
        // Each saved book keeps the reason of the item it came from
        let items: Vec<(Uuid, Option<String>)> = saved_books
            .iter()
            .zip(&body.items)
            .map(|(book, item)| (book.id, item.reason.clone()))
            .collect();
        state.store.add_recommended(&items).await?
    };

    info!(list = %body.list, items = body.items.len(), saved, "Items saved");
    Ok(Json(SaveResponse { saved }))
}

/// GET /library
pub async fn list_library(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIBRARY_LIMIT).max(0);
    let items = state.store.list_library(limit).await?;
    Ok(Json(ListResponse { items }))
}

/// GET /recommended
pub async fn list_recommended(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_RECOMMENDED_LIMIT).max(0);
    let items = state.store.list_recommended(limit).await?;
    Ok(Json(ListResponse { items }))
}

/// DELETE /recommended/:id
pub async fn delete_recommended(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = state.store.delete_recommended(id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// POST /library/:book_id/toggle
pub async fn toggle_library(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<ToggleResponse>> {
    ensure_book(&state, book_id).await?;
    let status = state.store.toggle_library(book_id).await?;
    Ok(Json(ToggleResponse { status }))
}

/// POST /recommended/:book_id/toggle
pub async fn toggle_recommended(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<ToggleResponse>> {
    ensure_book(&state, book_id).await?;
    let status = state.store.toggle_recommended(book_id).await?;
    Ok(Json(ToggleResponse { status }))
}

async fn ensure_book(state: &AppState, book_id: Uuid) -> ApiResult<()> {
    match state.store.get_book(book_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("book {}", book_id))),
    }
}

/// Build catalog and list routes
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/lookup", get(lookup))
        .route("/save", post(save))
        .route("/library", get(list_library))
        .route("/recommended", get(list_recommended))
        .route("/recommended/:id", delete(delete_recommended))
        .route("/library/:book_id/toggle", post(toggle_library))
        .route("/recommended/:book_id/toggle", post(toggle_recommended))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_item_from_catalog_record() {
        let item: SaveItem = serde_json::from_value(json!({
            "title": "Deep Learning",
            "authors": ["Ian Goodfellow"],
            "source": "google",
            "source_id": "g1",
            "cover_url": "https://covers/a.jpg"
        }))
        .unwrap();
        let record = item.to_record();
        assert_eq!(record.source, BookSource::Google);
        assert_eq!(record.source_id.as_deref(), Some("g1"));
        assert_eq!(record.cover_url, "https://covers/a.jpg");
    }

    #[test]
    fn test_save_item_from_recommendation() {
        let item: SaveItem = serde_json::from_value(json!({
            "title": "SICP",
            "reason": "Classic.",
            "relatedTo": ["Deep Learning"],
            "source": { "api": "openlibrary", "id": "OL1W", "info_url": "https://openlibrary.org/works/OL1W" }
        }))
        .unwrap();
        let record = item.to_record();
        assert_eq!(record.source, BookSource::OpenLibrary);
        assert_eq!(record.source_id.as_deref(), Some("OL1W"));
        assert_eq!(item.reason.as_deref(), Some("Classic."));
    }

    #[test]
    fn test_save_item_without_source_is_manual() {
        let item: SaveItem = serde_json::from_value(json!({ "title": "Notes" })).unwrap();
        let record = item.to_record();
        assert_eq!(record.source, BookSource::Manual);
        assert!(record.source_id.is_none());
    }
}
