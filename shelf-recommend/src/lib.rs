//! shelf-recommend library interface
//!
//! Book recommendation resolution and ranking service: turns noisy book mentions
//! (typed titles or a shelf photo) into a deduplicated, re-ranked list of
//! recommendations grounded in real catalog records.

pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use db::SqliteCatalogStore;
use engine::RecommendationEngine;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Recommendation pipeline (stateless per call)
    pub engine: Arc<RecommendationEngine>,
    /// Catalog store backing lookups and lists
    pub store: SqliteCatalogStore,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<RecommendationEngine>, store: SqliteCatalogStore) -> Self {
        Self {
            engine,
            store,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::recommend_routes())
        .merge(api::catalog_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
