//! Configuration resolution for shelf-recommend
//!
//! Priority: CLI argument → environment variable → TOML file → compiled default.
//! The lower three tiers are resolved by [`ShelfConfig::load`]; this module applies
//! the CLI tier and builds the engine's collaborators from the result.

use crate::clients::{GoogleBooksClient, OpenAiGenerator, OpenLibraryClient};
use crate::engine::RecommendationEngine;
use crate::types::CatalogStore;
use shelf_common::{Error, Result, ShelfConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub database_path: Option<PathBuf>,
}

/// Load TOML + ENV configuration and apply CLI overrides on top
pub fn resolve_config(config_path: Option<&Path>, cli: CliOverrides) -> Result<ShelfConfig> {
    let mut config = ShelfConfig::load(config_path)?;
    apply_cli_overrides(&mut config, cli);
    Ok(config)
}

pub fn apply_cli_overrides(config: &mut ShelfConfig, cli: CliOverrides) {
    if let Some(addr) = cli.bind_address.filter(|a| !a.trim().is_empty()) {
        info!("Bind address from command line: {}", addr);
        config.bind_address = addr;
    }
    if let Some(path) = cli.database_path {
        info!("Database path from command line: {}", path.display());
        config.database_path = Some(path);
    }
}

/// Build the engine with production backends, generator and vision extractor
///
/// # Errors
/// `Error::Config` when the generator API key is missing; `Error::Internal` when
/// an HTTP client cannot be constructed.
pub fn build_engine(config: &ShelfConfig, store: Arc<dyn CatalogStore>) -> Result<RecommendationEngine> {
    let api_key = config.generator_api_key()?;

    let google = GoogleBooksClient::new(config.google_books.clone())
        .map_err(|e| Error::Internal(format!("Google Books client: {}", e)))?;
    let open_library = OpenLibraryClient::new(config.open_library.clone())
        .map_err(|e| Error::Internal(format!("Open Library client: {}", e)))?;
    let generator = Arc::new(
        OpenAiGenerator::new(config.generator.clone(), api_key)
            .map_err(|e| Error::Internal(format!("Generator client: {}", e)))?,
    );

    info!(
        generator = %config.generator.base_url,
        structured_model = %config.generator.structured_model,
        "Recommendation engine configured"
    );

    Ok(RecommendationEngine::new(
        Arc::new(google),
        Arc::new(open_library),
        generator.clone(),
        config.engine.clone(),
    )
    .with_extractor(generator)
    .with_store(store))
}
