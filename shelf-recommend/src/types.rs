//! Core Types and Trait Definitions
//!
//! Domain model shared by the recommendation engine, the backend adapters and the
//! HTTP layer, plus the collaborator traits the engine is written against:
//! - [`SearchBackend`]: one bibliographic search provider
//! - [`TextGenerator`]: generative model with structured and free-text modes
//! - [`SeedExtractor`]: vision collaborator turning a shelf photo into seeds
//! - [`CatalogStore`]: best-effort persistence of catalog records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Catalog Records
// ============================================================================

/// Origin of a catalog record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookSource {
    /// Google Books (provider A)
    #[serde(rename = "google")]
    Google,
    /// Open Library (provider B)
    #[serde(rename = "openlibrary")]
    OpenLibrary,
    /// Entered by hand
    #[serde(rename = "manual")]
    Manual,
}

impl BookSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookSource::Google => "google",
            BookSource::OpenLibrary => "openlibrary",
            BookSource::Manual => "manual",
        }
    }

    /// Parse the stored string form; unknown values map to `Manual`
    pub fn from_db(s: &str) -> Self {
        match s {
            "google" => BookSource::Google,
            "openlibrary" => BookSource::OpenLibrary,
            _ => BookSource::Manual,
        }
    }
}

impl fmt::Display for BookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One book as returned by a search backend, normalized at the adapter boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_url: String,
    pub source: BookSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Provider-specific extras (deep links, categories, page count)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CatalogRecord {
    /// Minimal record with only a title and source
    pub fn new(title: impl Into<String>, source: BookSource) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            isbn13: None,
            language: None,
            published_year: None,
            description: String::new(),
            cover_url: String::new(),
            source,
            source_id: None,
            metadata: Map::new(),
        }
    }

    /// Composite identity `source:(sourceId|isbn13|title)`
    ///
    /// Empty identifiers fall through to the next component.
    pub fn dedup_key(&self) -> String {
        let id = non_empty(self.source_id.as_deref())
            .or_else(|| non_empty(self.isbn13.as_deref()))
            .unwrap_or(&self.title);
        format!("{}:{}", self.source, id)
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// String value from `metadata`, if present and non-empty
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Deserialize `null` (as produced by strict-mode model output) as an empty list
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// Catalog record persisted by a [`CatalogStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBook {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: CatalogRecord,
}

// ============================================================================
// Seeds
// ============================================================================

/// Noisy, possibly incomplete book identification
///
/// Comes from the vision collaborator or from a bare title typed by a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl Seed {
    pub fn from_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Seed carrying the richer text of a grounded catalog record
    pub fn from_record(record: &CatalogRecord) -> Self {
        Self {
            title: Some(record.title.clone()),
            authors: record.authors.clone(),
            isbn: record.isbn13.clone(),
            confidence: None,
            year: record.published_year,
        }
    }

    /// Non-blank title
    pub fn title(&self) -> Option<&str> {
        non_empty(self.title.as_deref())
    }

    /// Non-blank first author
    pub fn first_author(&self) -> Option<&str> {
        non_empty(self.authors.first().map(String::as_str))
    }

    /// Non-blank ISBN
    pub fn isbn(&self) -> Option<&str> {
        non_empty(self.isbn.as_deref())
    }
}

// ============================================================================
// Recommendations
// ============================================================================

/// Provenance attached to a recommendation that matched a real candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSource {
    pub api: BookSource,
    pub id: String,
    pub info_url: String,
}

/// One recommended book with its justification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Seed titles this recommendation relates to, as declared by the model
    #[serde(
        rename = "relatedTo",
        alias = "related_to",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub related_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RecommendationSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
}

impl Recommendation {
    pub fn new(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            reason: reason.into(),
            confidence: None,
            related_to: Vec::new(),
            source: None,
            isbn13: None,
            cover_url: None,
            description: None,
            language: None,
            published_year: None,
        }
    }

    pub fn first_author(&self) -> Option<&str> {
        non_empty(self.authors.first().map(String::as_str))
    }
}

/// Caller-facing knobs for one recommendation request
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendRequest {
    /// Number of recommendations to return
    pub n: usize,
    /// Preferred language (also used as the provider A language restriction)
    pub language: String,
    /// Desired difficulty, passed through to the model
    pub hardness: String,
}

impl Default for RecommendRequest {
    fn default() -> Self {
        Self {
            n: 5,
            language: "ja".to_string(),
            hardness: "auto".to_string(),
        }
    }
}

// ============================================================================
// Search Backend
// ============================================================================

/// Search query variant
///
/// Rendered in provider A syntax by `Display`; provider B adapters map the
/// variant onto their own parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchQuery {
    /// Exact title phrase
    Title(String),
    /// Exact author phrase
    Author(String),
    /// Title phrase combined with an author phrase
    TitleAuthor { title: String, author: String },
    /// ISBN-scoped lookup
    Isbn(String),
    /// Free keywords
    Keywords(String),
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchQuery::Title(t) => write!(f, "intitle:\"{}\"", t),
            SearchQuery::Author(a) => write!(f, "inauthor:\"{}\"", a),
            SearchQuery::TitleAuthor { title, author } => {
                write!(f, "intitle:\"{}\" inauthor:\"{}\"", title, author)
            }
            SearchQuery::Isbn(isbn) => write!(f, "isbn:{}", isbn),
            SearchQuery::Keywords(k) => f.write_str(k),
        }
    }
}

/// Result ordering requested from a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    Relevance,
    Newest,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Relevance => "relevance",
            OrderBy::Newest => "newest",
        }
    }
}

/// Per-call search options (backends ignore what they do not support)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub max: Option<u32>,
    pub order_by: OrderBy,
    pub language_restrict: Option<String>,
}

/// Search backend error
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request could not be sent or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A bibliographic search provider
///
/// Each implementation maps its own response shape into [`CatalogRecord`], so the
/// aggregation and deduplication stages stay backend-agnostic.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Run one search
    ///
    /// # Errors
    /// Returns `BackendError` on network, status or parse failure. Callers in the
    /// engine treat any error as an empty result.
    async fn search(
        &self,
        query: &SearchQuery,
        opts: &SearchOptions,
    ) -> Result<Vec<CatalogRecord>, BackendError>;
}

// ============================================================================
// Generative Model
// ============================================================================

/// Named JSON schema for structured generation
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

/// Generative model error
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Output did not conform to the requested schema
    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Generative text model
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a JSON object constrained to `schema`
    async fn generate_structured(
        &self,
        schema: &OutputSchema,
        blocks: &[String],
    ) -> Result<Value, GenerationError>;

    /// Generate unconstrained text
    async fn generate_text(&self, blocks: &[String]) -> Result<String, GenerationError>;
}

/// Vision collaborator: reads book spines and covers from an image
#[async_trait::async_trait]
pub trait SeedExtractor: Send + Sync {
    /// Extract seeds from an already-normalized image (may return empty)
    async fn extract_seeds(&self, image: &[u8], mime: &str) -> Result<Vec<Seed>, GenerationError>;
}

// ============================================================================
// Persistence
// ============================================================================

/// Persistence collaborator for catalog records
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Upsert records, returning the stored rows with their ids
    async fn save_candidates(&self, records: &[CatalogRecord]) -> shelf_common::Result<Vec<SavedBook>>;
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Externally visible recommendation failure
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Both the structured call and the free-text fallback failed
    #[error("Generation unavailable (structured: {primary}; fallback: {fallback})")]
    GenerationUnavailable {
        primary: GenerationError,
        fallback: GenerationError,
    },

    /// The vision collaborator failed
    #[error("Seed extraction failed: {0}")]
    Extraction(GenerationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
