//! Test doubles for the engine's collaborators
//!
//! Stub search backends, generator, seed extractor and stores. Nothing here
//! touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use shelf_common::config::EngineConfig;
use shelf_recommend::engine::RecommendationEngine;
use shelf_recommend::types::{
    BackendError, BookSource, CatalogRecord, CatalogStore, GenerationError, OutputSchema,
    SavedBook, SearchBackend, SearchOptions, SearchQuery, Seed, SeedExtractor, TextGenerator,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ============================================================================
// Search Backends
// ============================================================================

/// Backend returning a fixed record list for every query
pub struct StubBackend {
    name: &'static str,
    records: Vec<CatalogRecord>,
    overrides: HashMap<SearchQuery, Vec<CatalogRecord>>,
    fail_on: Vec<SearchQuery>,
    pub calls: Mutex<Vec<(SearchQuery, SearchOptions)>>,
}

impl StubBackend {
    pub fn new(name: &'static str, records: Vec<CatalogRecord>) -> Self {
        Self {
            name,
            records,
            overrides: HashMap::new(),
            fail_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, query: SearchQuery) -> Self {
        self.fail_on.push(query);
        self
    }

    pub fn with_response(mut self, query: SearchQuery, records: Vec<CatalogRecord>) -> Self {
        self.overrides.insert(query, records);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchBackend for StubBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(
        &self,
        query: &SearchQuery,
        opts: &SearchOptions,
    ) -> Result<Vec<CatalogRecord>, BackendError> {
        self.calls.lock().unwrap().push((query.clone(), opts.clone()));
        if self.fail_on.contains(query) {
            return Err(BackendError::Api {
                status: 503,
                body: "stub unavailable".to_string(),
            });
        }
        Ok(self
            .overrides
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.records.clone()))
    }
}

pub fn google_record(id: &str, title: &str, author: &str, isbn13: &str) -> CatalogRecord {
    let mut record = CatalogRecord::new(title, BookSource::Google);
    record.source_id = Some(id.to_string());
    record.authors = vec![author.to_string()];
    record.isbn13 = Some(isbn13.to_string());
    record.cover_url = format!("https://books.google.com/thumb/{}", id);
    record.description = format!("About {}.", title);
    record.published_year = Some(2016);
    record
}

pub fn open_library_record(id: &str, title: &str, author: &str) -> CatalogRecord {
    let mut record = CatalogRecord::new(title, BookSource::OpenLibrary);
    record.source_id = Some(id.to_string());
    record.authors = vec![author.to_string()];
    record
        .metadata
        .insert("info_url".to_string(), json!(format!("https://openlibrary.org/works/{}", id)));
    record
}

/// Three Google Books records, the first titled "Deep Learning"
pub fn google_records() -> Vec<CatalogRecord> {
    vec![
        google_record("g1", "Deep Learning", "Ian Goodfellow", "9780262035613"),
        google_record("g2", "Dive into Deep Learning", "Aston Zhang", "9781009389433"),
        google_record("g3", "Neural Networks and Deep Learning", "Michael Nielsen", "9780000000003"),
    ]
}

/// Three Open Library records, disjoint from [`google_records`]
pub fn open_library_records() -> Vec<CatalogRecord> {
    vec![
        open_library_record("OL1W", "Hands-On Machine Learning", "Aurelien Geron"),
        open_library_record("OL2W", "Pattern Recognition and Machine Learning", "Christopher Bishop"),
        open_library_record("OL3W", "Grokking Deep Learning", "Andrew Trask"),
    ]
}

// ============================================================================
// Generator
// ============================================================================

/// Canned reply of one generator mode
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Text(String),
    Fail,
}

pub struct StubGenerator {
    structured: Reply,
    text: Reply,
    pub structured_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
    pub last_blocks: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn new(structured: Reply, text: Reply) -> Self {
        Self {
            structured,
            text,
            structured_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            last_blocks: Mutex::new(Vec::new()),
        }
    }

    /// Structured call answers `value`; the fallback must never be reached
    pub fn structured(value: Value) -> Self {
        Self::new(Reply::Json(value), Reply::Fail)
    }

    pub fn structured_count(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    pub fn text_count(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate_structured(
        &self,
        _schema: &OutputSchema,
        blocks: &[String],
    ) -> Result<Value, GenerationError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_blocks.lock().unwrap() = blocks.to_vec();
        match &self.structured {
            Reply::Json(value) => Ok(value.clone()),
            Reply::Text(text) => {
                serde_json::from_str(text).map_err(|e| GenerationError::Schema(e.to_string()))
            }
            Reply::Fail => Err(GenerationError::Api {
                status: 500,
                body: "stub structured failure".to_string(),
            }),
        }
    }

    async fn generate_text(&self, blocks: &[String]) -> Result<String, GenerationError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_blocks.lock().unwrap() = blocks.to_vec();
        match &self.text {
            Reply::Json(value) => Ok(value.to_string()),
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail => Err(GenerationError::Network("stub offline".to_string())),
        }
    }
}

/// Model output recommending the seed itself plus one real candidate
pub fn seed_duplicating_output() -> Value {
    json!({
        "recommendations": [
            {
                "title": "Deep Learning",
                "authors": ["Ian Goodfellow"],
                "reason": "The reference text itself.",
                "confidence": 0.99,
                "relatedTo": ["Deep Learning"]
            },
            {
                "title": "Dive into Deep Learning",
                "authors": null,
                "reason": "Hands-on companion with runnable notebooks.",
                "confidence": null,
                "relatedTo": ["Deep Learning"]
            }
        ]
    })
}

// ============================================================================
// Seed Extractor
// ============================================================================

pub struct StubExtractor {
    seeds: Vec<Seed>,
    fail: bool,
}

impl StubExtractor {
    pub fn new(seeds: Vec<Seed>) -> Self {
        Self { seeds, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            seeds: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl SeedExtractor for StubExtractor {
    async fn extract_seeds(&self, _image: &[u8], _mime: &str) -> Result<Vec<Seed>, GenerationError> {
        if self.fail {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(self.seeds.clone())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Store remembering every record it was asked to save
#[derive(Default)]
pub struct RecordingStore {
    pub saved: Mutex<Vec<CatalogRecord>>,
}

#[async_trait]
impl CatalogStore for RecordingStore {
    async fn save_candidates(&self, records: &[CatalogRecord]) -> shelf_common::Result<Vec<SavedBook>> {
        self.saved.lock().unwrap().extend_from_slice(records);
        Ok(records
            .iter()
            .map(|record| SavedBook {
                id: Uuid::new_v4(),
                record: record.clone(),
            })
            .collect())
    }
}

/// Store that always fails
pub struct FailingStore;

#[async_trait]
impl CatalogStore for FailingStore {
    async fn save_candidates(&self, _records: &[CatalogRecord]) -> shelf_common::Result<Vec<SavedBook>> {
        Err(shelf_common::Error::Internal("disk full".to_string()))
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Engine over the standard six-record stub backends
pub fn engine_with(generator: Arc<StubGenerator>) -> RecommendationEngine {
    RecommendationEngine::new(
        Arc::new(StubBackend::new("stub_a", google_records())),
        Arc::new(StubBackend::new("stub_b", open_library_records())),
        generator,
        EngineConfig::default(),
    )
}
