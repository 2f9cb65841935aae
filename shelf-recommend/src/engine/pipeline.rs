//! Recommendation Pipeline
//!
//! Wires the engine stages into the two entry flows:
//! - **Title flow**: each user-typed title is grounded by a title lookup, grounded
//!   seeds replace raw titles, then planner → aggregator → deduplicator → requester
//!   → post-filter → enricher → re-ranker.
//! - **Image flow**: the vision collaborator extracts seeds, the seed resolver
//!   grounds them, the pool is built from resolved-or-raw seeds and a prefix of it
//!   is persisted best-effort before the same requester/post-processing chain.
//!
//! One pipeline runs per call; no state is shared between calls.

use crate::engine::aggregator::CatalogAggregator;
use crate::engine::dedup::CandidatePool;
use crate::engine::enricher::{enrich, match_candidates};
use crate::engine::normalize::compact_isbn;
use crate::engine::post_filter::{post_filter, SeedIndex};
use crate::engine::query_planner::QueryPlanner;
use crate::engine::requester::{GenerationOutcome, RecommendationRequester};
use crate::engine::reranker::rerank;
use crate::engine::seed_resolver::{ground_title, SeedResolver};
use crate::types::{
    CatalogRecord, CatalogStore, Recommendation, RecommendError, RecommendRequest, SearchBackend,
    SearchQuery, Seed, SeedExtractor, TextGenerator,
};
use serde::Serialize;
use shelf_common::config::EngineConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of the title flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleRecommendation {
    pub resolved: Vec<CatalogRecord>,
    pub recommendations: Vec<Recommendation>,
}

/// Result of the image flow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecommendation {
    pub extracted_seeds: Vec<Seed>,
    pub resolved: Vec<CatalogRecord>,
    pub recommendations: Vec<Recommendation>,
}

pub struct RecommendationEngine {
    aggregator: CatalogAggregator,
    planner: QueryPlanner,
    generator: Arc<dyn TextGenerator>,
    extractor: Option<Arc<dyn SeedExtractor>>,
    store: Option<Arc<dyn CatalogStore>>,
    config: EngineConfig,
}

impl RecommendationEngine {
    /// Create an engine over two search backends and a generator
    ///
    /// # Arguments
    /// * `primary` - Backend A (Google Books in production)
    /// * `secondary` - Backend B (Open Library in production)
    /// * `generator` - Generative model used for the final selection
    /// * `config` - Engine caps and constants
    pub fn new(
        primary: Arc<dyn SearchBackend>,
        secondary: Arc<dyn SearchBackend>,
        generator: Arc<dyn TextGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            aggregator: CatalogAggregator::new(primary, secondary),
            planner: QueryPlanner::from_config(&config),
            generator,
            extractor: None,
            store: None,
            config,
        }
    }

    /// Attach the vision collaborator required by the image flow
    pub fn with_extractor(mut self, extractor: Arc<dyn SeedExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Attach the store used for best-effort candidate persistence
    pub fn with_store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Shared Stages
    // ========================================================================

    /// Planner → aggregator → deduplicator
    pub async fn build_pool(&self, seeds: &[Seed], language: Option<&str>) -> CandidatePool {
        let queries = self.planner.plan(seeds);
        let records = self.aggregator.aggregate(&queries, language).await;
        let pool = CandidatePool::build(records, self.config.pool_cap);

        info!(
            seeds = seeds.len(),
            variants = queries.len(),
            candidates = pool.len(),
            "Candidate pool built"
        );
        pool
    }

    /// Requester → post-filter → enricher → re-ranker → truncate
    ///
    /// # Arguments
    /// * `seeds` - Reference books shown to the model
    /// * `index` - Titles and ISBNs a recommendation must not duplicate
    /// * `pool` - Candidate pool shown to the model and used for enrichment
    ///
    /// # Errors
    /// `RecommendError::GenerationUnavailable` when both generation attempts fail.
    pub async fn recommend_for_seeds(
        &self,
        seeds: &[Seed],
        index: &SeedIndex,
        pool: &CandidatePool,
        request: &RecommendRequest,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let requester = RecommendationRequester::new(
            self.generator.as_ref(),
            self.config.description_snippet_chars,
        );
        let outcome = requester.request(seeds, pool, request).await?;
        if let GenerationOutcome::Unparseable(reason) = &outcome {
            debug!(reason = %reason, "No recommendations from unparseable fallback");
        }

        let matched = match_candidates(outcome.into_recommendations(), pool);
        let kept = post_filter(matched, index, pool);
        let enriched: Vec<Recommendation> = kept.into_iter().map(|m| enrich(m, pool)).collect();
        let ranked = rerank(enriched, index.titles(), request.n);

        info!(returned = ranked.len(), requested = request.n, "Recommendations ranked");
        Ok(ranked)
    }

    // ========================================================================
    // Title Flow
    // ========================================================================

    /// Recommend from bare user-typed titles
    ///
    /// # Errors
    /// `RecommendError::InvalidInput` when `titles` has no non-blank entry;
    /// `RecommendError::GenerationUnavailable` when generation fails twice.
    pub async fn recommend_from_titles(
        &self,
        titles: &[String],
        request: &RecommendRequest,
    ) -> Result<TitleRecommendation, RecommendError> {
        let titles: Vec<&str> = titles
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if titles.is_empty() {
            return Err(RecommendError::InvalidInput("titles required".to_string()));
        }

        let language = language_of(request);
        let mut seeds = Vec::with_capacity(titles.len());
        let mut resolved = Vec::new();

        for (index, title) in titles.iter().enumerate() {
            let grounded = if index < self.config.seed_cap {
                ground_title(&self.aggregator, title, language).await
            } else {
                None
            };

            match grounded {
                Some(record) if !record.title.trim().is_empty() => {
                    debug!(input = %title, grounded = %record.title, "Title grounded");
                    seeds.push(Seed::from_record(&record));
                    resolved.push(record);
                }
                _ => seeds.push(Seed::from_title(*title)),
            }
        }

        // Typed titles stay excluded even when grounding picked a different edition
        let typed: Vec<Seed> = titles.iter().map(|t| Seed::from_title(*t)).collect();
        let index = SeedIndex::build(&typed, &resolved);

        let pool = self.build_pool(&seeds, language).await;
        let recommendations = self
            .recommend_for_seeds(&seeds, &index, &pool, request)
            .await?;

        Ok(TitleRecommendation {
            resolved,
            recommendations,
        })
    }

    // ========================================================================
    // Image Flow
    // ========================================================================

    /// Recommend from a shelf photo
    ///
    /// # Errors
    /// `RecommendError::InvalidInput` for an empty image or a missing extractor;
    /// `RecommendError::Extraction` when the vision collaborator fails;
    /// `RecommendError::GenerationUnavailable` as for the title flow.
    pub async fn recommend_from_image(
        &self,
        image: &[u8],
        mime: &str,
        request: &RecommendRequest,
    ) -> Result<ImageRecommendation, RecommendError> {
        if image.is_empty() {
            return Err(RecommendError::InvalidInput("image required".to_string()));
        }
        let extractor = self.extractor.as_ref().ok_or_else(|| {
            RecommendError::InvalidInput("image recommendations are not configured".to_string())
        })?;

        let seeds = extractor
            .extract_seeds(image, mime)
            .await
            .map_err(RecommendError::Extraction)?;
        info!(seeds = seeds.len(), "Seeds extracted from image");

        self.recommend_from_seeds(seeds, request).await
    }

    /// Image flow after extraction
    ///
    /// # Errors
    /// `RecommendError::GenerationUnavailable` when generation fails twice.
    pub async fn recommend_from_seeds(
        &self,
        seeds: Vec<Seed>,
        request: &RecommendRequest,
    ) -> Result<ImageRecommendation, RecommendError> {
        let language = language_of(request);
        let resolver = SeedResolver::new(&self.aggregator, self.config.seed_cap);
        let resolution = resolver.resolve(&seeds, language).await;

        let planner_input: Vec<Seed> = seeds
            .iter()
            .zip(&resolution)
            .map(|(seed, resolved)| match resolved {
                Some(record) => Seed::from_record(record),
                None => seed.clone(),
            })
            .collect();
        let resolved: Vec<CatalogRecord> = resolution.into_iter().flatten().collect();

        let pool = self.build_pool(&planner_input, language).await;
        self.persist_prefix(&pool).await;

        let index = SeedIndex::build(&seeds, &resolved);
        let recommendations = self
            .recommend_for_seeds(&seeds, &index, &pool, request)
            .await?;

        Ok(ImageRecommendation {
            extracted_seeds: seeds,
            resolved,
            recommendations,
        })
    }

    /// Persist the first candidates; failures are logged and swallowed
    async fn persist_prefix(&self, pool: &CandidatePool) {
        let Some(store) = &self.store else {
            return;
        };
        let count = self.config.persist_candidates.min(pool.len());
        if count == 0 {
            return;
        }

        match store.save_candidates(&pool.as_slice()[..count]).await {
            Ok(saved) => debug!(saved = saved.len(), "Persisted pool prefix"),
            Err(e) => warn!(error = %e, "Failed to persist candidates, continuing"),
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Search both backends for one ISBN
    pub async fn lookup_isbn(&self, isbn: &str) -> Result<Vec<CatalogRecord>, RecommendError> {
        let isbn = compact_isbn(isbn);
        if isbn.is_empty() {
            return Err(RecommendError::InvalidInput("isbn required".to_string()));
        }

        let matches = self
            .aggregator
            .search_both(&SearchQuery::Isbn(isbn.clone()), None)
            .await;
        info!(isbn = %isbn, matches = matches.len(), "ISBN lookup");
        Ok(matches)
    }
}

fn language_of(request: &RecommendRequest) -> Option<&str> {
    Some(request.language.trim()).filter(|l| !l.is_empty())
}
