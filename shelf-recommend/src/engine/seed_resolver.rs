//! Seed Resolver
//!
//! Grounds each raw seed to its best-matching real catalog record.
//!
//! # Scoring
//! For a seed `s` and a search result `r`:
//! - `+1.0` if the normalized titles are equal, else `+0.6` if one contains the other
//! - `+0.3` if the lower-cased first seed author is a substring of the result's
//! - `+0.8` if the seed ISBN is a substring of the result's ISBN-13
//!
//! The running best starts at a `-1.0` sentinel and is replaced only on a strictly
//! greater score, so among equal scores the earliest result wins. This tie-break is
//! order-dependent and deliberately kept: downstream output depends on it.
//! A seed whose best score is zero (no criterion matched) resolves to `None`.
//!
//! Seeds are processed sequentially; backend failures count as empty results.

use crate::engine::aggregator::CatalogAggregator;
use crate::engine::normalize::{compact_isbn, normalize};
use crate::types::{CatalogRecord, SearchQuery, Seed};
use tracing::{debug, info};

const SENTINEL: f64 = -1.0;
const EXACT_TITLE: f64 = 1.0;
const PARTIAL_TITLE: f64 = 0.6;
const AUTHOR_MATCH: f64 = 0.3;
const ISBN_MATCH: f64 = 0.8;

pub struct SeedResolver<'a> {
    aggregator: &'a CatalogAggregator,
    seed_cap: usize,
}

impl<'a> SeedResolver<'a> {
    pub fn new(aggregator: &'a CatalogAggregator, seed_cap: usize) -> Self {
        Self { aggregator, seed_cap }
    }

    /// Resolve seeds one at a time
    ///
    /// Returns one entry per input seed (index-aligned). Seeds beyond `seed_cap`
    /// are not queried and resolve to `None`.
    pub async fn resolve(&self, seeds: &[Seed], language: Option<&str>) -> Vec<Option<CatalogRecord>> {
        let mut resolved = Vec::with_capacity(seeds.len());

        for (index, seed) in seeds.iter().enumerate() {
            if index >= self.seed_cap {
                resolved.push(None);
                continue;
            }

            let mut results = Vec::new();
            for query in resolution_queries(seed) {
                results.extend(self.aggregator.search_both(&query, language).await);
            }

            let best = best_match(seed, &results).cloned();
            debug!(
                seed_title = ?seed.title,
                results = results.len(),
                resolved = ?best.as_ref().map(|r| &r.title),
                "Seed resolution"
            );
            resolved.push(best);
        }

        info!(
            seeds = seeds.len(),
            resolved = resolved.iter().filter(|r| r.is_some()).count(),
            "Seed resolution complete"
        );
        resolved
    }
}

/// Queries used to ground one seed
///
/// ISBN seeds use only the ISBN-scoped query; title seeds use the title phrase plus
/// a title+author query when an author is known.
pub fn resolution_queries(seed: &Seed) -> Vec<SearchQuery> {
    if let Some(isbn) = seed.isbn() {
        return vec![SearchQuery::Isbn(compact_isbn(isbn))];
    }

    let Some(title) = seed.title() else {
        return Vec::new();
    };

    let mut queries = vec![SearchQuery::Title(title.trim().to_string())];
    if let Some(author) = seed.first_author() {
        queries.push(SearchQuery::TitleAuthor {
            title: title.trim().to_string(),
            author: author.trim().to_string(),
        });
    }
    queries
}

/// Match score of `record` against `seed`
pub fn score(seed: &Seed, record: &CatalogRecord) -> f64 {
    let mut total = 0.0;

    if let Some(title) = seed.title() {
        let (s, r) = (normalize(title), normalize(&record.title));
        if !s.is_empty() && !r.is_empty() {
            if s == r {
                total += EXACT_TITLE;
            } else if s.contains(&r) || r.contains(&s) {
                total += PARTIAL_TITLE;
            }
        }
    }

    if let (Some(seed_author), Some(record_author)) = (seed.first_author(), record.first_author()) {
        if record_author.to_lowercase().contains(&seed_author.to_lowercase()) {
            total += AUTHOR_MATCH;
        }
    }

    if let (Some(seed_isbn), Some(record_isbn)) = (seed.isbn(), record.isbn13.as_deref()) {
        let (s, r) = (compact_isbn(seed_isbn), compact_isbn(record_isbn));
        if !s.is_empty() && r.contains(&s) {
            total += ISBN_MATCH;
        }
    }

    total
}

/// Highest-scoring record; ties keep the earliest, zero scores never resolve
pub fn best_match<'r>(seed: &Seed, records: &'r [CatalogRecord]) -> Option<&'r CatalogRecord> {
    let mut best_score = SENTINEL;
    let mut best = None;

    for record in records {
        let s = score(seed, record);
        if s > best_score {
            best_score = s;
            best = Some(record);
        }
    }

    if best_score > 0.0 {
        best
    } else {
        None
    }
}

/// Ground a bare user-typed title
///
/// First hit of a title-phrase search on backend A; when A has nothing, the first
/// hit of a keyword search on backend B.
pub async fn ground_title(
    aggregator: &CatalogAggregator,
    title: &str,
    language: Option<&str>,
) -> Option<CatalogRecord> {
    let primary = aggregator
        .search_primary(&SearchQuery::Title(title.to_string()), language)
        .await;
    if let Some(first) = primary.into_iter().next() {
        return Some(first);
    }

    aggregator
        .search_secondary(&SearchQuery::Keywords(title.to_string()))
        .await
        .into_iter()
        .next()
}
