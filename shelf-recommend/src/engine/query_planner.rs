//! Query Planner
//!
//! Expands seeds into a bounded, insertion-ordered set of search query variants.
//!
//! Per seed, up to three variants:
//! 1. Exact-title phrase
//! 2. First-author phrase (only when an author is present)
//! 3. Head token: the first title segment split on colon, dash or whitespace,
//!    truncated, for catalogs whose indexing misses the full title
//!
//! Duplicate variants collapse. When nothing is produced a literal fallback query
//! keeps the pool from being empty. The set is capped by dropping the tail.

use crate::types::{SearchQuery, Seed};
use shelf_common::config::EngineConfig;
use std::collections::HashSet;
use tracing::debug;

/// Characters that end the head token
const HEAD_SEPARATORS: &[char] = &['：', ':', '-', '–', '—'];

pub struct QueryPlanner {
    seed_cap: usize,
    variant_cap: usize,
    head_token_chars: usize,
    fallback_query: String,
}

impl QueryPlanner {
    pub fn new(
        seed_cap: usize,
        variant_cap: usize,
        head_token_chars: usize,
        fallback_query: impl Into<String>,
    ) -> Self {
        Self {
            seed_cap,
            variant_cap,
            head_token_chars,
            fallback_query: fallback_query.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.seed_cap,
            config.query_variant_cap,
            config.head_token_chars,
            config.fallback_query.clone(),
        )
    }

    /// Plan query variants for `seeds`
    ///
    /// Only the first `seed_cap` seeds are considered. The result is never empty
    /// and never longer than `variant_cap`.
    pub fn plan(&self, seeds: &[Seed]) -> Vec<SearchQuery> {
        let mut seen = HashSet::new();
        let mut variants = Vec::new();

        let mut push = |query: SearchQuery| {
            if seen.insert(query.clone()) {
                variants.push(query);
            }
        };

        for seed in seeds.iter().take(self.seed_cap) {
            if let Some(title) = seed.title() {
                push(SearchQuery::Title(title.trim().to_string()));
            }
            if let Some(author) = seed.first_author() {
                push(SearchQuery::Author(author.trim().to_string()));
            }
            if let Some(head) = seed.title().and_then(|t| head_token(t, self.head_token_chars)) {
                push(SearchQuery::Keywords(head));
            }
        }

        if variants.is_empty() {
            debug!(fallback = %self.fallback_query, "No seed produced a query variant");
            variants.push(SearchQuery::Keywords(self.fallback_query.clone()));
        }

        let planned = variants.len();
        variants.truncate(self.variant_cap);

        debug!(
            seeds = seeds.len(),
            planned,
            issued = variants.len(),
            "Query plan complete"
        );

        variants
    }
}

/// First title segment, truncated to `max_chars` characters
///
/// A title that starts with a separator falls back to its own prefix.
pub fn head_token(title: &str, max_chars: usize) -> Option<String> {
    let title = title.trim();
    let first = title
        .split(|c: char| c.is_whitespace() || HEAD_SEPARATORS.contains(&c))
        .next()
        .unwrap_or("");

    let source = if first.is_empty() { title } else { first };
    let head: String = source.chars().take(max_chars).collect();
    let head = head.trim().to_string();

    if head.is_empty() {
        None
    } else {
        Some(head)
    }
}
