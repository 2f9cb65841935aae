//! Catalog Aggregator
//!
//! Issues each query variant against both search backends and concatenates the
//! results in order: variant 1 / backend A, variant 1 / backend B, variant 2 / A, …
//!
//! The two calls for one variant run concurrently; variants run one after another,
//! so at most two outbound requests are in flight per pipeline. A failed call
//! contributes nothing and never aborts the batch.

use crate::types::{CatalogRecord, OrderBy, SearchBackend, SearchOptions, SearchQuery};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rendered queries shorter than this are searched newest-first on backend A
const SHORT_QUERY_CHARS: usize = 5;

pub struct CatalogAggregator {
    primary: Arc<dyn SearchBackend>,
    secondary: Arc<dyn SearchBackend>,
}

impl CatalogAggregator {
    /// # Arguments
    /// * `primary` - Backend A (accepts ordering and language restriction)
    /// * `secondary` - Backend B
    pub fn new(primary: Arc<dyn SearchBackend>, secondary: Arc<dyn SearchBackend>) -> Self {
        Self { primary, secondary }
    }

    /// Run every variant against both backends, sequentially per variant
    pub async fn aggregate(&self, queries: &[SearchQuery], language: Option<&str>) -> Vec<CatalogRecord> {
        let mut records = Vec::new();
        for query in queries {
            records.extend(self.search_both(query, language).await);
        }

        debug!(
            variants = queries.len(),
            records = records.len(),
            "Aggregation complete"
        );
        records
    }

    /// One variant against both backends: A's hits followed by B's
    pub async fn search_both(&self, query: &SearchQuery, language: Option<&str>) -> Vec<CatalogRecord> {
        let primary_opts = primary_options(query, language);
        let secondary_opts = SearchOptions::default();

        let (a, b) = tokio::join!(
            self.primary.search(query, &primary_opts),
            self.secondary.search(query, &secondary_opts),
        );

        let mut records = recover(self.primary.name(), query, a);
        records.extend(recover(self.secondary.name(), query, b));
        records
    }

    /// Backend A only, for single-source lookups
    pub async fn search_primary(&self, query: &SearchQuery, language: Option<&str>) -> Vec<CatalogRecord> {
        let opts = primary_options(query, language);
        recover(self.primary.name(), query, self.primary.search(query, &opts).await)
    }

    /// Backend B only, for single-source lookups
    pub async fn search_secondary(&self, query: &SearchQuery) -> Vec<CatalogRecord> {
        let opts = SearchOptions::default();
        recover(self.secondary.name(), query, self.secondary.search(query, &opts).await)
    }
}

fn primary_options(query: &SearchQuery, language: Option<&str>) -> SearchOptions {
    let order_by = if query.to_string().chars().count() < SHORT_QUERY_CHARS {
        OrderBy::Newest
    } else {
        OrderBy::Relevance
    };

    SearchOptions {
        max: None,
        order_by,
        language_restrict: match query {
            // ISBN lookups are never language-restricted
            SearchQuery::Isbn(_) => None,
            _ => language.filter(|l| !l.is_empty()).map(str::to_string),
        },
    }
}

/// Upstream search failure is recovered locally as an empty result
fn recover<E: std::fmt::Display>(
    backend: &str,
    query: &SearchQuery,
    result: Result<Vec<CatalogRecord>, E>,
) -> Vec<CatalogRecord> {
    match result {
        Ok(records) => {
            debug!(backend, query = %query, hits = records.len(), "Search returned");
            records
        }
        Err(e) => {
            warn!(backend, query = %query, error = %e, "Search failed, treating as empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackendError, BookSource};
    use std::sync::Mutex;

    struct FixedBackend {
        name: &'static str,
        source: BookSource,
        fail_on: Option<SearchQuery>,
        seen_opts: Mutex<Vec<SearchOptions>>,
    }

    impl FixedBackend {
        fn new(name: &'static str, source: BookSource) -> Self {
            Self {
                name,
                source,
                fail_on: None,
                seen_opts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SearchBackend for FixedBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(
            &self,
            query: &SearchQuery,
            opts: &SearchOptions,
        ) -> Result<Vec<CatalogRecord>, BackendError> {
            self.seen_opts.lock().unwrap().push(opts.clone());
            if self.fail_on.as_ref() == Some(query) {
                return Err(BackendError::Network("connection reset".into()));
            }
            let mut record = CatalogRecord::new(format!("{} {}", self.name, query), self.source);
            record.source_id = Some(format!("{}-{}", self.name, query));
            Ok(vec![record])
        }
    }

    #[tokio::test]
    async fn test_order_is_variant_then_backend() {
        let aggregator = CatalogAggregator::new(
            Arc::new(FixedBackend::new("A", BookSource::Google)),
            Arc::new(FixedBackend::new("B", BookSource::OpenLibrary)),
        );
        let queries = vec![SearchQuery::Keywords("one".into()), SearchQuery::Keywords("two".into())];
        let titles: Vec<String> = aggregator
            .aggregate(&queries, Some("ja"))
            .await
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["A one", "B one", "A two", "B two"]);
    }

    #[tokio::test]
    async fn test_failed_call_is_empty_not_fatal() {
        let mut failing = FixedBackend::new("B", BookSource::OpenLibrary);
        failing.fail_on = Some(SearchQuery::Keywords("one".into()));
        let aggregator = CatalogAggregator::new(
            Arc::new(FixedBackend::new("A", BookSource::Google)),
            Arc::new(failing),
        );
        let queries = vec![SearchQuery::Keywords("one".into()), SearchQuery::Keywords("two".into())];
        let titles: Vec<String> = aggregator
            .aggregate(&queries, None)
            .await
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["A one", "A two", "B two"]);
    }

    #[tokio::test]
    async fn test_primary_options_follow_query_length() {
        let primary = Arc::new(FixedBackend::new("A", BookSource::Google));
        let aggregator = CatalogAggregator::new(
            primary.clone(),
            Arc::new(FixedBackend::new("B", BookSource::OpenLibrary)),
        );
        aggregator
            .aggregate(
                &[SearchQuery::Keywords("AI".into()), SearchQuery::Title("Deep Learning".into())],
                Some("en"),
            )
            .await;

        let opts = primary.seen_opts.lock().unwrap();
        assert_eq!(opts[0].order_by, OrderBy::Newest);
        assert_eq!(opts[1].order_by, OrderBy::Relevance);
        assert_eq!(opts[1].language_restrict.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_isbn_search_ignores_language() {
        let primary = Arc::new(FixedBackend::new("A", BookSource::Google));
        let aggregator = CatalogAggregator::new(
            primary.clone(),
            Arc::new(FixedBackend::new("B", BookSource::OpenLibrary)),
        );
        aggregator
            .search_both(&SearchQuery::Isbn("9780262035613".into()), Some("ja"))
            .await;
        aggregator
            .search_primary(&SearchQuery::Isbn("9780262035613".into()), Some("ja"))
            .await;

        let opts = primary.seen_opts.lock().unwrap();
        assert_eq!(opts.len(), 2);
        assert!(opts.iter().all(|o| o.language_restrict.is_none()));
    }
}
