//! Enricher
//!
//! Attaches catalog metadata from the candidate pool to recommendations.
//! Matching looks at the normalized title first and the lower-cased first author
//! second; the first candidate in pool order satisfying either wins.

use crate::engine::dedup::CandidatePool;
use crate::engine::info_url::info_url;
use crate::engine::normalize::normalize;
use crate::types::{non_empty, CatalogRecord, Recommendation, RecommendationSource};

/// A recommendation paired with the index of its matched candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Matched {
    pub recommendation: Recommendation,
    pub candidate: Option<usize>,
}

/// Index of the first candidate matching `rec`, if any
pub fn find_match(rec: &Recommendation, pool: &CandidatePool) -> Option<usize> {
    let title = normalize(&rec.title);
    let author = rec.first_author().map(str::to_lowercase);

    pool.iter().position(|candidate| {
        if !title.is_empty() && normalize(&candidate.title) == title {
            return true;
        }
        match (&author, candidate.first_author()) {
            (Some(a), Some(c)) => !c.trim().is_empty() && c.to_lowercase() == *a,
            _ => false,
        }
    })
}

/// Pair every recommendation with its candidate lookup
pub fn match_candidates(recs: Vec<Recommendation>, pool: &CandidatePool) -> Vec<Matched> {
    recs.into_iter()
        .map(|recommendation| {
            let candidate = find_match(&recommendation, pool);
            Matched {
                recommendation,
                candidate,
            }
        })
        .collect()
}

/// Build the enriched recommendation for one match
///
/// Present, non-empty fields on the recommendation are kept. Without a match the
/// provenance is cleared.
pub fn enrich(matched: Matched, pool: &CandidatePool) -> Recommendation {
    let Matched {
        recommendation: mut rec,
        candidate,
    } = matched;

    let Some(candidate) = candidate.and_then(|i| pool.get(i)) else {
        rec.source = None;
        return rec;
    };

    rec.isbn13 = fill(rec.isbn13, candidate.isbn13.as_deref());
    rec.cover_url = fill(rec.cover_url, Some(candidate.cover_url.as_str()));
    rec.description = fill(rec.description, Some(candidate.description.as_str()));
    rec.language = fill(rec.language, candidate.language.as_deref());
    if rec.published_year.is_none() {
        rec.published_year = candidate.published_year;
    }
    rec.source = Some(provenance(candidate));
    rec
}

fn fill(current: Option<String>, candidate: Option<&str>) -> Option<String> {
    match current {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => non_empty(candidate).map(str::to_string),
    }
}

fn provenance(candidate: &CatalogRecord) -> RecommendationSource {
    let id = non_empty(candidate.source_id.as_deref())
        .or_else(|| non_empty(candidate.isbn13.as_deref()))
        .unwrap_or_default();

    RecommendationSource {
        api: candidate.source,
        id: id.to_string(),
        info_url: info_url(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookSource;

    fn pool() -> CandidatePool {
        let mut a = CatalogRecord::new("Deep Learning", BookSource::Google);
        a.source_id = Some("g1".into());
        a.authors = vec!["Ian Goodfellow".into()];
        a.cover_url = "https://covers/a.jpg".into();
        a.description = "The standard text.".into();
        a.isbn13 = Some("9780262035613".into());
        a.published_year = Some(2016);

        let mut b = CatalogRecord::new("Dive into Deep Learning", BookSource::OpenLibrary);
        b.authors = vec!["Aston Zhang".into()];
        b.isbn13 = Some("9781009389433".into());

        CandidatePool::build(vec![a, b], 60)
    }

    #[test]
    fn test_match_by_normalized_title() {
        let rec = Recommendation::new("deep  learning!", "r");
        assert_eq!(find_match(&rec, &pool()), Some(0));
    }

    #[test]
    fn test_match_by_first_author() {
        let mut rec = Recommendation::new("Some Other Title", "r");
        rec.authors = vec!["ASTON ZHANG".into()];
        assert_eq!(find_match(&rec, &pool()), Some(1));
    }

    #[test]
    fn test_enrich_fills_absent_fields_only() {
        let pool = pool();
        let mut rec = Recommendation::new("Deep Learning", "r");
        rec.cover_url = Some(String::new());
        rec.description = Some("Model's own summary".into());

        let enriched = enrich(
            Matched {
                candidate: find_match(&rec, &pool),
                recommendation: rec,
            },
            &pool,
        );

        assert_eq!(enriched.cover_url.as_deref(), Some("https://covers/a.jpg"));
        assert_eq!(enriched.description.as_deref(), Some("Model's own summary"));
        assert_eq!(enriched.isbn13.as_deref(), Some("9780262035613"));
        assert_eq!(enriched.published_year, Some(2016));

        let source = enriched.source.unwrap();
        assert_eq!(source.api, BookSource::Google);
        assert_eq!(source.id, "g1");
        assert_eq!(source.info_url, "https://books.google.com/books?id=g1");
    }

    #[test]
    fn test_provenance_id_falls_back_to_isbn() {
        let pool = pool();
        let rec = Recommendation::new("Dive into Deep Learning", "r");
        let matched = match_candidates(vec![rec], &pool).remove(0);
        assert_eq!(enrich(matched, &pool).source.unwrap().id, "9781009389433");
    }

    #[test]
    fn test_unmatched_clears_source() {
        let pool = pool();
        let mut rec = Recommendation::new("Unrelated", "r");
        rec.source = Some(RecommendationSource {
            api: BookSource::Manual,
            id: "x".into(),
            info_url: "http://x".into(),
        });
        let matched = match_candidates(vec![rec], &pool).remove(0);
        assert!(matched.candidate.is_none());
        assert!(enrich(matched, &pool).source.is_none());
    }
}
