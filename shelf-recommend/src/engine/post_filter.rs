//! Post-Filter
//!
//! Drops recommendations that duplicate a reference book, either by normalized
//! title or through the ISBN-13 of the candidate they matched.

use crate::engine::dedup::CandidatePool;
use crate::engine::enricher::Matched;
use crate::engine::normalize::{compact_isbn, normalize};
use crate::types::{non_empty, CatalogRecord, Seed};
use std::collections::HashSet;
use tracing::debug;

/// Normalized titles and compacted ISBNs of the reference books
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedIndex {
    titles: HashSet<String>,
    isbns: HashSet<String>,
}

impl SeedIndex {
    /// Index raw seeds together with their resolved records
    pub fn build(seeds: &[Seed], resolved: &[CatalogRecord]) -> Self {
        let mut index = Self::default();

        for seed in seeds {
            if let Some(title) = seed.title() {
                index.add_title(title);
            }
            if let Some(isbn) = seed.isbn() {
                index.isbns.insert(compact_isbn(isbn));
            }
        }
        for record in resolved {
            index.add_title(&record.title);
            if let Some(isbn) = non_empty(record.isbn13.as_deref()) {
                index.isbns.insert(compact_isbn(isbn));
            }
        }

        index
    }

    fn add_title(&mut self, title: &str) {
        let normalized = normalize(title);
        if !normalized.is_empty() {
            self.titles.insert(normalized);
        }
    }

    /// Normalized seed titles (also the re-ranker's relatedness set)
    pub fn titles(&self) -> &HashSet<String> {
        &self.titles
    }

    pub fn has_title(&self, title: &str) -> bool {
        self.titles.contains(&normalize(title))
    }

    pub fn has_isbn(&self, isbn: &str) -> bool {
        self.isbns.contains(&compact_isbn(isbn))
    }
}

/// Remove every match that duplicates a reference book
pub fn post_filter(matched: Vec<Matched>, index: &SeedIndex, pool: &CandidatePool) -> Vec<Matched> {
    let before = matched.len();

    let kept: Vec<Matched> = matched
        .into_iter()
        .filter(|m| {
            if index.has_title(&m.recommendation.title) {
                debug!(title = %m.recommendation.title, "Dropping recommendation: same title as a seed");
                return false;
            }
            let candidate_isbn = m
                .candidate
                .and_then(|i| pool.get(i))
                .and_then(|c| non_empty(c.isbn13.as_deref()));
            if let Some(isbn) = candidate_isbn {
                if index.has_isbn(isbn) {
                    debug!(title = %m.recommendation.title, isbn, "Dropping recommendation: same ISBN as a seed");
                    return false;
                }
            }
            true
        })
        .collect();

    debug!(before, after = kept.len(), "Post-filter complete");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::enricher::match_candidates;
    use crate::types::{BookSource, Recommendation};

    #[test]
    fn test_drops_seed_title_regardless_of_confidence() {
        let index = SeedIndex::build(&[Seed::from_title("Deep Learning")], &[]);
        let mut dup = Recommendation::new("DEEP LEARNING", "r");
        dup.confidence = Some(1.0);
        let other = Recommendation::new("Dive into Deep Learning", "r");

        let pool = CandidatePool::default();
        let kept = post_filter(match_candidates(vec![dup, other], &pool), &index, &pool);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].recommendation.title, "Dive into Deep Learning");
    }

    #[test]
    fn test_drops_by_matched_candidate_isbn() {
        let seed = Seed {
            isbn: Some("978-4-87311-758-4".into()),
            ..Default::default()
        };
        let index = SeedIndex::build(&[seed], &[]);

        let mut candidate = CatalogRecord::new("ゼロから作るDeep Learning", BookSource::Google);
        candidate.isbn13 = Some("9784873117584".into());
        let pool = CandidatePool::build(vec![candidate], 60);

        let rec = Recommendation::new("ゼロから作るDeep Learning", "r");
        let kept = post_filter(match_candidates(vec![rec], &pool), &index, &pool);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_resolved_titles_join_the_index() {
        let resolved = vec![CatalogRecord::new("Deep Learning (Adaptive Computation)", BookSource::Google)];
        let index = SeedIndex::build(&[Seed::from_title("deep learning")], &resolved);
        assert!(index.has_title("Deep Learning【Adaptive Computation】"));
        assert!(index.has_title("Deep-Learning"));
        assert_eq!(index.titles().len(), 2);
    }
}
