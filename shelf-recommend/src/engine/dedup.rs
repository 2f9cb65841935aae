//! Deduplicator
//!
//! Reduces the aggregated record list to the candidate pool: first occurrence per
//! dedup key wins, insertion order is preserved, and collection stops at the cap.

use crate::types::CatalogRecord;
use std::collections::HashSet;

/// Ordered, bounded set of candidates
///
/// Later stages refer to candidates by index into the pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    candidates: Vec<CatalogRecord>,
}

impl CandidatePool {
    /// Deduplicate `records` into a pool of at most `cap` candidates
    pub fn build(records: impl IntoIterator<Item = CatalogRecord>, cap: usize) -> Self {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for record in records {
            if candidates.len() >= cap {
                break;
            }
            if seen.insert(record.dedup_key()) {
                candidates.push(record);
            }
        }

        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CatalogRecord> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogRecord> {
        self.candidates.iter()
    }

    pub fn as_slice(&self) -> &[CatalogRecord] {
        &self.candidates
    }

    pub fn into_vec(self) -> Vec<CatalogRecord> {
        self.candidates
    }
}
