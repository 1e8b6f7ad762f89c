//! Threshold-filtered similarity ranking over stored page vectors.
//!
//! Stores backed by an approximate index (pgvector HNSW) page through the
//! candidate list with plain `LIMIT/OFFSET`. When the index's candidate list
//! (`hnsw.ef_search`) is small relative to `offset + limit`, later windows may
//! miss or repeat neighbours. This is accepted; raise `ef_search` instead of
//! falling back to exact search.
//!
//! Scores are floored at 0, so at a zero threshold every indexed page of the
//! query's dimensionality is returned, with the floored pages ordered by id.

use std::cmp::Ordering;

use crate::error::{ServiceError, ServiceResult};

/// Parameters of one nearest-neighbour lookup.
#[derive(Debug, Clone, Copy)]
pub struct NearestQuery<'a> {
    /// Query vector.
    pub vector: &'a [f32],
    /// Minimum similarity (inclusive) a page needs to be returned.
    pub threshold: f64,
    /// Window size.
    pub limit: usize,
    /// Number of ranked pages to skip.
    pub offset: usize,
    /// Page to leave out of the ranking (used by similar-page lookups).
    pub exclude_page: Option<i64>,
}

/// A ranked page reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMatch {
    /// Page primary key.
    pub page_id: i64,
    /// `1 - cosine_distance` floored at 0; 1.0 means same direction.
    pub similarity: f64,
}

/// One window of the ranked, filtered result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedWindow {
    /// Matches inside the requested window, best first.
    pub matches: Vec<RankedMatch>,
    /// Size of the whole filtered result set.
    pub total: usize,
}

impl RankedWindow {
    /// Whether more results exist past this window.
    pub fn has_more(&self, offset: usize) -> bool {
        offset + self.matches.len() < self.total
    }
}

/// Fails when the query vector does not match the stored index dimensionality.
///
/// `None` means the store has no fixed dimensionality yet (no indexed pages),
/// in which case any query length is accepted.
pub fn ensure_dimensions(index: Option<usize>, query: usize) -> ServiceResult<()> {
    match index {
        Some(expected) if expected != query => Err(ServiceError::DimensionMismatch {
            expected,
            actual: query,
        }),
        _ => Ok(()),
    }
}

/// Cosine similarity of two equally sized vectors; 0.0 if either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0)
}

/// Score reported for a page: cosine similarity floored at 0.
///
/// Orthogonal and opposite-direction pages all score 0, so a zero threshold
/// admits every indexed page.
pub fn similarity_score(query: &[f32], page: &[f32]) -> f64 {
    cosine_similarity(query, page).max(0.0)
}

/// Ordering used everywhere results are ranked: similarity desc, page id asc.
pub fn compare_matches(a: &RankedMatch, b: &RankedMatch) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.page_id.cmp(&b.page_id))
}

/// Exact ranking over in-memory candidates.
///
/// Candidates whose vector length differs from the query are skipped.
pub fn rank_exact<'a, I>(candidates: I, query: &NearestQuery<'_>) -> RankedWindow
where
    I: IntoIterator<Item = (i64, &'a [f32])>,
{
    let mut eligible: Vec<RankedMatch> = candidates
        .into_iter()
        .filter(|(page_id, _)| Some(*page_id) != query.exclude_page)
        .filter(|(_, vector)| vector.len() == query.vector.len())
        .map(|(page_id, vector)| RankedMatch {
            page_id,
            similarity: similarity_score(query.vector, vector),
        })
        .filter(|ranked| ranked.similarity >= query.threshold)
        .collect();
    eligible.sort_by(compare_matches);
    let total = eligible.len();
    let matches = eligible
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect();
    RankedWindow { matches, total }
}
