//! Retrieval and ranking.
//!
//! Wraps the embedding store's nearest-neighbor search with the ranking
//! pipeline: keyword boosting, distance thresholding, multi-subquery
//! aggregation for whole-corpus extraction, and per-source grouping.
//!
//! Distances are L2, so lower is better throughout. Boost factors below 1.0
//! therefore *improve* a result's rank, and in aggregate mode the
//! accumulated relevance score is folded back into a distance-shaped value
//! (its reciprocal) so the same threshold comparison applies everywhere.
//!
//! An empty result set after thresholding is a normal outcome ("no relevant
//! content"), handled by the context assembler's fallback text — never an
//! error.

use std::collections::HashMap;

use crate::chunk::normalize_whitespace;
use crate::config::BoostRule;
use crate::error::Result;
use crate::models::{RetrievalResult, SourceContext};
use crate::store::EmbeddingStore;

/// Guards the reciprocal in relevance scoring against zero distances.
pub const DISTANCE_EPSILON: f64 = 1e-6;

/// Multiplier applied to a subquery's contribution when the chunk contains
/// every word of the subquery.
pub const ALL_WORDS_BONUS: f64 = 2.0;

/// Knobs for a single retrieval call. Thresholds are caller-chosen: chat
/// and extraction use different cutoffs.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub k: usize,
    pub source_filter: Option<String>,
    pub threshold: f64,
    pub boosts: Vec<BoostRule>,
}

/// One subquery of an aggregate extraction, weighted by field importance.
#[derive(Debug, Clone)]
pub struct Subquery {
    pub text: String,
    pub weight: f64,
}

/// Retrieve the ranked chunks relevant to `query`.
///
/// Searches the store, re-weights by the boost rules, re-sorts ascending,
/// and drops everything beyond the distance threshold.
pub async fn retrieve(
    store: &EmbeddingStore,
    query: &str,
    opts: &RetrievalOptions,
) -> Result<Vec<RetrievalResult>> {
    let mut results = store
        .search(query, opts.k, opts.source_filter.as_deref())
        .await?;

    apply_boosts(&mut results, query, &opts.boosts);
    sort_ascending(&mut results);

    Ok(apply_threshold(results, opts.threshold))
}

/// Multiply each result's distance by the factor of every boost rule whose
/// term appears (case-insensitively) in the query and whose term or alias
/// appears in the chunk text. Multiple matching rules compound.
pub fn apply_boosts(results: &mut [RetrievalResult], query: &str, boosts: &[BoostRule]) {
    if boosts.is_empty() {
        return;
    }

    let query_lower = query.to_lowercase();

    for result in results.iter_mut() {
        let text_lower = result.text.to_lowercase();

        for rule in boosts {
            let term_lower = rule.term.to_lowercase();
            if !query_lower.contains(&term_lower) {
                continue;
            }

            let in_chunk = text_lower.contains(&term_lower)
                || rule
                    .aliases
                    .iter()
                    .any(|alias| text_lower.contains(&alias.to_lowercase()));

            if in_chunk {
                result.distance *= rule.factor;
            }
        }
    }
}

/// Keep only results at or below the distance threshold.
pub fn apply_threshold(results: Vec<RetrievalResult>, threshold: f64) -> Vec<RetrievalResult> {
    results
        .into_iter()
        .filter(|r| r.distance <= threshold)
        .collect()
}

fn sort_ascending(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.page.cmp(&b.page))
    });
}

/// Merge several independent subqueries into one corpus-wide ranking.
///
/// Each subquery contributes `weight × 1/(distance + ε)` to a relevance
/// score accumulated per chunk content fingerprint, with the all-words
/// bonus multiplied in when the chunk literally contains every word of the
/// subquery. The final ranking is descending by relevance; the keep cutoff
/// is `1/relevance ≤ threshold` — the usual comparison with the score
/// inverted back into a distance.
pub async fn aggregate_retrieve(
    store: &EmbeddingStore,
    subqueries: &[Subquery],
    k: usize,
    threshold: f64,
) -> Result<Vec<RetrievalResult>> {
    let mut scores: HashMap<String, Accumulator> = HashMap::new();

    for subquery in subqueries {
        let hits = store.search(&subquery.text, k, None).await?;
        accumulate(&mut scores, hits, subquery);
    }

    Ok(finalize(scores, threshold))
}

struct Accumulator {
    result: RetrievalResult,
    relevance: f64,
}

fn accumulate(scores: &mut HashMap<String, Accumulator>, hits: Vec<RetrievalResult>, subquery: &Subquery) {
    for hit in hits {
        let mut contribution = subquery.weight / (hit.distance + DISTANCE_EPSILON);
        if contains_all_words(&hit.text, &subquery.text) {
            contribution *= ALL_WORDS_BONUS;
        }

        scores
            .entry(hit.hash.clone())
            .and_modify(|acc| acc.relevance += contribution)
            .or_insert(Accumulator {
                result: hit,
                relevance: contribution,
            });
    }
}

fn finalize(scores: HashMap<String, Accumulator>, threshold: f64) -> Vec<RetrievalResult> {
    let mut ranked: Vec<Accumulator> = scores.into_values().collect();

    // Descending relevance; source and page break ties deterministically.
    ranked.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.result.source.cmp(&b.result.source))
            .then_with(|| a.result.page.cmp(&b.result.page))
    });

    ranked
        .into_iter()
        .filter(|acc| acc.relevance > 0.0 && 1.0 / acc.relevance <= threshold)
        .map(|acc| {
            let mut result = acc.result;
            result.distance = 1.0 / acc.relevance;
            result
        })
        .collect()
}

/// Whether `text` contains every whitespace-separated word of `query`,
/// case-insensitively.
pub fn contains_all_words(text: &str, query: &str) -> bool {
    let text_lower = text.to_lowercase();
    query
        .split_whitespace()
        .all(|word| text_lower.contains(&word.to_lowercase()))
}

/// Group ranked results by source document.
///
/// Cleaned chunk texts are concatenated in retrieval order to one combined
/// text per source; group order follows each source's first appearance in
/// the ranking. Supports the whole-document extraction path, where context
/// must be organized per document rather than per chunk.
pub fn group_by_source(results: &[RetrievalResult]) -> Vec<SourceContext> {
    let mut order: Vec<String> = Vec::new();
    let mut combined: HashMap<String, String> = HashMap::new();

    for result in results {
        let cleaned = normalize_whitespace(&result.text);
        match combined.get_mut(&result.source) {
            Some(text) => {
                text.push(' ');
                text.push_str(&cleaned);
            }
            None => {
                order.push(result.source.clone());
                combined.insert(result.source.clone(), cleaned);
            }
        }
    }

    order
        .into_iter()
        .map(|source| {
            let text = combined.remove(&source).unwrap_or_default();
            SourceContext { source, text }
        })
        .collect()
}
