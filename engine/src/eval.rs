use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::engine::{SearchEngine, SearchHit, SearchMode};
use crate::error::{Error, Result};
use crate::provider::EmbeddingProvider;

/// A labeled evaluation query: the text to run and the doc_ids judged
/// relevant to it.
#[derive(Debug, Clone, Deserialize)]
pub struct LabeledQuery {
    pub query: String,
    pub relevant: HashSet<String>,
}

/// Aggregated quality and latency for one retrieval mode over a query set.
#[derive(Debug, Clone)]
pub struct ModeReport {
    pub mode: SearchMode,
    pub recall_at_k: f64,
    pub mrr_at_k: f64,
    pub mean_latency: Duration,
}

/// Run every query under every mode and aggregate Recall@k, MRR@k, and mean
/// wall-clock latency per mode.
///
/// An empty query set, or any entry with an empty relevant set, is rejected
/// up front as a configuration error — reporting a recall computed against
/// nothing would only hide a broken label file.
pub fn evaluate(
    engine: &SearchEngine,
    provider: &dyn EmbeddingProvider,
    queries: &[LabeledQuery],
    modes: &[SearchMode],
    top_k: usize,
) -> Result<Vec<ModeReport>> {
    if queries.is_empty() {
        return Err(Error::Config("evaluation query set is empty".into()));
    }
    for (idx, entry) in queries.iter().enumerate() {
        if entry.relevant.is_empty() {
            return Err(Error::Config(format!(
                "query {idx} (`{}`) has no relevant documents",
                entry.query
            )));
        }
    }

    let mut reports = Vec::with_capacity(modes.len());
    for &mode in modes {
        let mut recall_sum = 0.0;
        let mut rr_sum = 0.0;
        let mut elapsed = Duration::ZERO;

        for entry in queries {
            let started = Instant::now();
            let hits = engine.search(&entry.query, mode, top_k, provider)?;
            elapsed += started.elapsed();
            recall_sum += recall(&hits, &entry.relevant);
            rr_sum += reciprocal_rank(&hits, &entry.relevant);
        }

        let count = queries.len() as f64;
        reports.push(ModeReport {
            mode,
            recall_at_k: recall_sum / count,
            mrr_at_k: rr_sum / count,
            mean_latency: elapsed / queries.len() as u32,
        });
        tracing::debug!(mode = %mode, queries = queries.len(), top_k, "mode evaluated");
    }
    Ok(reports)
}

/// Fraction of the relevant set found among the hits.
pub fn recall(hits: &[SearchHit], relevant: &HashSet<String>) -> f64 {
    let found = hits.iter().filter(|h| relevant.contains(&h.doc_id)).count();
    found as f64 / relevant.len() as f64
}

/// 1 / rank of the first relevant hit, or 0 when none is found.
pub fn reciprocal_rank(hits: &[SearchHit], relevant: &HashSet<String>) -> f64 {
    hits.iter()
        .find(|h| relevant.contains(&h.doc_id))
        .map_or(0.0, |h| 1.0 / h.rank as f64)
}
