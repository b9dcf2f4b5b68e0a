use std::cmp::Ordering;
use std::collections::HashMap;

use crate::DocId;

/// Merge a lexical and a vector candidate pool into one ranking.
///
/// BM25 scores are unbounded and corpus-dependent while cosine similarities
/// live in [-1, 1], so each pool is min-max normalized to [0, 1] over its own
/// candidates before blending:
///
/// `fused = alpha * vector_norm + (1 - alpha) * lexical_norm`
///
/// The result is the union of both pools: a document absent from one pool
/// scores 0 for that modality instead of being excluded. If every score in a
/// pool is identical, all of its normalized scores become 1.0. Sorted
/// descending, ties broken by internal id ascending, truncated to `top_k`.
pub fn fuse(
    lexical: &[(DocId, f32)],
    vector: &[(DocId, f32)],
    alpha: f32,
    top_k: usize,
) -> Vec<(DocId, f32)> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut fused: HashMap<DocId, f32> = HashMap::with_capacity(lexical.len() + vector.len());
    accumulate(&mut fused, vector, alpha);
    accumulate(&mut fused, lexical, 1.0 - alpha);

    let mut ranked: Vec<(DocId, f32)> = fused.into_iter().collect();
    ranked.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(top_k);
    ranked
}

fn accumulate(into: &mut HashMap<DocId, f32>, pool: &[(DocId, f32)], weight: f32) {
    let Some((min, max)) = min_max(pool) else {
        return;
    };
    let range = max - min;
    for &(doc, score) in pool {
        let norm = if range < f32::EPSILON {
            1.0
        } else {
            (score - min) / range
        };
        *into.entry(doc).or_insert(0.0) += weight * norm;
    }
}

fn min_max(pool: &[(DocId, f32)]) -> Option<(f32, f32)> {
    let mut iter = pool.iter().map(|&(_, s)| s);
    let first = iter.next()?;
    let (mut min, mut max) = (first, first);
    for s in iter {
        if s < min {
            min = s;
        }
        if s > max {
            max = s;
        }
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_zero_reproduces_the_lexical_order() {
        let lexical = vec![(0, 12.0), (1, 7.5), (2, 3.1)];
        let vector = vec![(2, 0.9), (3, 0.8), (0, 0.1)];
        let fused = fuse(&lexical, &vector, 0.0, 10);
        let lexical_only: Vec<DocId> = fused
            .iter()
            .map(|&(doc, _)| doc)
            .filter(|doc| lexical.iter().any(|&(d, _)| d == *doc))
            .collect();
        assert_eq!(lexical_only, vec![0, 1, 2]);
    }

    #[test]
    fn alpha_one_reproduces_the_vector_order() {
        let lexical = vec![(0, 12.0), (1, 7.5)];
        let vector = vec![(2, 0.9), (3, 0.8), (0, 0.1)];
        let fused = fuse(&lexical, &vector, 1.0, 10);
        let vector_only: Vec<DocId> = fused
            .iter()
            .map(|&(doc, _)| doc)
            .filter(|doc| vector.iter().any(|&(d, _)| d == *doc))
            .collect();
        assert_eq!(vector_only, vec![2, 3, 0]);
    }

    #[test]
    fn union_keeps_documents_seen_by_only_one_pool() {
        let lexical = vec![(0, 5.0), (1, 4.0)];
        let vector = vec![(2, 0.9), (3, 0.7)];
        let fused = fuse(&lexical, &vector, 0.5, 10);
        assert_eq!(fused.len(), 4);
        for doc in 0..4 {
            assert!(fused.iter().any(|&(d, _)| d == doc), "missing doc {doc}");
        }
    }

    #[test]
    fn document_in_both_pools_outranks_single_pool_peers() {
        let lexical = vec![(0, 5.0), (1, 4.0)];
        let vector = vec![(0, 0.9), (2, 0.8)];
        let fused = fuse(&lexical, &vector, 0.5, 10);
        assert_eq!(fused[0].0, 0);
    }

    #[test]
    fn identical_scores_normalize_to_a_constant() {
        // Zero score range would divide by zero; every score becomes 1.0.
        let lexical = vec![(0, 2.0), (1, 2.0)];
        let fused = fuse(&lexical, &[], 0.0, 10);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].1 - 1.0).abs() < 1e-6);
        assert!((fused[1].1 - 1.0).abs() < 1e-6);
        // Ties fall back to id order.
        assert_eq!(fused[0].0, 0);
    }

    #[test]
    fn empty_pools_fuse_to_nothing() {
        assert!(fuse(&[], &[], 0.5, 10).is_empty());
    }

    #[test]
    fn truncates_to_top_k() {
        let lexical: Vec<(DocId, f32)> = (0..20).map(|i| (i, 20.0 - i as f32)).collect();
        let fused = fuse(&lexical, &[], 0.5, 5);
        assert_eq!(fused.len(), 5);
    }

    #[test]
    fn zero_top_k_yields_empty_results() {
        let lexical = vec![(0, 1.0)];
        assert!(fuse(&lexical, &[], 0.5, 0).is_empty());
    }
}
