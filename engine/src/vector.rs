use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::DocId;

/// Flat store of one embedding per document, scanned exactly at query time.
///
/// Dimensionality is fixed by the first embedding seen at build; a mismatch
/// aborts the build rather than truncating or padding. Collection sizes here
/// are small enough that an exact scan beats maintaining an ANN structure.
#[derive(Debug)]
pub struct VectorIndex {
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Build from embeddings indexed by internal id. `doc_ids` runs parallel
    /// to `embeddings` and is only used to name the offending document in a
    /// [`Error::DimensionMismatch`].
    pub fn build(embeddings: Vec<Vec<f32>>, doc_ids: &[String]) -> Result<Self> {
        let dimension = embeddings.first().map_or(0, Vec::len);
        for (idx, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    doc_id: doc_ids.get(idx).cloned().unwrap_or_default(),
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }
        Ok(Self {
            embeddings,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Cosine similarity of the query against every stored embedding.
    /// Sorted descending, ties broken by internal id ascending, truncated to
    /// `top_k`. `top_k == 0` yields an empty vec.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(DocId, f32)> {
        if top_k == 0 || self.embeddings.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(DocId, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(doc, embedding)| (doc as DocId, cosine(query, embedding)))
            .collect();
        ranked.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);
        ranked
    }
}

/// Normalized dot product. A zero-magnitude side scores 0 rather than
/// dividing by zero.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
