use std::cmp::Ordering;
use std::collections::HashMap;

use crate::DocId;

/// A single entry in a term's postings list.
#[derive(Debug, Clone)]
struct Posting {
    doc: DocId,
    tf: u32,
}

/// Inverted index with BM25 scoring.
///
/// Document frequency is the length of a term's postings list; corpus
/// statistics are recomputed wholesale on every build so postings and
/// statistics can never drift apart.
pub struct LexicalIndex {
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: Vec<u32>,
    doc_count: u32,
    avgdl: f32,
    k1: f32,
    b: f32,
}

impl LexicalIndex {
    /// Build the index from tokenized documents, indexed by internal id.
    pub fn build(token_docs: &[Vec<String>], k1: f32, b: f32) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(token_docs.len());
        let mut total_len: u64 = 0;

        for (doc, tokens) in token_docs.iter().enumerate() {
            doc_lengths.push(tokens.len() as u32);
            total_len += tokens.len() as u64;

            let mut tf: HashMap<&str, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            for (term, tf) in tf {
                postings.entry(term.to_string()).or_default().push(Posting {
                    doc: doc as DocId,
                    tf,
                });
            }
        }

        let doc_count = token_docs.len() as u32;
        let avgdl = if doc_count == 0 || total_len == 0 {
            1.0
        } else {
            total_len as f32 / doc_count as f32
        };

        tracing::debug!(
            docs = doc_count,
            terms = postings.len(),
            avgdl,
            "lexical index built"
        );

        Self {
            postings,
            doc_lengths,
            doc_count,
            avgdl,
            k1,
            b,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Number of distinct documents containing `term`.
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.postings.get(term).map_or(0, |p| p.len() as u32)
    }

    /// BM25 search over the postings of the query terms only — documents
    /// sharing no term with the query are never touched. Query duplicates
    /// count: a term appearing twice contributes twice.
    ///
    /// Results are sorted by score descending, ties broken by internal id
    /// ascending (equal to `doc_id` order). An empty query or `top_k == 0`
    /// yields an empty vec.
    pub fn search(&self, query_tokens: &[String], top_k: usize) -> Vec<(DocId, f32)> {
        if top_k == 0 || query_tokens.is_empty() || self.doc_count == 0 {
            return Vec::new();
        }

        let mut query_tf: HashMap<&str, u32> = HashMap::new();
        for token in query_tokens {
            *query_tf.entry(token.as_str()).or_insert(0) += 1;
        }

        let n = self.doc_count as f32;
        let mut scores: HashMap<DocId, f32> = HashMap::new();

        for (term, qf) in query_tf {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let dl = self.doc_lengths[posting.doc as usize] as f32;
                let tf = posting.tf as f32;
                let tf_norm =
                    (tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * dl / self.avgdl));
                *scores.entry(posting.doc).or_insert(0.0) += qf as f32 * idf * tf_norm;
            }
        }

        let mut ranked: Vec<(DocId, f32)> = scores.into_iter().collect();
        ranked.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);
        ranked
    }
}
