use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tokenizer::tokenize;

/// Capability for turning text into fixed-length embedding vectors.
///
/// Passed explicitly into build and query paths rather than resolved from
/// ambient state, so the engine is testable against a deterministic local
/// implementation. A failing provider surfaces as
/// [`Error::ProviderUnavailable`], never as a zero vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. Order-preserving, same length as the input.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_many(&[text.to_owned()])?;
        batch
            .pop()
            .ok_or_else(|| Error::ProviderUnavailable("provider returned no embedding".into()))
    }
}

/// Embedding client for a local Ollama instance (`/api/embed`).
///
/// One HTTP call embeds a whole batch; the engine chunks the corpus so build
/// latency is dominated by a handful of batched calls instead of one round
/// trip per document.
pub struct OllamaProvider {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_owned(),
        })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "model": self.model, "input": texts }))
            .send()
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::ProviderUnavailable(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }
        let body: EmbedResponse = response
            .json()
            .map_err(|e| Error::ProviderUnavailable(format!("malformed response: {e}")))?;
        if body.embeddings.len() != texts.len() {
            return Err(Error::ProviderUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Deterministic FNV-1a bag-of-tokens embedder.
///
/// Not semantic — it captures lexical overlap only — but it needs no external
/// service, which makes it the test double and the offline fallback. Each
/// token hashes to one dimension with a sign from the hash's high bit; the
/// result is L2-normalized.
pub struct HashProvider {
    dimension: usize,
}

impl HashProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config("hash embedder dimension must be positive".into()));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        for token in tokenize(text) {
            let mut hash = FNV_OFFSET;
            for byte in token.as_bytes() {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
            let idx = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            embedding[idx] += sign;
        }
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

impl EmbeddingProvider for HashProvider {
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embeddings_are_deterministic_and_sized() {
        let provider = HashProvider::new(64).unwrap();
        let a = provider.embed("machine learning systems").unwrap();
        let b = provider.embed("machine learning systems").unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_embeddings_are_unit_length() {
        let provider = HashProvider::new(32).unwrap();
        let v = provider.embed("cat sat on mat").unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn overlapping_texts_are_closer_than_disjoint_ones() {
        let provider = HashProvider::new(128).unwrap();
        let base = provider.embed("rust systems programming").unwrap();
        let near = provider.embed("rust systems language").unwrap();
        let far = provider.embed("pasta cooking recipe").unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&base, &near) > dot(&base, &far));
    }

    #[test]
    fn embed_many_preserves_order_and_length() {
        let provider = HashProvider::new(16).unwrap();
        let texts = vec!["one".to_owned(), "two".to_owned(), "three".to_owned()];
        let batch = provider.embed_many(&texts).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1], provider.embed("two").unwrap());
    }

    #[test]
    fn zero_dimension_is_a_config_error() {
        assert!(matches!(HashProvider::new(0), Err(Error::Config(_))));
    }
}
