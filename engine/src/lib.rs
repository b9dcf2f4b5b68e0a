//! Multilingual hybrid retrieval engine.
//!
//! Builds a BM25 inverted index and a flat embedding index over a document
//! collection, scores queries under each, and fuses the two rankings into
//! one. Embedding generation is an external capability passed in through the
//! [`EmbeddingProvider`] trait. An [`eval`] harness scores the engine against
//! labeled query sets.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod eval;
pub mod fusion;
pub mod lexical;
pub mod provider;
pub mod tokenizer;
pub mod vector;

pub use config::EngineConfig;
pub use document::Document;
pub use engine::{SearchEngine, SearchHit, SearchMode};
pub use error::{Error, Result};
pub use eval::{evaluate, LabeledQuery, ModeReport};
pub use provider::EmbeddingProvider;

/// Internal document id: the position of a document within one build.
/// Assigned in `doc_id` order, so sorting by `DocId` sorts by `doc_id`.
pub type DocId = u32;
