use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::document::{self, Document};
use crate::error::{Error, Result};
use crate::fusion;
use crate::lexical::LexicalIndex;
use crate::provider::EmbeddingProvider;
use crate::tokenizer::tokenize;
use crate::vector::VectorIndex;
use crate::DocId;

/// Documents per `embed_many` call during a build. Provider round trips are
/// the dominant build cost, so the corpus goes over in large batches.
const EMBED_BATCH: usize = 64;

/// Which scoring model a search runs under. The fusion weight exists exactly
/// when the mode is hybrid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    Lexical,
    Vector,
    Hybrid { alpha: f32 },
}

impl SearchMode {
    /// Resolve the wire form: a mode name plus an alpha that is required for
    /// `hybrid` and rejected otherwise.
    pub fn from_parts(mode: &str, alpha: Option<f32>) -> Result<Self> {
        match (mode, alpha) {
            ("lexical", None) => Ok(Self::Lexical),
            ("vector", None) => Ok(Self::Vector),
            ("hybrid", Some(alpha)) => Ok(Self::Hybrid { alpha }),
            ("hybrid", None) => Err(Error::InvalidQuery("hybrid mode requires alpha".into())),
            ("lexical" | "vector", Some(_)) => Err(Error::InvalidQuery(format!(
                "alpha is only valid for hybrid mode, not `{mode}`"
            ))),
            (other, _) => Err(Error::InvalidQuery(format!(
                "unknown mode `{other}` (expected lexical, vector, or hybrid)"
            ))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => f.write_str("lexical"),
            Self::Vector => f.write_str("vector"),
            Self::Hybrid { alpha } => write!(f, "hybrid(alpha={alpha})"),
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub rank: usize,
    pub score: f32,
    pub lang: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// One immutable build product. Searchers clone an `Arc` to it and keep
/// scoring against it even while a rebuild publishes a successor.
struct IndexSnapshot {
    docs: Vec<Document>,
    by_doc_id: HashMap<String, DocId>,
    lexical: LexicalIndex,
    vector: VectorIndex,
}

/// The retrieval engine: one owning slot holding the current index snapshot,
/// updated only by a completed build.
///
/// Searches are read-only and run concurrently with each other and with an
/// in-flight build; the only mutation is the pointer swap after a build
/// succeeds, so no reader ever sees a half-populated index. A failed build
/// leaves the previous snapshot untouched.
pub struct SearchEngine {
    config: EngineConfig,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    build_gate: Mutex<()>,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            current: RwLock::new(None),
            build_gate: Mutex::new(()),
        })
    }

    /// Whether a build has completed since construction.
    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Documents in the currently visible snapshot, 0 before the first build.
    pub fn doc_count(&self) -> usize {
        self.current.read().as_ref().map_or(0, |s| s.docs.len())
    }

    /// Build both indexes from scratch and atomically swap the new snapshot
    /// in. Only one build may be in flight at a time; a second request is
    /// rejected with [`Error::RebuildInProgress`] rather than interleaved.
    pub fn build(&self, mut docs: Vec<Document>, provider: &dyn EmbeddingProvider) -> Result<()> {
        let _guard = self
            .build_gate
            .try_lock()
            .ok_or(Error::RebuildInProgress)?;

        document::validate_corpus(&docs)?;
        // Internal ids follow doc_id order, so every id-ascending tie-break
        // downstream is a doc_id-ascending tie-break.
        docs.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));

        let started = Instant::now();
        let token_docs: Vec<Vec<String>> = docs.iter().map(|d| tokenize(&d.text)).collect();
        let lexical = LexicalIndex::build(&token_docs, self.config.k1, self.config.b);

        let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBED_BATCH) {
            let batch = provider.embed_many(chunk)?;
            if batch.len() != chunk.len() {
                return Err(Error::ProviderUnavailable(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    batch.len()
                )));
            }
            embeddings.extend(batch);
        }

        let doc_ids: Vec<String> = docs.iter().map(|d| d.doc_id.clone()).collect();
        let vector = VectorIndex::build(embeddings, &doc_ids)?;

        let by_doc_id = doc_ids
            .into_iter()
            .enumerate()
            .map(|(idx, id)| (id, idx as DocId))
            .collect();
        let snapshot = Arc::new(IndexSnapshot {
            docs,
            by_doc_id,
            lexical,
            vector,
        });

        tracing::info!(
            docs = snapshot.docs.len(),
            dimension = snapshot.vector.dimension(),
            took_s = started.elapsed().as_secs_f64(),
            "index build complete"
        );
        *self.current.write() = Some(snapshot);
        Ok(())
    }

    /// Run a query under the given mode and return up to `top_k` hits with
    /// 1-based ranks. The provider is consulted only for vector and hybrid
    /// modes, so a down provider never breaks lexical search.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        top_k: usize,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("empty query text".into()));
        }
        if top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be positive".into()));
        }
        if let SearchMode::Hybrid { alpha } = mode {
            if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
                return Err(Error::InvalidQuery(format!(
                    "alpha must be in [0, 1], got {alpha}"
                )));
            }
        }

        let snapshot = self.current.read().clone().ok_or(Error::IndexNotReady)?;

        let ranked = match mode {
            SearchMode::Lexical => snapshot.lexical.search(&tokenize(query), top_k),
            SearchMode::Vector => {
                let embedding = self.query_embedding(&snapshot, query, provider)?;
                snapshot.vector.search(&embedding, top_k)
            }
            SearchMode::Hybrid { alpha } => {
                let pool = self.config.pool_size(top_k);
                let lexical = snapshot.lexical.search(&tokenize(query), pool);
                let embedding = self.query_embedding(&snapshot, query, provider)?;
                let vector = snapshot.vector.search(&embedding, pool);
                fusion::fuse(&lexical, &vector, alpha, top_k)
            }
        };

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(idx, (doc, score))| {
                let record = &snapshot.docs[doc as usize];
                SearchHit {
                    doc_id: record.doc_id.clone(),
                    rank: idx + 1,
                    score,
                    lang: record.lang.clone(),
                    text: record.text.clone(),
                    translation: record.translation.clone(),
                }
            })
            .collect())
    }

    /// Look up a single document by external id in the current snapshot.
    pub fn document(&self, doc_id: &str) -> Result<Option<Document>> {
        let guard = self.current.read();
        let snapshot = guard.as_ref().ok_or(Error::IndexNotReady)?;
        Ok(snapshot
            .by_doc_id
            .get(doc_id)
            .map(|&doc| snapshot.docs[doc as usize].clone()))
    }

    fn query_embedding(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<f32>> {
        let embedding = provider.embed(query)?;
        let expected = snapshot.vector.dimension();
        if expected != 0 && embedding.len() != expected {
            return Err(Error::ProviderUnavailable(format!(
                "query embedding has dimension {}, index expects {expected}",
                embedding.len()
            )));
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HashProvider;

    fn doc(id: &str, text: &str) -> Document {
        Document {
            doc_id: id.into(),
            lang: "en".into(),
            text: text.into(),
            translation: None,
        }
    }

    fn ready_engine() -> (SearchEngine, HashProvider) {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        let provider = HashProvider::new(64).unwrap();
        engine
            .build(
                vec![doc("d1", "cat sat on mat"), doc("d2", "dog ran in park")],
                &provider,
            )
            .unwrap();
        (engine, provider)
    }

    #[test]
    fn search_before_first_build_is_index_not_ready() {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        let provider = HashProvider::new(64).unwrap();
        let err = engine
            .search("cat", SearchMode::Lexical, 5, &provider)
            .unwrap_err();
        assert!(matches!(err, Error::IndexNotReady));
    }

    #[test]
    fn invalid_inputs_are_rejected_before_touching_the_index() {
        let (engine, provider) = ready_engine();
        assert!(matches!(
            engine.search("  ", SearchMode::Lexical, 5, &provider),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            engine.search("cat", SearchMode::Lexical, 0, &provider),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            engine.search("cat", SearchMode::Hybrid { alpha: 1.5 }, 5, &provider),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn hits_carry_one_based_ranks_and_metadata() {
        let (engine, provider) = ready_engine();
        let hits = engine
            .search("cat", SearchMode::Lexical, 5, &provider)
            .unwrap();
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[0].doc_id, "d1");
        assert_eq!(hits[0].lang, "en");
        assert_eq!(hits[0].text, "cat sat on mat");
    }

    #[test]
    fn failed_build_keeps_the_previous_snapshot_searchable() {
        let (engine, provider) = ready_engine();

        struct DownProvider;
        impl EmbeddingProvider for DownProvider {
            fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(Error::ProviderUnavailable("connection refused".into()))
            }
        }

        let err = engine
            .build(vec![doc("d9", "new corpus")], &DownProvider)
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));

        // The old snapshot still serves searches.
        let hits = engine
            .search("cat", SearchMode::Lexical, 5, &provider)
            .unwrap();
        assert_eq!(hits[0].doc_id, "d1");
        assert_eq!(engine.doc_count(), 2);
    }

    #[test]
    fn concurrent_rebuild_is_rejected() {
        use std::sync::mpsc;

        let engine = Arc::new(SearchEngine::new(EngineConfig::default()).unwrap());

        // A provider that parks until released, holding the build gate open.
        struct BlockingProvider {
            entered: mpsc::Sender<()>,
            release: Mutex<mpsc::Receiver<()>>,
        }
        impl EmbeddingProvider for BlockingProvider {
            fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                self.entered.send(()).ok();
                self.release.lock().recv().ok();
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let provider = Arc::new(BlockingProvider {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        });

        let background = {
            let engine = Arc::clone(&engine);
            let provider = Arc::clone(&provider);
            std::thread::spawn(move || engine.build(vec![doc("d1", "cat")], provider.as_ref()))
        };

        // Wait for the first build to reach the provider, then race it.
        entered_rx.recv().unwrap();
        let second = engine.build(vec![doc("d2", "dog")], provider.as_ref());
        assert!(matches!(second, Err(Error::RebuildInProgress)));

        release_tx.send(()).unwrap();
        background.join().unwrap().unwrap();
        assert!(engine.is_ready());
    }

    #[test]
    fn mode_parsing_requires_alpha_exactly_for_hybrid() {
        assert_eq!(SearchMode::from_parts("lexical", None).unwrap(), SearchMode::Lexical);
        assert_eq!(SearchMode::from_parts("vector", None).unwrap(), SearchMode::Vector);
        assert!(matches!(
            SearchMode::from_parts("hybrid", Some(0.3)).unwrap(),
            SearchMode::Hybrid { .. }
        ));
        assert!(SearchMode::from_parts("hybrid", None).is_err());
        assert!(SearchMode::from_parts("lexical", Some(0.3)).is_err());
        assert!(SearchMode::from_parts("fuzzy", None).is_err());
    }

    #[test]
    fn schema_violation_aborts_the_build() {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        let provider = HashProvider::new(16).unwrap();
        let err = engine
            .build(vec![doc("d1", "cat"), doc("d1", "dog")], &provider)
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
        assert!(!engine.is_ready());
    }
}
