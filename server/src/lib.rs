use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use engine::{Document, EmbeddingProvider, Error, SearchEngine, SearchHit, SearchMode};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_mode")]
    pub mode: String,
    pub alpha: Option<f32>,
}

fn default_k() -> usize {
    10
}

fn default_mode() -> String {
    "lexical".to_string()
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct RebuildResponse {
    pub docs: usize,
    pub took_s: f64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub provider: Arc<dyn EmbeddingProvider>,
    pub dataset: Arc<PathBuf>,
}

/// Read a JSONL dataset file into document records. A malformed or
/// incomplete record aborts the whole load, so no partial corpus is ever
/// handed to the engine.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let file =
        File::open(path).with_context(|| format!("open dataset {}", path.display()))?;
    let mut docs = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(&line)
            .with_context(|| format!("parse dataset record on line {}", number + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/rebuild", post(rebuild_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let mode = SearchMode::from_parts(&params.mode, params.alpha).map_err(into_http)?;
    let started = Instant::now();

    // The provider may block on the embedding service, so the whole search
    // runs off the async workers.
    let engine = Arc::clone(&state.engine);
    let provider = Arc::clone(&state.provider);
    let query = params.q.clone();
    let top_k = params.k;
    let hits = tokio::task::spawn_blocking(move || {
        engine.search(&query, mode, top_k, provider.as_ref())
    })
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
    .map_err(into_http)?;

    Ok(Json(SearchResponse {
        query: params.q,
        mode: params.mode,
        took_s: started.elapsed().as_secs_f64(),
        total_hits: hits.len(),
        results: hits,
    }))
}

/// Re-read the dataset and rebuild both indexes. Searches keep hitting the
/// previous snapshot until the new one swaps in; a second rebuild while one
/// is running gets 409.
pub async fn rebuild_handler(
    State(state): State<AppState>,
) -> Result<Json<RebuildResponse>, (StatusCode, String)> {
    let started = Instant::now();
    let docs = tokio::task::spawn_blocking(move || -> Result<usize, (StatusCode, String)> {
        let docs = load_documents(&state.dataset)
            .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")))?;
        let count = docs.len();
        state
            .engine
            .build(docs, state.provider.as_ref())
            .map_err(into_http)?;
        Ok(count)
    })
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))??;

    Ok(Json(RebuildResponse {
        docs,
        took_s: started.elapsed().as_secs_f64(),
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    UrlPath(doc_id): UrlPath<String>,
) -> Result<Json<Document>, (StatusCode, String)> {
    match state.engine.document(&doc_id) {
        Ok(Some(doc)) => Ok(Json(doc)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("no document with doc_id `{doc_id}`"),
        )),
        Err(err) => Err(into_http(err)),
    }
}

fn into_http(err: Error) -> (StatusCode, String) {
    let status = match err {
        Error::InvalidQuery(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Schema { .. } | Error::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::IndexNotReady => StatusCode::SERVICE_UNAVAILABLE,
        Error::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::RebuildInProgress => StatusCode::CONFLICT,
    };
    (status, err.to_string())
}
