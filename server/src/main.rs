use anyhow::{bail, Result};
use clap::Parser;
use engine::provider::{HashProvider, OllamaProvider};
use engine::{EmbeddingProvider, EngineConfig, SearchEngine};
use server::{build_app, load_documents, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Dataset file (JSONL with doc_id, lang, text, optional translation)
    #[arg(long, default_value = "./data/docs.jsonl")]
    dataset: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Embedding backend: "ollama" or "hash"
    #[arg(long, default_value = "ollama")]
    embedder: String,
    /// Base URL of the Ollama instance
    #[arg(long, default_value = "http://localhost:11434")]
    ollama_url: String,
    /// Embedding model name
    #[arg(long, default_value = "snowflake-arctic-embed2")]
    model: String,
    /// Dimension for the hash embedder
    #[arg(long, default_value_t = 384)]
    dimension: usize,
    /// BM25 term-frequency saturation
    #[arg(long, default_value_t = 1.5)]
    k1: f32,
    /// BM25 length-normalization strength
    #[arg(long, default_value_t = 0.75)]
    b: f32,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let provider = build_provider(&args)?;
    let config = EngineConfig {
        k1: args.k1,
        b: args.b,
        ..EngineConfig::default()
    };
    let engine = Arc::new(SearchEngine::new(config)?);

    // Build before the runtime starts so the provider's blocking calls never
    // touch an async worker. A failed build still starts the server: searches
    // answer 503 until a rebuild succeeds.
    match load_documents(&args.dataset).and_then(|docs| {
        let count = docs.len();
        engine.build(docs, provider.as_ref())?;
        Ok(count)
    }) {
        Ok(count) => tracing::info!(docs = count, "initial index build complete"),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "initial build failed; serving without a ready index");
        }
    }

    let state = AppState {
        engine,
        provider,
        dataset: Arc::new(args.dataset.clone()),
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(&args, state))
}

fn build_provider(args: &Args) -> Result<Arc<dyn EmbeddingProvider>> {
    match args.embedder.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(&args.ollama_url, &args.model)?)),
        "hash" => Ok(Arc::new(HashProvider::new(args.dimension)?)),
        other => bail!("unknown embedder `{other}` (expected ollama or hash)"),
    }
}

async fn serve(args: &Args, state: AppState) -> Result<()> {
    let app = build_app(state);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
