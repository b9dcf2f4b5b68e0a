use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::provider::{HashProvider, OllamaProvider};
use engine::{
    evaluate, Document, EmbeddingProvider, EngineConfig, LabeledQuery, SearchEngine, SearchMode,
};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "evaluator")]
#[command(about = "Score the retrieval engine against a labeled query set", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build indexes from a document file and report Recall@k, MRR@k, and
    /// mean latency per retrieval mode
    Run {
        /// Dataset file (JSONL with doc_id, lang, text, optional translation)
        #[arg(long)]
        docs: PathBuf,
        /// Labeled query file (JSONL with query, relevant)
        #[arg(long)]
        queries: PathBuf,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        /// Comma-separated list drawn from: lexical, vector, hybrid
        #[arg(long, default_value = "lexical,vector,hybrid")]
        modes: String,
        /// Fusion weight on the vector score, used by hybrid mode
        #[arg(long, default_value_t = 0.5)]
        alpha: f32,
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
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            docs,
            queries,
            top_k,
            modes,
            alpha,
            embedder,
            ollama_url,
            model,
            dimension,
            k1,
            b,
        } => {
            let provider: Box<dyn EmbeddingProvider> = match embedder.as_str() {
                "ollama" => Box::new(OllamaProvider::new(&ollama_url, &model)?),
                "hash" => Box::new(HashProvider::new(dimension)?),
                other => bail!("unknown embedder `{other}` (expected ollama or hash)"),
            };

            let modes = parse_modes(&modes, alpha)?;
            let documents: Vec<Document> = read_jsonl(&docs)?;
            let query_set: Vec<LabeledQuery> = read_jsonl(&queries)?;
            tracing::info!(
                docs = documents.len(),
                queries = query_set.len(),
                top_k,
                "evaluation input loaded"
            );

            let config = EngineConfig {
                k1,
                b,
                ..EngineConfig::default()
            };
            let engine = SearchEngine::new(config)?;
            engine.build(documents, provider.as_ref())?;

            let reports = evaluate(&engine, provider.as_ref(), &query_set, &modes, top_k)?;

            println!(
                "{:<22} {:>12} {:>12} {:>14}",
                "mode",
                format!("recall@{top_k}"),
                format!("mrr@{top_k}"),
                "mean_latency"
            );
            for report in &reports {
                println!(
                    "{:<22} {:>12.4} {:>12.4} {:>14.2?}",
                    report.mode.to_string(),
                    report.recall_at_k,
                    report.mrr_at_k,
                    report.mean_latency
                );
            }
            Ok(())
        }
    }
}

fn parse_modes(list: &str, alpha: f32) -> Result<Vec<SearchMode>> {
    let mut modes = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alpha = (name == "hybrid").then_some(alpha);
        modes.push(SearchMode::from_parts(name, alpha)?);
    }
    if modes.is_empty() {
        bail!("no retrieval modes selected");
    }
    Ok(modes)
}

/// Read one serde record per line. A malformed record aborts the whole load.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: T = serde_json::from_str(&line)
            .with_context(|| format!("parse record on line {} of {}", number + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}
