use chrono::Utc;
use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand};
use patent_search_core::config::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_INDEX_NAME, DEFAULT_OLLAMA_URL, DEFAULT_OPENSEARCH_URL,
};
use patent_search_core::{
    check_system, index_folder, Hit, IngestionOptions, OllamaEmbedder, OpenSearchStore, Retriever,
    SearchConfig, SearchMode, Termination,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PREVIEW_CHARS: usize = 300;

#[derive(Parser)]
#[command(name = "patent-search", version, about = "Search ingested patent PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args)]
struct ConnectionArgs {
    /// OpenSearch base URL
    #[arg(long, global = true, env = "PATENT_SEARCH_OPENSEARCH_URL", default_value = DEFAULT_OPENSEARCH_URL)]
    opensearch_url: String,

    /// OpenSearch index holding the patent chunks
    #[arg(long, global = true, env = "PATENT_SEARCH_INDEX", default_value = DEFAULT_INDEX_NAME)]
    index: String,

    /// Ollama base URL used for embeddings
    #[arg(long, global = true, env = "PATENT_SEARCH_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Ollama embedding model
    #[arg(long, global = true, env = "PATENT_SEARCH_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "PATENT_SEARCH_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Split, embed and index every PDF in a folder (replaces the index).
    Ingest {
        /// Folder containing the PDFs.
        #[arg(long)]
        folder: String,
        /// Chunk size in characters.
        #[arg(long, default_value_t = IngestionOptions::default().chunk_size)]
        chunk_size: usize,
        /// Characters shared between consecutive chunks.
        #[arg(long, default_value_t = IngestionOptions::default().chunk_overlap)]
        chunk_overlap: usize,
    },
    /// Run one keyword, semantic or hybrid search.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// keyword, semantic or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: SearchMode,
        /// Number of hits to return (defaults to 20).
        #[arg(long, env = "PATENT_SEARCH_TOP_K", value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize))]
        top_k: Option<usize>,
    },
    /// Iterative keyword search that grows the query from each round's top hit.
    Explore {
        /// Initial query
        #[arg(long)]
        query: String,
        /// Number of refinement rounds (defaults to 3).
        #[arg(long, env = "PATENT_SEARCH_STEPS")]
        steps: Option<usize>,
        /// Hits requested per round (defaults to 20).
        #[arg(long, env = "PATENT_SEARCH_TOP_K", value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize))]
        top_k: Option<usize>,
    },
    /// Check OpenSearch, Ollama and the embedding model.
    Status,
}

impl ConnectionArgs {
    fn into_config(self) -> SearchConfig {
        SearchConfig {
            opensearch_url: self.opensearch_url,
            index_name: self.index,
            ollama_url: self.ollama_url,
            embedding_model: self.embedding_model,
            timeout_secs: self.timeout_secs,
            ..SearchConfig::default()
        }
    }
}

impl Command {
    fn apply_overrides(&self, config: &mut SearchConfig) {
        match self {
            Command::Search { top_k, .. } => {
                if let Some(top_k) = top_k {
                    config.top_k = *top_k;
                }
            }
            Command::Explore { steps, top_k, .. } => {
                if let Some(steps) = steps {
                    config.refinement_steps = *steps;
                }
                if let Some(top_k) = top_k {
                    config.top_k = *top_k;
                }
            }
            Command::Ingest { .. } | Command::Status => {}
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = cli.connection.into_config();
    cli.command.apply_overrides(&mut config);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        index = %config.index_name,
        "patent-search boot"
    );

    let store = OpenSearchStore::from_config(&config)?;
    let embedder = OllamaEmbedder::from_config(&config)?;

    match cli.command {
        Command::Ingest {
            folder,
            chunk_size,
            chunk_overlap,
        } => {
            let options = IngestionOptions {
                chunk_size,
                chunk_overlap,
            };
            let summary = index_folder(Path::new(&folder), options, &embedder, &store).await?;

            if summary.skipped_files > 0 {
                warn!(skipped = summary.skipped_files, folder = %folder, "some pdfs were skipped");
            }
            println!(
                "{} chunks from {} document(s) indexed into '{}' (dimension {}) at {}",
                summary.chunks,
                summary.documents,
                config.index_name,
                summary.dimension,
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, mode, .. } => {
            let retriever = Retriever::new(store, embedder);
            let outcome = retriever.retrieve(mode, &query, config.top_k).await;

            if let Some(fault) = outcome.fault() {
                eprintln!("warning: {mode} search degraded ({fault})");
            }
            let hits = outcome.into_hits();
            println!("Results for '{query}' ({mode}): {} found", hits.len());
            print_hits(&hits);
        }
        Command::Explore { query, .. } => {
            let steps = config.refinement_steps;
            let retriever = Retriever::new(store, embedder);
            let report = retriever.iterate(&query, steps, config.top_k).await;

            for round in &report.rounds {
                println!(
                    "round {}: {} hit(s), {} new | query: {}",
                    round.round + 1,
                    round.hit_count,
                    round.new_hits,
                    round.query
                );
            }
            match &report.termination {
                Termination::NoSteps => println!("no refinement steps requested"),
                Termination::StepsExhausted => println!("stopped after {steps} round(s)"),
                Termination::EmptyRound { round } => {
                    println!("stopped early: round {} returned no hits", round + 1)
                }
                Termination::Fault { round, fault } => {
                    eprintln!("warning: stopped at round {} ({fault})", round + 1)
                }
            }

            println!("Total results: {}", report.hits.len());
            print_hits(&report.hits);
        }
        Command::Status => {
            let status = check_system(&store, &embedder).await;

            match &status.opensearch {
                Ok(health) => {
                    println!(
                        "OpenSearch OK | cluster: {} | version: {}",
                        health.cluster.cluster_name, health.cluster.version
                    );
                    for index in &health.indices {
                        println!(
                            "  - {}: {} docs",
                            index.name,
                            index.docs_count.as_deref().unwrap_or("?")
                        );
                    }
                }
                Err(error) => println!("OpenSearch failed: {error}"),
            }
            match &status.ollama_models {
                Ok(models) => println!("Ollama OK | models: {}", models.join(", ")),
                Err(error) => println!("Ollama check failed: {error}"),
            }
            match &status.embedding_dimension {
                Ok(dimension) => println!("Embedding OK | dim = {dimension}"),
                Err(error) => println!("Embedding error: {error}"),
            }

            if !status.is_healthy() {
                anyhow::bail!("one or more components are unavailable");
            }
        }
    }

    Ok(())
}

fn print_hits(hits: &[Hit]) {
    for (position, hit) in hits.iter().enumerate() {
        println!(
            "{}. File: {} | Chunk: {} | score={:.4}",
            position + 1,
            hit.source_file,
            hit.chunk_index,
            hit.score
        );
        println!("   Text: {}", hit.preview(PREVIEW_CHARS));
        println!("{}", "-".repeat(50));
    }
}
