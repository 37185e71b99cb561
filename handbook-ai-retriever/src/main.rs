use clap::{Parser, Subcommand};
use handbook_ai_embed::{EmbedConfig, FastEmbedProvider, FastEmbedReranker, RerankConfig};
use handbook_ai_retriever::retrieval::{
    builder::{BuildConfig, IndexBuilder},
    retriever::{GroundingOutcome, Retriever, RetrieverConfig},
    vector_index::VectorIndex,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Build and query the handbook retrieval index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index from a source document
    Build {
        /// Source document (PDF, or plain text/markdown)
        #[arg(long)]
        document: PathBuf,
        /// Index base path; artifacts land at <base>.vectors / <base>.chunks
        #[arg(long, default_value = "handbook")]
        index: PathBuf,
        /// Maximum chunk size in characters
        #[arg(long, default_value_t = 600)]
        chunk_size: usize,
        /// Overlap between consecutive chunks in characters
        #[arg(long, default_value_t = 100)]
        chunk_overlap: usize,
        /// Embedding model name
        #[arg(long, default_value = "all-MiniLM-L6-v2")]
        embedding_model: String,
    },
    /// Ask a question against a built index
    Query {
        /// The question to ground in the handbook
        question: String,
        /// Number of passages to return
        #[arg(short, long, default_value_t = 3)]
        k: usize,
        /// Index base path
        #[arg(long, default_value = "handbook")]
        index: PathBuf,
        /// First-stage candidate pool size
        #[arg(long, default_value_t = 30)]
        broad_n: usize,
        /// Embedding model name (must match the one the index was built with)
        #[arg(long, default_value = "all-MiniLM-L6-v2")]
        embedding_model: String,
        /// Reranker model name
        #[arg(long, default_value = "bge-reranker-base")]
        reranker_model: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Build {
            document,
            index,
            chunk_size,
            chunk_overlap,
            embedding_model,
        } => {
            let embedder =
                Arc::new(FastEmbedProvider::create(EmbedConfig::new(embedding_model)).await?);
            let config = BuildConfig::default()
                .with_chunk_size(chunk_size)
                .with_chunk_overlap(chunk_overlap);

            let report = IndexBuilder::new(embedder, config)
                .build_index(&document, &index)
                .await?;

            println!(
                "Indexed {} chunks (dimension {})",
                report.chunks, report.dimension
            );
            println!("  vectors: {}", report.vector_path.display());
            println!("  chunks:  {}", report.chunk_path.display());
            Ok(())
        }
        Commands::Query {
            question,
            k,
            index,
            broad_n,
            embedding_model,
            reranker_model,
        } => {
            let loaded = VectorIndex::load(&index)?;
            let embedder =
                Arc::new(FastEmbedProvider::create(EmbedConfig::new(embedding_model)).await?);
            let reranker =
                Arc::new(FastEmbedReranker::create(RerankConfig::new(reranker_model)).await?);

            let retriever = Retriever::new(
                loaded,
                embedder,
                reranker,
                RetrieverConfig::default().with_broad_n(broad_n),
            )?;

            match retriever.ground_question(&question, k).await? {
                GroundingOutcome::Passages(passages) => {
                    for (i, passage) in passages.iter().enumerate() {
                        println!("--- passage {} ---", i + 1);
                        println!("{passage}");
                    }
                }
                GroundingOutcome::Empty => {
                    println!("No matching passages found in the handbook.");
                }
            }
            Ok(())
        }
    }
}
