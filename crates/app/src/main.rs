mod http;

use chrono::Utc;
use clap::{Parser, Subcommand};
use guideline_search_core::{
    build_corpus, format_clinical_answer, format_search_results, AnnIndexConfig, BuildOptions,
    CharacterNgramEmbedder, ChunkingConfig, Embedder, HttpEmbedder, SearchContext, SearchOptions,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "guideline-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the chunk, metadata, and vector-index artifacts.
    #[arg(
        long,
        global = true,
        default_value = "processed_guidelines",
        env = "GUIDELINE_ARTIFACT_DIR"
    )]
    artifact_dir: PathBuf,

    /// Embedding dimensions for the offline embedder.
    #[arg(long, global = true, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, embed, and index a folder of guideline PDFs.
    Build {
        /// Folder containing PDFs, searched recursively.
        #[arg(long)]
        folder: PathBuf,
        #[arg(long, default_value = "800")]
        window_words: usize,
        #[arg(long, default_value = "100")]
        overlap_words: usize,
    },
    /// Semantic search across the indexed corpus.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "10")]
        top_k: usize,
        /// Skip synonym-based query expansion.
        #[arg(long, default_value_t = false)]
        no_expand: bool,
        /// Restrict results to documents whose id contains this value.
        #[arg(long)]
        document: Option<String>,
    },
    /// Clinical-question search with recognized terms and per-document grouping.
    Clinical {
        #[arg(long)]
        question: String,
        #[arg(long, default_value = "8")]
        top_k: usize,
    },
    /// Chunks most similar to an already indexed chunk.
    Similar {
        #[arg(long)]
        chunk_id: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// List indexed documents.
    Documents,
    /// Page, chunk, and section counts for one document.
    Summary {
        #[arg(long)]
        document_id: String,
    },
    /// Serve the retrieval API over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value = "5000", env = "PORT")]
        port: u16,
    },
}

fn select_embedder(dimensions: usize) -> anyhow::Result<Box<dyn Embedder + Send + Sync>> {
    if let Some(remote) = HttpEmbedder::from_env()? {
        info!("using remote embedding backend");
        return Ok(Box::new(remote));
    }
    Ok(Box::new(CharacterNgramEmbedder { dimensions }))
}

fn load_context(
    artifact_dir: &Path,
    embedder: Box<dyn Embedder + Send + Sync>,
) -> anyhow::Result<SearchContext> {
    Ok(SearchContext::load(
        artifact_dir,
        embedder,
        AnnIndexConfig::default(),
    )?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "guideline-search boot"
    );

    let embedder = select_embedder(cli.embedding_dimensions)?;

    match cli.command {
        Command::Build {
            folder,
            window_words,
            overlap_words,
        } => {
            let options = BuildOptions {
                chunking: ChunkingConfig {
                    window_words,
                    overlap_words,
                },
                index: AnnIndexConfig::default(),
            };
            let report = build_corpus(&folder, &cli.artifact_dir, &options, embedder.as_ref())?;

            for skipped in &report.skipped {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
            }
            println!(
                "{} chunks from {} documents indexed into {}",
                report.chunks,
                report.documents,
                cli.artifact_dir.display()
            );
        }
        Command::Search {
            query,
            top_k,
            no_expand,
            document,
        } => {
            let context = load_context(&cli.artifact_dir, embedder)?;
            let results = context.search(
                &query,
                &SearchOptions {
                    top_k,
                    expand: !no_expand,
                    filter_document: document,
                },
            )?;
            println!("{}", format_search_results(&results, &query));
        }
        Command::Clinical { question, top_k } => {
            let context = load_context(&cli.artifact_dir, embedder)?;
            let answer = context.clinical_question_search(&question, top_k)?;
            println!("{}", format_clinical_answer(&answer));
        }
        Command::Similar { chunk_id, top_k } => {
            let context = load_context(&cli.artifact_dir, embedder)?;
            let results = context.find_similar(&chunk_id, top_k)?;
            if results.is_empty() {
                println!("No similar chunks found for '{chunk_id}'");
            }
            for hit in results {
                println!(
                    "[{:.3}] {} (Page {}, {})",
                    hit.relevance_score,
                    hit.chunk.chunk_id,
                    hit.chunk.page_number,
                    hit.chunk.section_title
                );
            }
        }
        Command::Documents => {
            let context = load_context(&cli.artifact_dir, embedder)?;
            let mut documents: Vec<_> = context.documents().collect();
            documents.sort_by(|left, right| left.document_id.cmp(&right.document_id));
            for meta in documents {
                println!(
                    "{}: {} pages, {} chunks ({})",
                    meta.document_id, meta.total_pages, meta.total_chunks, meta.source_filename
                );
            }
        }
        Command::Summary { document_id } => {
            let context = load_context(&cli.artifact_dir, embedder)?;
            match context.document_summary(&document_id) {
                Some(summary) => {
                    println!(
                        "{}: {} pages, {} chunks",
                        summary.document_id, summary.total_pages, summary.total_chunks
                    );
                    for section in summary.sections {
                        println!("  {}: {} chunks", section.section_title, section.chunks);
                    }
                }
                None => println!("Unknown document: {document_id}"),
            }
        }
        Command::Serve { bind, port } => {
            let context = load_context(&cli.artifact_dir, embedder)?;
            // The rest of the pipeline is synchronous; only serving needs a
            // runtime, and block_in_place requires the multi-threaded one.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(http::serve(context, &bind, port))?;
        }
    }

    Ok(())
}
