//! # ragline CLI
//!
//! The `ragline` binary drives both pipeline paths from the command line:
//! document ingestion (load → chunk → embed → index) and grounded question
//! answering (retrieve → synthesize).
//!
//! ## Usage
//!
//! ```bash
//! ragline --config ./config/ragline.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragline init` | Create the SQLite index schema |
//! | `ragline ingest <path>` | Index a PDF, DOCX, TXT or Markdown document |
//! | `ragline ask "<question>"` | Answer a question from the indexed documents |
//! | `ragline retrieve "<question>"` | Show the passages a question retrieves |
//! | `ragline purge <document_id>` | Delete a document's records |
//! | `ragline check` | Probe the embedding dimension and count index records |
//! | `ragline chunk <path>` | Print the chunk plan for a document (offline) |
//! | `ragline prompt "<question>"` | Print the rendered prompt template (offline) |
//!
//! Provider API keys are read from `GOOGLE_API_KEY`, `OPENAI_API_KEY` and
//! `PINECONE_API_KEY`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use ragline::config::{self, Config};
use ragline::extract::load_document;
use ragline::logging;
use ragline::pipeline::{Pipeline, PipelineError};
use ragline::sqlite_index::SqliteIndex;
use ragline_core::chunk::chunk_text;
use ragline_core::models::{RetrievalResult, SourceMetadata};
use ragline_core::prompt::{render_prompt, PROMPT_VERSION};

/// Retrieval-augmented question answering over your documents.
#[derive(Parser)]
#[command(name = "ragline", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragline.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index storage.
    ///
    /// Creates the SQLite database and its `records` table. Idempotent.
    /// Other backends need no initialization.
    Init,

    /// Load, chunk, embed and index one document.
    Ingest {
        /// Document path (.pdf, .docx, .txt, .md).
        path: PathBuf,

        /// Document identifier. Defaults to the file name.
        #[arg(long)]
        id: Option<String>,

        /// Show the chunk plan without calling any provider.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question grounded on the indexed documents.
    Ask {
        question: String,

        /// Number of passages to retrieve (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<i64>,

        /// Also print the retrieved passages.
        #[arg(long)]
        show_context: bool,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the passages retrieved for a question, with scores.
    Retrieve {
        question: String,

        #[arg(long)]
        top_k: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Delete every record of a document from the index.
    Purge { document_id: String },

    /// Check the embedding dimension and index record count.
    Check,

    /// Print the chunk plan for a document.
    Chunk {
        path: PathBuf,

        #[arg(long)]
        id: Option<String>,
    },

    /// Print the prompt that would be sent for a question with no context.
    Prompt { question: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", describe(&err));
        std::process::exit(1);
    }
}

/// Pipeline failures already name their stage; everything else prints its
/// full context chain.
fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<PipelineError>() {
        Some(p) => p.to_string(),
        None => format!("{:#}", err),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => init(&cfg).await,
        Commands::Ingest { path, id, dry_run } => {
            let document = load_document(&path, id.as_deref())?;
            if dry_run {
                print_chunk_plan(&cfg, &document.id, &document.text)?;
                return Ok(());
            }
            let pipeline = Pipeline::from_config(&cfg).await?;
            let report = pipeline.ingest(&document).await?;
            println!("ingest {}", report.document_id);
            println!("  chunks: {}", report.chunks);
            println!("  records written: {}", report.records_written);
            if let Some(replaced) = report.replaced {
                println!("  records replaced: {}", replaced);
            }
            Ok(())
        }
        Commands::Ask {
            question,
            top_k,
            show_context,
            json,
        } => {
            let pipeline = Pipeline::from_config(&cfg).await?;
            let answer = pipeline.ask(&question, top_k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
                return Ok(());
            }
            println!("{}", answer.text);
            if show_context {
                println!();
                print_passages(&answer.retrieval);
            }
            Ok(())
        }
        Commands::Retrieve {
            question,
            top_k,
            json,
        } => {
            let pipeline = Pipeline::from_config(&cfg).await?;
            let retrieval = pipeline.retrieve(&question, top_k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&retrieval)?);
            } else if retrieval.is_empty() {
                println!("No passages found.");
            } else {
                print_passages(&retrieval);
            }
            Ok(())
        }
        Commands::Purge { document_id } => {
            let pipeline = Pipeline::from_config(&cfg).await?;
            match pipeline.purge(&document_id).await? {
                Some(n) => println!("purged {} records for {}", n, document_id),
                None => println!("purged records for {}", document_id),
            }
            Ok(())
        }
        Commands::Check => {
            let pipeline = Pipeline::from_config(&cfg).await?;
            let diag = pipeline.diagnose().await?;
            println!("embedding model: {}", diag.embedding_model);
            println!("  configured dims: {}", diag.configured_dims);
            println!("  probed dims: {}", diag.probed_dims);
            println!("index backend: {}", diag.index_backend);
            println!("  records: {}", diag.records);
            if !diag.dims_match() {
                bail!(
                    "embedding dimension mismatch: model returns {} but embedding.dims is {}",
                    diag.probed_dims,
                    diag.configured_dims
                );
            }
            println!("ok");
            Ok(())
        }
        Commands::Chunk { path, id } => {
            let document = load_document(&path, id.as_deref())?;
            print_chunk_plan(&cfg, &document.id, &document.text)
        }
        Commands::Prompt { question } => {
            println!("# {}", PROMPT_VERSION);
            println!(
                "{}",
                render_prompt(
                    &question,
                    &RetrievalResult::empty(),
                    &cfg.answer.not_found_message
                )
            );
            Ok(())
        }
    }
}

async fn init(cfg: &Config) -> Result<()> {
    match cfg.index.backend.as_str() {
        "sqlite" => {
            SqliteIndex::open(&cfg.index.path).await?;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        other => println!("Nothing to initialize for backend '{}'", other),
    }
    Ok(())
}

fn print_chunk_plan(cfg: &Config, document_id: &str, text: &str) -> Result<()> {
    let chunks = chunk_text(
        document_id,
        text,
        cfg.chunking.chunk_size,
        cfg.chunking.chunk_overlap,
    )?;
    println!("chunk {} ({} chars)", document_id, text.chars().count());
    println!("  chunks: {}", chunks.len());
    for c in &chunks {
        println!("  [{}] {}..{}", c.chunk_index, c.start_offset, c.end_offset());
    }
    Ok(())
}

fn print_passages(retrieval: &RetrievalResult) {
    for (i, p) in retrieval.iter().enumerate() {
        let source = p
            .metadata
            .as_ref()
            .map(|m: &SourceMetadata| format!("{}#{}", m.document_id, m.chunk_index))
            .unwrap_or_else(|| "-".to_string());
        println!("{}. [{:.4}] {}", i + 1, p.score, source);
        println!("   {}", p.text.replace('\n', " "));
    }
}
