//! # docpipe CLI
//!
//! The `docpipe` binary drives the ingestion pipeline: database setup,
//! document registration, processing, status inspection, project-scoped
//! querying, summarization, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docpipe --config ./config/docpipe.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docpipe init` | Create the SQLite database and run schema migrations |
//! | `docpipe add` | Register an uploaded file as a pending document |
//! | `docpipe process <id>` | Run the full pipeline for a document |
//! | `docpipe status <id>` | Show a document's processing status |
//! | `docpipe get <id>` | Show a full document record with extracted text |
//! | `docpipe query "<question>" --project <id>` | Answer a question from a project's documents |
//! | `docpipe summarize <id>` | Summarize a processed document |
//! | `docpipe serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docpipe init
//!
//! # Register and process an uploaded PDF
//! docpipe add --project proj-1 --organization org-1 \
//!   --file-type application/pdf --file-path uploads/brief.pdf
//! docpipe process 4f7c…
//!
//! # Reprocess after a failure (starts over from scratch)
//! docpipe process 4f7c…
//!
//! # Ask a question scoped to one project
//! docpipe query "What is the Q3 budget?" --project proj-1
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docpipe::{config, docs, llm, migrate, pipeline, query, server};

/// docpipe — a project-scoped document ingestion and retrieval pipeline.
#[derive(Parser)]
#[command(
    name = "docpipe",
    about = "docpipe — a project-scoped document ingestion and retrieval pipeline",
    version,
    long_about = "docpipe ingests uploaded documents (extract → chunk → embed → index) and \
    answers project-scoped questions over the indexed content. All settings are read from a \
    TOML configuration file."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docpipe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Register an uploaded file as a pending document.
    ///
    /// Records the file's storage locator and declared MIME type; run
    /// `process` afterwards to ingest it.
    Add {
        /// Owning project id.
        #[arg(long)]
        project: String,

        /// Owning organization id.
        #[arg(long)]
        organization: String,

        /// Declared MIME type (e.g. application/pdf).
        #[arg(long)]
        file_type: String,

        /// Storage locator understood by the configured blob store.
        #[arg(long)]
        file_path: String,

        /// Explicit document id (defaults to a random UUID).
        #[arg(long)]
        id: Option<String>,
    },

    /// Run the ingestion pipeline for a document.
    ///
    /// Fetches the file, extracts text, chunks, embeds, and upserts vectors.
    /// Also the way to reprocess a failed or completed document — the run
    /// starts over from scratch and purges the document's old vectors first.
    Process {
        /// Document id.
        id: String,
    },

    /// Show a document's processing status.
    Status {
        /// Document id.
        id: String,
    },

    /// Show a full document record, including extracted text.
    Get {
        /// Document id.
        id: String,
    },

    /// Answer a question from a project's indexed documents.
    ///
    /// Embeds the question, retrieves the nearest chunks within the project,
    /// and asks the configured chat model for a grounded answer.
    Query {
        /// The question to answer.
        question: String,

        /// Project to scope retrieval to.
        #[arg(long)]
        project: String,

        /// Maximum number of source chunks to retrieve.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Summarize a processed document.
    Summarize {
        /// Document id.
        id: String,

        /// Summary length: short, medium, or long.
        #[arg(long, default_value = "medium")]
        length: String,
    },

    /// Start the HTTP server.
    ///
    /// Exposes processing, status, query, and summarize endpoints on the
    /// configured bind address.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            project,
            organization,
            file_type,
            file_path,
            id,
        } => {
            docs::run_add(&cfg, &project, &organization, &file_type, &file_path, id).await?;
        }
        Commands::Process { id } => {
            pipeline::run_process(&cfg, &id).await?;
        }
        Commands::Status { id } => {
            docs::run_status(&cfg, &id).await?;
        }
        Commands::Get { id } => {
            docs::run_get(&cfg, &id).await?;
        }
        Commands::Query {
            question,
            project,
            limit,
        } => {
            query::run_query(&cfg, &question, &project, limit).await?;
        }
        Commands::Summarize { id, length } => {
            llm::run_summarize(&cfg, &id, &length).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
