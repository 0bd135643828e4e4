//! # ragdesk CLI
//!
//! The `ragdesk` binary runs the HTTP server and exposes the same
//! tenant-scoped operations locally for administration and scripting.
//!
//! ## Usage
//!
//! ```bash
//! ragdesk --config ./config/ragdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdesk init` | Create the SQLite database and run schema migrations |
//! | `ragdesk serve` | Start the HTTP server |
//! | `ragdesk ingest --tenant <t> <file>` | Ingest a PDF or text file for a tenant |
//! | `ragdesk ask --tenant <t> "<question>"` | Answer a question from a tenant's documents |
//! | `ragdesk files --tenant <t>` | List a tenant's uploaded files |
//! | `ragdesk history --tenant <t>` | Show a tenant's question/answer history |
//! | `ragdesk stats` | Summarize the database |
//! | `ragdesk index clear-fault` | Re-enable index writes after a dimension fault |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragdesk::config;
use ragdesk::ingest::Upload;
use ragdesk::migrate;
use ragdesk::server;
use ragdesk::service::RagService;
use ragdesk::stats;
use ragdesk_core::models::TenantId;

/// ragdesk: multi-tenant document ingestion and retrieval-augmented
/// question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragdesk",
    about = "ragdesk: upload documents, ask questions answered from them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Ingest a document for a tenant.
    Ingest {
        /// Tenant that will own the document.
        #[arg(long)]
        tenant: String,

        /// Path to a `.pdf` or `.txt` file.
        file: PathBuf,
    },

    /// Ask a question against a tenant's documents.
    ///
    /// The question and answer are recorded in the tenant's history.
    Ask {
        #[arg(long)]
        tenant: String,

        question: String,
    },

    /// List the files a tenant has uploaded.
    Files {
        #[arg(long)]
        tenant: String,
    },

    /// Show a tenant's question/answer history, oldest first.
    History {
        #[arg(long)]
        tenant: String,
    },

    /// Show database statistics.
    Stats,

    /// Vector index maintenance.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Re-enable writes after an embedding dimension mismatch.
    ///
    /// Fix the embedding configuration first; the next mismatching
    /// write faults the index again.
    ClearFault,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { tenant, file } => {
            let tenant = TenantId::new(tenant)?;
            let bytes = tokio::fs::read(&file).await?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let service = RagService::open(&cfg).await?;
            let result = service
                .submit_document(
                    &tenant,
                    Upload {
                        filename,
                        content_type: None,
                        bytes,
                    },
                )
                .await;
            service.close().await;

            let receipt = result?;
            println!(
                "Ingested {} → document {} ({} chunks)",
                file.display(),
                receipt.document_id,
                receipt.chunk_count
            );
        }
        Commands::Ask { tenant, question } => {
            let tenant = TenantId::new(tenant)?;
            let service = RagService::open(&cfg).await?;
            let result = service.ask(&tenant, &question).await;
            service.close().await;

            let answer = result?;
            println!("{}", answer.text.trim());
            println!();
            if answer.grounded {
                println!("Sources:");
                for (id, score) in answer.chunk_ids.iter().zip(answer.scores.iter()) {
                    println!("  {:.4}  {}", score, id);
                }
            } else {
                println!("(no documents matched; answer is not grounded)");
            }
        }
        Commands::Files { tenant } => {
            let tenant = TenantId::new(tenant)?;
            let service = RagService::open(&cfg).await?;
            let result = service.list_documents(&tenant).await;
            service.close().await;

            let documents = result?;
            if documents.is_empty() {
                println!("No files.");
            }
            for doc in documents {
                println!(
                    "{}  {:<40} {:>5} {:>6} chunks",
                    doc.id,
                    doc.filename,
                    doc.content_type.as_str(),
                    doc.chunk_count
                );
            }
        }
        Commands::History { tenant } => {
            let tenant = TenantId::new(tenant)?;
            let service = RagService::open(&cfg).await?;
            let result = service.list_history(&tenant).await;
            service.close().await;

            let entries = result?;
            if entries.is_empty() {
                println!("No history.");
            }
            for entry in entries {
                println!("Q: {}", entry.question);
                println!("A: {}", entry.answer.trim());
                println!();
            }
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::ClearFault => {
                let service = RagService::open(&cfg).await?;
                let result = service.clear_index_fault().await;
                service.close().await;
                result?;
                println!("Index fault cleared; writes are enabled.");
            }
        },
    }

    Ok(())
}
