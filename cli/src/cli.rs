use std::path::PathBuf;

use clap::{Parser, Subcommand};
use intellidocs_ai::index::IndexStore;
use intellidocs_ai::DocQa;
use intellidocs_core::config::AppConfig;
use intellidocs_core::error::AppError;

use crate::{
    ai_health_check, ask_question, index_status, ingest_files, now_rfc3339_utc, read_uploads,
    remove_document, reset_index, to_json, IngestMode,
};

#[derive(Parser)]
#[command(name = "intellidocs")]
#[command(about = "Ask questions about your PDF documents")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Process PDF files into the document index")]
    Ingest {
        #[arg(required = true, help = "PDF files to process")]
        files: Vec<PathBuf>,

        #[arg(long, help = "Add to the existing index instead of replacing it")]
        append: bool,

        #[arg(
            long,
            conflicts_with = "append",
            help = "Re-embed every chunk, ignoring cached vectors"
        )]
        reprocess: bool,
    },

    #[command(about = "Ask a question about the processed documents")]
    Ask {
        #[arg(help = "The question")]
        question: String,
    },

    #[command(about = "Remove one document from the index")]
    Remove {
        #[arg(help = "Document name as it was ingested")]
        name: String,
    },

    #[command(about = "Show index status")]
    Status,

    #[command(about = "Remove all documents")]
    Reset,

    #[command(about = "Check that the local Ollama endpoint is reachable")]
    Health,
}

/// Execute a command and return its JSON output.
pub fn run(cli: Cli) -> Result<String, AppError> {
    let cfg = AppConfig::load(cli.config.as_deref())?;
    let store = IndexStore::open(cfg.storage.index_dir.clone());

    match cli.command {
        Commands::Status => to_json(&index_status(&store)?),
        Commands::Health => to_json(&ai_health_check(&cfg)?),
        Commands::Ingest {
            files,
            append,
            reprocess,
        } => {
            let mode = if append {
                IngestMode::Append
            } else if reprocess {
                IngestMode::Reprocess
            } else {
                IngestMode::Replace
            };
            let uploads = read_uploads(&files)?;
            let qa = DocQa::with_ollama(cfg)?;
            to_json(&ingest_files(&qa, &store, uploads, mode, &now_rfc3339_utc()?)?)
        }
        Commands::Ask { question } => {
            let qa = DocQa::with_ollama(cfg)?;
            to_json(&ask_question(&qa, &store, &question)?)
        }
        Commands::Remove { name } => {
            let qa = DocQa::with_ollama(cfg)?;
            to_json(&remove_document(&qa, &store, &name, &now_rfc3339_utc()?)?)
        }
        Commands::Reset => {
            let qa = DocQa::with_ollama(cfg)?;
            to_json(&reset_index(&qa, &store)?)
        }
    }
}
