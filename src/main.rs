use std::error::Error;
use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kb_store::{KbConfig, KnowledgeBase, SearchRequest};
use serde_json::json;
use tracing::Level;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "kb-search", about = "Index and query a Markdown knowledge base")]
struct Cli {
    /// Debug-level logs from the knowledge-base crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild every Markdown file under the given directories.
    Full {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Re-index changed files, from git status or an explicit list.
    Changed {
        /// Repository whose working-tree changes should be indexed.
        #[arg(long, conflicts_with = "paths")]
        git: Option<PathBuf>,
        paths: Vec<PathBuf>,
    },
    /// Index (or re-index) a single file.
    File { path: PathBuf },
    /// Index a JSON array of chunks read from stdin.
    Chunks,
    /// Delete all chunks of a document.
    Delete { doc_id: String },
    /// Delete all chunks from one source repository.
    DeleteSource { repo: String },
    /// Collection counters and indexed documents.
    Status,
    /// Drop the whole collection.
    Drop,
    /// Hybrid search.
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
        /// Directory segment to search in, e.g. `runbook`.
        #[arg(long)]
        scope: Option<String>,
    },
    /// Full-text search over chunk text.
    Keyword {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(embed_service::telemetry::env_filter_with_level("warn", level))
        .with(embed_service::telemetry::layer())
        .init();

    let cfg = KbConfig::from_env()?;
    let default_top_k = cfg.search.top_k;
    let default_min_score = cfg.search.min_score;
    let kb = KnowledgeBase::new(cfg)?;

    let out = match cli.command {
        Command::Full { dirs } => serde_json::to_value(kb.index_full(&dirs).await?)?,
        Command::Changed { git: Some(repo), .. } => {
            serde_json::to_value(kb.index_git_changes(repo).await?)?
        }
        Command::Changed { git: None, paths } => {
            serde_json::to_value(kb.index_changed(&paths).await?)?
        }
        Command::File { path } => json!({ "path": path, "chunks": kb.index_file(&path).await? }),
        Command::Chunks => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            serde_json::to_value(kb.index_chunks_json(input.trim()).await?)?
        }
        Command::Delete { doc_id } => {
            kb.delete_doc(&doc_id).await?;
            json!({ "deleted": doc_id })
        }
        Command::DeleteSource { repo } => {
            json!({ "source_repo": repo, "deleted": kb.delete_by_source(&repo).await? })
        }
        Command::Status => serde_json::to_value(kb.status().await?)?,
        Command::Drop => {
            kb.drop_collection().await?;
            json!({ "dropped": kb.config().collection })
        }
        Command::Search {
            query,
            top_k,
            min_score,
            scope,
        } => {
            let mut req = SearchRequest::new(query, top_k.unwrap_or(default_top_k));
            req.min_score = min_score.or(default_min_score);
            req.scope = scope;
            let resp = kb.search(&req).await;
            serde_json::to_value(resp)?
        }
        Command::Keyword { query, top_k } => {
            serde_json::to_value(kb.keyword_search(&query, top_k).await?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
