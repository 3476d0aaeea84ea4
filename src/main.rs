//! CodeQuery CLI - repository ingestion and question answering.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use codequery::{
    Config, Container, ContainerConfig, IngestionStatus, MetadataRepository, SymbolStore,
    WorkQueue,
};

/// CodeQuery - ask questions about code repositories
#[derive(Parser)]
#[command(name = "codequery")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the data directory
    #[arg(short, long, global = true, default_value = "~/.codequery")]
    data_dir: String,

    /// Use the remote embedder (requires GEMINI_API_KEY)
    #[arg(long, global = true)]
    remote_embeddings: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a repository by URL and wait for the run to finish
    Ingest {
        /// Repository URL, e.g. https://github.com/owner/name
        url: String,

        /// Branch to resolve instead of the default HEAD
        #[arg(short, long)]
        branch: Option<String>,

        /// Mark the repository as private
        #[arg(long)]
        private: bool,
    },

    /// Show the status of an ingestion run
    Status {
        /// Run ID returned by `ingest`
        run_id: String,
    },

    /// Ask a question about an ingested repository
    Query {
        /// The question
        question: String,

        /// Repository ID
        #[arg(short, long)]
        repo: String,

        /// Commit SHA (defaults to the latest indexed commit)
        #[arg(short, long)]
        commit: Option<String>,

        /// Number of chunks to retrieve for semantic context
        #[arg(short, long)]
        top_k: Option<usize>,
    },

    /// List ingested repositories
    List,

    /// Delete a repository and everything derived from it
    Delete {
        /// Repository ID
        repo_id: String,
    },

    /// Show symbol statistics for a repository
    Stats {
        /// Repository ID
        repo_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data_dir = expand_tilde(&cli.data_dir);
    let container = Container::new(ContainerConfig {
        data_dir,
        remote_embeddings: cli.remote_embeddings,
        config: Config::from_env(),
    })
    .await?;

    match cli.command {
        Commands::Ingest { url, branch, private } => {
            let use_case = Arc::new(container.ingest_use_case());
            let receipt = use_case.ingest(&url, branch.as_deref(), private).await?;
            println!("Queued run {} for repository {}", receipt.run_id, receipt.repo_id);

            // Single-binary mode: drain the queued run inline.
            let queue = container.queue();
            let worker = {
                let use_case = Arc::clone(&use_case);
                tokio::spawn(async move { use_case.run_worker().await })
            };
            queue.close();
            worker.await?;

            let run = use_case.status(&receipt.run_id).await?;
            match run.status() {
                IngestionStatus::Completed if run.degraded() => {
                    println!("Run {} completed (degraded: some chunks were not embedded)", receipt.run_id);
                }
                IngestionStatus::Completed => {
                    println!("Run {} completed", receipt.run_id);
                }
                status => {
                    println!(
                        "Run {} finished with status {}{}",
                        receipt.run_id,
                        status.as_str(),
                        run.error().map(|e| format!(": {}", e)).unwrap_or_default()
                    );
                }
            }
        }

        Commands::Status { run_id } => {
            let use_case = container.ingest_use_case();
            let run = use_case.status(&run_id).await?;

            println!("Run:    {}", run.id());
            println!("Repo:   {}", run.repo_id());
            println!("Commit: {}", run.commit_sha());
            println!("Status: {}", run.status().as_str());
            if let Some(stage) = run.stage() {
                println!("Stage:  {}", stage.as_str());
            }
            if run.degraded() {
                println!("Degraded: yes");
            }
            if let Some(error) = run.error() {
                println!("Error:  {}", error);
            }
        }

        Commands::Query {
            question,
            repo,
            commit,
            top_k,
        } => {
            let commit_sha = match commit {
                Some(commit) => commit,
                None => {
                    let repository = container
                        .metadata()
                        .find_repository_by_id(&repo)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("repository {} not found", repo))?;
                    repository
                        .latest_commit_sha()
                        .ok_or_else(|| anyhow::anyhow!("repository {} has no indexed commit", repo))?
                        .to_string()
                }
            };

            let service = container.query_service();
            let result = service.execute(&question, &repo, &commit_sha, top_k).await?;

            println!("[{}] {}\n", result.query_type, result.query);
            println!("{}", result.llm_answer);

            if !result.retrieved_chunks.is_empty() {
                println!("\nSources:");
                for chunk in &result.retrieved_chunks {
                    println!(
                        "  {}:{}-{} (score {:.2})",
                        chunk.file_path, chunk.start_line, chunk.end_line, chunk.score
                    );
                }
            }
        }

        Commands::List => {
            let repositories = container.metadata().list_repositories().await?;
            if repositories.is_empty() {
                println!("No repositories ingested.");
            } else {
                println!("Ingested repositories:\n");
                for repository in repositories {
                    println!("  {} ({})", repository.full_name(), repository.id());
                    match repository.latest_commit_sha() {
                        Some(sha) => println!("    Indexed at commit {}", sha),
                        None => println!("    Not yet indexed"),
                    }
                    println!();
                }
            }
        }

        Commands::Delete { repo_id } => {
            container.delete_use_case().execute(&repo_id).await?;
            println!("Repository deleted.");
        }

        Commands::Stats { repo_id } => {
            let repository = container
                .metadata()
                .find_repository_by_id(&repo_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("repository {} not found", repo_id))?;
            let Some(commit_sha) = repository.latest_commit_sha() else {
                println!("{} has not been indexed yet.", repository.full_name());
                return Ok(());
            };

            let stats = container.symbol_store().stats(&repo_id, commit_sha).await?;
            println!("Symbols in {} at {}:", repository.full_name(), commit_sha);
            let mut total = 0u64;
            for (symbol_type, count) in &stats {
                println!("  {:10} {}", symbol_type, count);
                total += count;
            }
            println!("  {:10} {}", "total", total);
        }
    }

    Ok(())
}

/// Expand ~ to home directory.
fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
