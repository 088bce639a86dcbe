//! CodeSearch CLI - Semantic code search tool.

mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Commands;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use codesearch::{Coordinator, CoordinatorConfig};

/// CodeSearch - Semantic code search powered by embeddings
#[derive(Parser)]
#[command(name = "codesearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the data directory
    #[arg(short, long, global = true, default_value = "~/.codesearch")]
    data_dir: String,

    /// Use a mock embedding service instead of the ONNX model (fast, for tests/demos)
    #[arg(long, global = true)]
    mock_embeddings: bool,

    #[command(subcommand)]
    command: Commands,
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
    std::fs::create_dir_all(&data_dir)?;

    let mut config = CoordinatorConfig::load(&PathBuf::from(&data_dir))
        .await
        .context("loading coordinator config")?;
    config.store.data_dir = data_dir.clone();
    if cli.mock_embeddings {
        config.store.mock_embeddings = true;
    }

    let coordinator = Coordinator::new(config).await?;

    match cli.command {
        Commands::Index { path, name, force } => {
            let repo = coordinator
                .index_repository(&path, name.as_deref(), force)
                .await?;
            println!("Successfully indexed repository: {}", repo.summary());
        }

        Commands::Search {
            query,
            num,
            min_score,
            language,
            repository,
            hybrid,
        } => {
            let repository_id = repository.and_then(|mut ids| ids.pop());
            let outcome = coordinator
                .semantic_search(&query, repository_id.as_deref(), num, hybrid)
                .await?;
            let mut results = outcome.results;

            if outcome.fallback_used {
                println!("(semantic search unavailable, showing content-search results)\n");
            }

            if let Some(score) = min_score {
                results.retain(|r| r.is_relevant(score));
            }
            if let Some(langs) = language {
                results.retain(|r| langs.iter().any(|l| l.eq_ignore_ascii_case(r.chunk().language().as_str())));
            }

            print_results(&results);
        }

        Commands::List => {
            let repos = coordinator.get_status(None).await?;

            if repos.is_empty() {
                println!("No repositories indexed.");
            } else {
                println!("Indexed repositories:\n");
                for repo in repos {
                    println!("  {} ({})", repo.name(), repo.id());
                    println!("    Path: {}", repo.path());
                    println!("    Files: {}, Chunks: {}", repo.file_count(), repo.chunk_count());
                    println!();
                }
            }
        }

        Commands::Delete { id_or_path } => {
            delete_by_id_or_path(&coordinator, &id_or_path).await?;
            println!("Repository deleted successfully.");
        }

        Commands::Stats => {
            let repos = coordinator.get_status(None).await?;

            let total_repos = repos.len();
            let total_files: u64 = repos.iter().map(|r| r.file_count()).sum();
            let total_chunks: u64 = repos.iter().map(|r| r.chunk_count()).sum();

            println!("CodeSearch Statistics");
            println!("=====================");
            println!("Repositories: {}", total_repos);
            println!("Total Files:  {}", total_files);
            println!("Total Chunks: {}", total_chunks);
            println!("Data Dir:     {}", data_dir);
        }

        Commands::Reindex { id_or_path, force } => {
            let repository_id = resolve_repository_id(&coordinator, &id_or_path).await?;
            let repo = coordinator.reindex(&repository_id, force).await?;
            println!("Reindexed repository: {}", repo.summary());
        }

        Commands::Status { repository } => {
            let repos = coordinator.get_status(repository.as_deref()).await?;
            for repo in &repos {
                println!(
                    "{} ({}): generation {}, {}",
                    repo.name(),
                    repo.id(),
                    repo.index_generation(),
                    repo.summary()
                );
            }
        }
    }

    Ok(())
}

fn print_results(results: &[codesearch::SearchResult]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    println!("Found {} results:\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!("{}. {}", i + 1, result.display_line());

        if let Some(name) = result.chunk().symbol_name() {
            println!("   Symbol: {} ({})", name, result.chunk().node_type());
        }

        let preview: String = result
            .chunk()
            .content()
            .lines()
            .take(3)
            .map(|l| format!("   | {}", l))
            .collect::<Vec<_>>()
            .join("\n");
        println!("{}", preview);
        println!();
    }
}

/// Resolve a CLI-supplied `id_or_path` to a repository id, trying an exact
/// id match first (cheap, a single point lookup) before falling back to a
/// path match.
async fn resolve_repository_id(coordinator: &Coordinator, id_or_path: &str) -> Result<String> {
    if let Some(repo) = coordinator.container().list_use_case().get_by_id(id_or_path).await? {
        return Ok(repo.id().to_string());
    }
    let repo = coordinator
        .container()
        .list_use_case()
        .get_by_path(id_or_path)
        .await?
        .with_context(|| format!("no repository matches '{}'", id_or_path))?;
    Ok(repo.id().to_string())
}

async fn delete_by_id_or_path(coordinator: &Coordinator, id_or_path: &str) -> Result<()> {
    let repository_id = resolve_repository_id(coordinator, id_or_path).await?;
    coordinator.deregister_repository(&repository_id).await?;
    Ok(())
}

/// Expand ~ to home directory.
fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
