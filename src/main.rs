use anyhow::{bail, Context, Result};
use clap::Parser;
use filescout::ui::cli::{Cli, Commands};
use filescout::{
    CancellationToken, ChannelSink, Config, IndexStore, OpenMode, SearchEvent, Searcher,
    SessionState,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::new(cli.base_dir.as_deref().map(PathBuf::from))?;

    match cli.command {
        Commands::Init => handle_init(&config),
        Commands::Search {
            folder,
            pattern,
            limit,
            ignore_case,
            follow_links,
            rebuild,
        } => {
            let open_mode = if rebuild {
                OpenMode::Create
            } else {
                OpenMode::CreateOrAppend
            };
            let config = config
                .with_top_k(limit)
                .with_case_sensitive(!ignore_case)
                .with_follow_links(follow_links)
                .with_open_mode(open_mode);
            handle_search(config, Path::new(&folder), pattern.as_deref()).await
        }
        Commands::Index {
            folder,
            follow_links,
        } => handle_index(config.with_follow_links(follow_links), PathBuf::from(folder)).await,
        Commands::Stats => handle_stats(&config),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "filescout=debug"
    } else {
        "filescout=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn ensure_initialized(config: &Config) -> Result<()> {
    if !config.is_initialized() {
        bail!("filescout is not initialized. Run 'filescout init' first.");
    }
    Ok(())
}

fn handle_init(config: &Config) -> Result<()> {
    if config.is_initialized() {
        println!("filescout is already initialized at: {}", config.base_dir.display());
        return Ok(());
    }

    config.init().context("failed to create filescout directories")?;
    println!("✓ Created configuration directory: {}", config.base_dir.display());
    println!("✓ Created index directory: {}", config.index_dir.display());
    println!("\nNext: filescout search /path/to/folder '*.txt'");

    Ok(())
}

async fn handle_search(config: Config, folder: &Path, pattern: Option<&str>) -> Result<()> {
    ensure_initialized(&config)?;

    let searcher = Searcher::new(config);
    let (sink, mut rx) = ChannelSink::new();
    let handle = searcher
        .start(folder, pattern, sink)
        .context("failed to start search")?;

    let mut failure = None;
    let mut found = 0usize;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(SearchEvent::Match(path)) => {
                    found += 1;
                    println!("{}", path);
                }
                Some(SearchEvent::Failure(reason)) => {
                    failure = Some(reason);
                    break;
                }
                Some(SearchEvent::Complete) | None => break,
            },
            _ = tokio::signal::ctrl_c(), if !handle.cancellation_token().is_cancelled() => {
                eprintln!("Cancelling search...");
                handle.cancel();
            }
        }
    }

    let report = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("search worker task failed")??;

    if let Some(reason) = failure {
        bail!("search failed: {}", reason);
    }

    match report.state {
        SessionState::Cancelled => eprintln!("\nSearch cancelled. {} files found.", found),
        _ => eprintln!("\n{} files found.", found),
    }
    if report.stale_removed > 0 {
        eprintln!("  Removed from index (deleted): {}", report.stale_removed);
    }
    if report.skipped > 0 {
        eprintln!("  Skipped (unreadable): {}", report.skipped);
    }

    Ok(())
}

async fn handle_index(config: Config, folder: PathBuf) -> Result<()> {
    ensure_initialized(&config)?;

    let searcher = Searcher::new(config);
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();
    let mut worker =
        tokio::task::spawn_blocking(move || searcher.reindex(&folder, &worker_cancel));

    let joined = tokio::select! {
        result = &mut worker => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling indexing...");
            cancel.cancel();
            worker.await
        }
    };
    let report = joined.context("index worker task failed")??;

    println!("Indexing {}!", if report.cancelled { "cancelled" } else { "complete" });
    println!("  Indexed: {} files", report.indexed);
    if report.pruned > 0 {
        println!("  Removed (deleted): {} files", report.pruned);
    }
    if report.skipped > 0 {
        println!("  Skipped: {} files", report.skipped);
    }

    Ok(())
}

fn handle_stats(config: &Config) -> Result<()> {
    ensure_initialized(config)?;

    if !config.index_path.exists() {
        println!("Index is empty ({})", config.index_path.display());
        return Ok(());
    }

    let store = IndexStore::open(&config.index_path, OpenMode::CreateOrAppend)
        .context("failed to open index")?;
    let documents = store.reader().len()?;
    println!("Index: {}", config.index_path.display());
    println!("  Documents: {}", documents);

    Ok(())
}
