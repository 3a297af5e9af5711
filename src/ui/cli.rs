use clap::{Parser, Subcommand};

/// filescout - Incremental filename search over a local index
#[derive(Parser, Debug)]
#[command(name = "filescout")]
#[command(about = "A lightweight, local-first incremental filename search engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Custom base directory (default: ~/.filescout)
    #[arg(long, global = true)]
    pub base_dir: Option<String>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize filescout (create the index directory)
    Init,
    /// Search for files by name under a folder
    Search {
        /// Folder to search in
        folder: String,
        /// Filename pattern; `*` matches any run of characters
        pattern: Option<String>,
        /// Maximum number of hits per index query
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Match filenames case-insensitively
        #[arg(short, long)]
        ignore_case: bool,
        /// Follow symbolic links while walking
        #[arg(long)]
        follow_links: bool,
        /// Discard the existing index before reindexing
        #[arg(long)]
        rebuild: bool,
    },
    /// Index a folder without searching, pruning deleted files
    Index {
        /// Folder to index
        folder: String,
        /// Follow symbolic links while walking
        #[arg(long)]
        follow_links: bool,
    },
    /// Show index statistics
    Stats,
}
