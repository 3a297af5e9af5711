use super::error::{Error, Result};
use crate::storage::index::OpenMode;
use std::path::PathBuf;

/// Default cap on ranked hits returned by a single query
pub const DEFAULT_TOP_K: usize = 100;

/// Configuration for filescout
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for filescout data
    pub base_dir: PathBuf,
    /// Directory holding the persistent index
    pub index_dir: PathBuf,
    /// Path to the index database file
    pub index_path: PathBuf,
    /// Maximum number of hits a query returns
    pub top_k: usize,
    /// Whether filename patterns are matched case-sensitively
    pub case_sensitive: bool,
    /// Whether the walker follows symbolic links
    pub follow_links: bool,
    /// How the reindex phase opens the index
    pub open_mode: OpenMode,
}

impl Config {
    /// Get the default configuration directory
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
            .map(|home| home.join(".filescout"))
    }

    /// Create a new configuration
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.unwrap_or_else(|| {
            Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".filescout"))
        });
        let index_dir = base_dir.join("index");

        Ok(Self {
            index_path: index_dir.join("documents.redb"),
            index_dir,
            base_dir,
            top_k: DEFAULT_TOP_K,
            case_sensitive: true,
            follow_links: false,
            open_mode: OpenMode::CreateOrAppend,
        })
    }

    /// Use an explicit index file instead of the one under `base_dir`
    pub fn with_index_path(mut self, index_path: impl Into<PathBuf>) -> Self {
        self.index_path = index_path.into();
        if let Some(parent) = self.index_path.parent() {
            self.index_dir = parent.to_path_buf();
        }
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn with_open_mode(mut self, open_mode: OpenMode) -> Self {
        self.open_mode = open_mode;
        self
    }

    /// Initialize the configuration directories
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(&self.index_dir)?;
        Ok(())
    }

    /// Check if the configuration is already initialized
    pub fn is_initialized(&self) -> bool {
        self.base_dir.exists() && self.index_dir.exists()
    }
}
