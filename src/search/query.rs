use crate::core::error::Result;
use crate::search::pattern::FilenamePattern;
use crate::storage::index::{Hit, IndexStore, SearchPredicate};
use std::path::{Path, PathBuf};

/// A search session's query: filename pattern scoped to a folder
#[derive(Debug, Clone)]
pub struct Query {
    pattern: FilenamePattern,
    target_folder: PathBuf,
}

impl Query {
    pub fn new(pattern: FilenamePattern, target_folder: impl Into<PathBuf>) -> Self {
        Self {
            pattern,
            target_folder: target_folder.into(),
        }
    }

    pub fn pattern(&self) -> &FilenamePattern {
        &self.pattern
    }

    pub fn target_folder(&self) -> &Path {
        &self.target_folder
    }

    /// `filename MATCHES pattern AND path STARTS-WITH target_folder`
    pub fn predicate(&self) -> SearchPredicate<'_> {
        SearchPredicate {
            filename: &self.pattern,
            path_prefix: &self.target_folder,
        }
    }
}

/// Runs queries against the index, bounded to the top `k` hits
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine {
    top_k: usize,
}

impl QueryEngine {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Execute `query` on a fresh reader, closed again before returning
    pub fn execute(&self, store: &IndexStore, query: &Query) -> Result<Vec<Hit>> {
        let reader = store.reader();
        let hits = reader.search(&query.predicate(), self.top_k);
        reader.close();

        let hits = hits?;
        tracing::debug!(
            pattern = %query.pattern().source(),
            folder = %query.target_folder().display(),
            hits = hits.len(),
            "query executed"
        );
        Ok(hits)
    }
}
