// Core functionality
pub mod core {
    pub mod cancel;
    pub mod config;
    pub mod error;
}

// Data storage
pub mod storage {
    pub mod index;
}

// Filesystem traversal
pub mod indexing {
    pub mod walker;
}

// Query, reconciliation and session orchestration
pub mod search {
    pub mod orchestrator;
    pub mod pattern;
    pub mod query;
    pub mod reconcile;
    pub mod sink;
}

// User interfaces
pub mod ui {
    pub mod cli;
}

// Re-export commonly used types
pub use crate::core::cancel::CancellationToken;
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::indexing::walker::{walk_files, WalkSummary};
pub use crate::search::orchestrator::{
    IndexReport, SearchHandle, SearchTask, Searcher, SessionReport, SessionState,
};
pub use crate::search::pattern::FilenamePattern;
pub use crate::search::query::{Query, QueryEngine};
pub use crate::search::reconcile::{reconcile, StaleSet};
pub use crate::search::sink::{ChannelSink, ResultSink, SearchEvent};
pub use crate::storage::index::{Document, Hit, IndexStore, OpenMode};
pub use crate::ui::cli::Cli;
