#![allow(dead_code)]

use filescout::{CancellationToken, Config, IndexStore, OpenMode, ResultSink, Searcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Everything a sink was told during a session
#[derive(Debug, Default, Clone)]
pub struct SinkLog {
    pub matches: Vec<String>,
    pub completed: usize,
    pub failures: Vec<String>,
}

/// Records notifications; can cancel a session on its first match
#[derive(Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    cancel_on_match: Option<CancellationToken>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            log: Arc::default(),
            cancel_on_match: Some(token),
        }
    }

    pub fn log(&self) -> SinkLog {
        self.log.lock().unwrap().clone()
    }

    pub fn sorted_matches(&self) -> Vec<String> {
        let mut matches = self.log().matches;
        matches.sort();
        matches
    }
}

impl ResultSink for RecordingSink {
    fn on_match(&mut self, path: &str) {
        self.log.lock().unwrap().matches.push(path.to_string());
        if let Some(token) = &self.cancel_on_match {
            token.cancel();
        }
    }

    fn on_complete(&mut self) {
        self.log.lock().unwrap().completed += 1;
    }

    fn on_failure(&mut self, reason: &str) {
        self.log.lock().unwrap().failures.push(reason.to_string());
    }
}

/// A scratch area with a canonical folder to search and a searcher whose
/// index lives next to it
pub struct Fixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub searcher: Searcher,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    pub fn with_config(adjust: impl FnOnce(Config) -> Config) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(&root).unwrap();
        let root = std::fs::canonicalize(&root).unwrap();

        let config = Config::new(Some(temp_dir.path().join("scout"))).unwrap();
        let searcher = Searcher::new(adjust(config));

        Self {
            temp_dir,
            root,
            searcher,
        }
    }

    /// Create a file (and its parent directories) under the root
    pub fn touch(&self, relative: &str) -> PathBuf {
        let path = self.root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, relative).unwrap();
        path
    }

    pub fn index_path(&self) -> &Path {
        &self.searcher.config().index_path
    }

    /// All indexed paths under `prefix`; the store is closed again on return
    pub fn indexed_under(&self, prefix: &Path) -> Vec<String> {
        let store = IndexStore::open(self.index_path(), OpenMode::CreateOrAppend).unwrap();
        let paths = store.reader().paths_under(prefix).unwrap();
        paths
    }

    pub fn index_len(&self) -> u64 {
        let store = IndexStore::open(self.index_path(), OpenMode::CreateOrAppend).unwrap();
        let len = store.reader().len().unwrap();
        len
    }

    /// Run a session inline, returning its report and what the sink saw
    pub fn search(&self, pattern: &str) -> (filescout::SessionReport, RecordingSink) {
        self.search_in(&self.root, pattern)
    }

    pub fn search_in(&self, folder: &Path, pattern: &str) -> (filescout::SessionReport, RecordingSink) {
        let sink = RecordingSink::new();
        let report = self
            .searcher
            .task(folder, Some(pattern), sink.clone())
            .unwrap()
            .run();
        (report, sink)
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}
