//! Search sessions.
//!
//! A session runs `Idle → QueryOld → ReconcileOld → Reindexing → QueryFresh
//! → ReconcileFresh → Done` on its own worker thread. The first query
//! streams whatever the existing index already knows, the walk refreshes the
//! index and streams new matches as it finds them, and the second query picks
//! up anything the walk skipped, including files a cancelled walk never
//! reached. Both query passes purge stale records.
//!
//! Every phase opens its own index handle and closes it before the next
//! phase starts.

use crate::core::cancel::CancellationToken;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::indexing::walker::walk_files;
use crate::search::pattern::FilenamePattern;
use crate::search::query::{Query, QueryEngine};
use crate::search::reconcile::{flush_stale, reconcile, StaleSet};
use crate::search::sink::{DedupSink, ResultSink};
use crate::storage::index::{Document, IndexStore, OpenMode};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Where a session is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    QueryOld,
    ReconcileOld,
    Reindexing,
    QueryFresh,
    ReconcileFresh,
    Done,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

/// What a finished session did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub state: SessionState,
    /// Distinct paths delivered to the sink
    pub delivered: usize,
    /// Documents committed by the reindex phase
    pub indexed: usize,
    /// Files the walk could not index
    pub skipped: usize,
    /// Stale documents deleted from the index
    pub stale_removed: usize,
    /// Reason passed to `on_failure`, if the session failed
    pub failure: Option<String>,
}

impl SessionReport {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            delivered: 0,
            indexed: 0,
            skipped: 0,
            stale_removed: 0,
            failure: None,
        }
    }
}

/// What a standalone reindex did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub pruned: usize,
    pub cancelled: bool,
}

/// Entry point for searches against one index location.
///
/// Sessions started from the same `Searcher` take turns on the index: each
/// phase holds the searcher's lock for as long as its store handle is open.
#[derive(Debug, Clone)]
pub struct Searcher {
    config: Config,
    lock: Arc<Mutex<()>>,
}

impl Searcher {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prepare a session without starting it.
    ///
    /// An empty or absent search string yields a task that completes
    /// immediately without touching the index or the filesystem.
    pub fn task<S: ResultSink>(
        &self,
        target_folder: &Path,
        search: Option<&str>,
        sink: S,
    ) -> Result<SearchTask<S>> {
        let query = FilenamePattern::compile(search, self.config.case_sensitive)?
            .map(|pattern| Query::new(pattern, absolute_folder(target_folder)));

        Ok(SearchTask {
            query,
            config: self.config.clone(),
            lock: Arc::clone(&self.lock),
            cancel: CancellationToken::new(),
            sink: DedupSink::new(sink),
            stale: StaleSet::new(),
            report: SessionReport::new(),
        })
    }

    /// Start a session on a worker thread
    pub fn start<S>(&self, target_folder: &Path, search: Option<&str>, sink: S) -> Result<SearchHandle>
    where
        S: ResultSink + Send + 'static,
    {
        self.task(target_folder, search, sink)?.spawn()
    }

    /// Walk `target_folder` into the index, then drop every indexed path
    /// under it whose file no longer exists.
    ///
    /// Index-open failures are returned; everything else is logged.
    pub fn reindex(&self, target_folder: &Path, cancel: &CancellationToken) -> Result<IndexReport> {
        let target = absolute_folder(target_folder);
        let mut report = IndexReport::default();

        let _guard = lock_index(&self.lock);
        let store = IndexStore::open(&self.config.index_path, self.config.open_mode)?;

        let mut writer = store.writer();
        let walk = walk_files(&target, self.config.follow_links, cancel, |path, metadata| {
            writer.upsert(Document::from_metadata(path, metadata)?);
            Ok(())
        });
        report.skipped = walk.skipped;
        report.cancelled = walk.cancelled;
        match writer.close() {
            Ok(summary) => report.indexed = summary.upserted,
            Err(e) => tracing::warn!(error = %e, "failed to commit reindexed documents"),
        }

        if report.cancelled {
            return Ok(report);
        }

        let paths = match store.reader().paths_under(&target) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list indexed documents");
                return Ok(report);
            }
        };
        let mut stale = StaleSet::new();
        for path in paths.iter().filter(|p| !Path::new(p.as_str()).exists()) {
            stale.insert(path);
        }
        match flush_stale(&store, &mut stale) {
            Ok(summary) => report.pruned = summary.deleted,
            Err(e) => tracing::warn!(error = %e, "failed to prune stale documents"),
        }

        tracing::info!(
            folder = %target.display(),
            indexed = report.indexed,
            skipped = report.skipped,
            pruned = report.pruned,
            "folder indexed"
        );
        Ok(report)
    }
}

/// One search session, run either inline with [`SearchTask::run`] or on a
/// worker thread with [`SearchTask::spawn`].
pub struct SearchTask<S> {
    query: Option<Query>,
    config: Config,
    lock: Arc<Mutex<()>>,
    cancel: CancellationToken,
    sink: DedupSink<S>,
    stale: StaleSet,
    report: SessionReport,
}

impl<S: ResultSink> SearchTask<S> {
    /// Use an externally owned token instead of the task's own
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the whole session on the calling thread
    pub fn run(mut self) -> SessionReport {
        let query = match self.query.take() {
            Some(query) => query,
            None => {
                tracing::debug!("empty search string, nothing to do");
                self.transition(SessionState::Done);
                self.sink.complete();
                return self.report;
            }
        };

        tracing::info!(
            pattern = %query.pattern().source(),
            folder = %query.target_folder().display(),
            "search started"
        );

        match self.run_phases(&query) {
            Ok(()) => {
                let terminal = if self.cancel.is_cancelled() {
                    SessionState::Cancelled
                } else {
                    SessionState::Done
                };
                self.transition(terminal);
                self.report.delivered = self.sink.delivered();
                self.sink.complete();
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(error = %reason, "search failed");
                self.transition(SessionState::Failed);
                self.report.delivered = self.sink.delivered();
                self.report.failure = Some(reason.clone());
                self.sink.fail(&reason);
            }
        }

        tracing::info!(
            state = ?self.report.state,
            delivered = self.report.delivered,
            indexed = self.report.indexed,
            stale_removed = self.report.stale_removed,
            "search finished"
        );
        self.report
    }

    /// Run the session on a dedicated worker thread
    pub fn spawn(self) -> Result<SearchHandle>
    where
        S: Send + 'static,
    {
        let cancel = self.cancel.clone();
        let worker = thread::Builder::new()
            .name("filescout-search".to_string())
            .spawn(move || self.run())?;

        Ok(SearchHandle { cancel, worker })
    }

    /// Only index-open failures escape as errors.
    ///
    /// Once the session has started, cancellation only cuts the walk short.
    /// Both query passes and their stale flushes still run.
    fn run_phases(&mut self, query: &Query) -> Result<()> {
        if self.stop_requested() {
            return Ok(());
        }
        self.transition(SessionState::QueryOld);
        self.query_and_reconcile(query)?;
        self.transition(SessionState::ReconcileOld);
        self.flush()?;

        self.transition(SessionState::Reindexing);
        self.reindex(query)?;

        self.transition(SessionState::QueryFresh);
        self.query_and_reconcile(query)?;
        self.transition(SessionState::ReconcileFresh);
        self.flush()?;

        Ok(())
    }

    fn query_and_reconcile(&mut self, query: &Query) -> Result<()> {
        let hits = {
            let _guard = lock_index(&self.lock);
            let store = IndexStore::open(&self.config.index_path, OpenMode::CreateOrAppend)?;
            match QueryEngine::new(self.config.top_k).execute(&store, query) {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(error = %e, "query failed, treating as no hits");
                    Vec::new()
                }
            }
        };

        let sink = &mut self.sink;
        let summary = reconcile(&hits, &mut self.stale, |path| {
            sink.deliver(path);
        });
        tracing::debug!(live = summary.live, stale = summary.stale, "hits reconciled");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.stale.is_empty() {
            return Ok(());
        }

        let _guard = lock_index(&self.lock);
        let store = IndexStore::open(&self.config.index_path, OpenMode::CreateOrAppend)?;
        match flush_stale(&store, &mut self.stale) {
            Ok(summary) => {
                self.report.stale_removed += summary.deleted;
                tracing::debug!(deleted = summary.deleted, "stale documents removed");
            }
            Err(e) => tracing::warn!(error = %e, "failed to remove stale documents"),
        }
        Ok(())
    }

    fn reindex(&mut self, query: &Query) -> Result<()> {
        let _guard = lock_index(&self.lock);
        let store = IndexStore::open(&self.config.index_path, self.config.open_mode)?;
        let mut writer = store.writer();

        let pattern = query.pattern();
        let sink = &mut self.sink;
        let walk = walk_files(
            query.target_folder(),
            self.config.follow_links,
            &self.cancel,
            |path, metadata| {
                let doc = Document::from_metadata(path, metadata)?;
                let matched = pattern.is_match(&doc.filename);
                let doc_path = doc.path.clone();
                writer.upsert(doc);
                if matched {
                    sink.deliver(&doc_path);
                }
                Ok(())
            },
        );

        self.report.skipped += walk.skipped;
        match writer.close() {
            Ok(summary) => {
                self.report.indexed += summary.upserted;
                if summary.dropped > 0 {
                    tracing::warn!(dropped = summary.dropped, "some documents were not indexed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to commit reindexed documents"),
        }

        tracing::info!(
            visited = walk.visited,
            skipped = walk.skipped,
            cancelled = walk.cancelled,
            "folder walked"
        );
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            tracing::debug!(state = ?self.report.state, "cancellation requested, stopping");
        }
        cancelled
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.report.state, to = ?next, "session state");
        self.report.state = next;
    }
}

/// Handle on a session running on a worker thread
#[derive(Debug)]
pub struct SearchHandle {
    cancel: CancellationToken,
    worker: JoinHandle<SessionReport>,
}

impl SearchHandle {
    /// Cut the walk short. A session already past its first query still
    /// runs the second one before it ends.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the session to end
    pub fn join(self) -> Result<SessionReport> {
        self.worker
            .join()
            .map_err(|_| Error::Worker("search worker panicked".to_string()))
    }
}

fn lock_index(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

// Index keys are absolute; fall back to the given path if it can't be resolved.
fn absolute_folder(folder: &Path) -> PathBuf {
    fs::canonicalize(folder).unwrap_or_else(|_| folder.to_path_buf())
}
