use crate::core::error::Result;
use crate::storage::index::{Hit, IndexStore, WriteSummary};
use std::collections::HashSet;
use std::path::Path;

/// Paths found in the index whose backing file is gone.
///
/// Owned by a single session and emptied by every flush.
#[derive(Debug, Default)]
pub struct StaleSet {
    paths: Vec<String>,
    seen: HashSet<String>,
}

impl StaleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str) {
        if self.seen.insert(path.to_string()) {
            self.paths.push(path.to_string());
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.seen.clear();
    }
}

/// Result of reconciling one batch of hits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub live: usize,
    pub stale: usize,
}

/// Split hits into live matches and stale entries.
///
/// `on_live` sees every hit whose file still exists, in hit order. Missing
/// files go into `stale` and are not reported.
pub fn reconcile<F>(hits: &[Hit], stale: &mut StaleSet, mut on_live: F) -> ReconcileSummary
where
    F: FnMut(&str),
{
    let mut summary = ReconcileSummary::default();

    for hit in hits {
        let path = hit.path();
        if Path::new(path).exists() {
            summary.live += 1;
            on_live(path);
        } else {
            tracing::debug!(path = %path, "stale document");
            summary.stale += 1;
            stale.insert(path);
        }
    }

    summary
}

/// Delete every stale path in one writer transaction, then clear the set.
///
/// The set is cleared even if the commit fails; a later session finds the
/// same stale entries again.
pub fn flush_stale(store: &IndexStore, stale: &mut StaleSet) -> Result<WriteSummary> {
    if stale.is_empty() {
        return Ok(WriteSummary::default());
    }

    let mut writer = store.writer();
    for path in stale.iter() {
        writer.delete(path);
    }
    stale.clear();

    writer.close()
}
