use crate::core::cancel::CancellationToken;
use crate::core::error::Result;
use ignore::WalkBuilder;
use std::fs::Metadata;
use std::path::Path;

/// Counters from one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Regular files handed to the visitor
    pub visited: usize,
    /// Entries skipped because of I/O errors or visitor failures
    pub skipped: usize,
    /// Whether the walk stopped early on cancellation
    pub cancelled: bool,
}

/// Visit every regular file under `root`, depth-first.
///
/// Entries within a directory are visited in file-name order. Nothing is
/// filtered: hidden files and ignore files are treated like any other file.
/// Symbolic links are only followed when `follow_links` is set; otherwise a
/// link is not a regular file and is skipped.
///
/// The token is checked before each file. Per-entry failures are logged and
/// skipped, so the walk itself never fails.
pub fn walk_files<F>(
    root: &Path,
    follow_links: bool,
    cancel: &CancellationToken,
    mut visit: F,
) -> WalkSummary
where
    F: FnMut(&Path, &Metadata) -> Result<()>,
{
    let mut summary = WalkSummary::default();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(follow_links)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "can't read entry, skipping");
                summary.skipped += 1;
                continue;
            }
        };

        let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        if cancel.is_cancelled() {
            tracing::debug!(visited = summary.visited, "walk cancelled");
            summary.cancelled = true;
            break;
        }

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "can't read metadata, skipping");
                summary.skipped += 1;
                continue;
            }
        };

        match visit(path, &metadata) {
            Ok(()) => summary.visited += 1,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping file");
                summary.skipped += 1;
            }
        }
    }

    summary
}
