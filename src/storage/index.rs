use crate::core::error::{Error, Result};
use crate::search::pattern::FilenamePattern;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Table definition for indexed documents
/// Key: absolute file path
/// Value: JSON serialized Document
const DOCUMENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("documents");

/// Store-wide counters
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

// Next insertion sequence number, used to break ranking ties.
const META_NEXT_SEQ_KEY: &str = "next_seq";

/// How an index is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start from an empty index, discarding any existing records
    Create,
    /// Keep existing records, creating the index if it does not exist
    CreateOrAppend,
}

/// One indexed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Absolute path, unique key in the index
    pub path: String,
    /// Base name, matched against search patterns
    pub filename: String,
    /// Last modification time in milliseconds since the Unix epoch
    pub modified: u64,
    /// Insertion sequence number assigned by the store
    #[serde(default)]
    pub seq: u64,
}

impl Document {
    /// Create a new document
    pub fn new(path: impl Into<String>, filename: impl Into<String>, modified: u64) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            modified,
            seq: 0,
        }
    }

    /// Build a document for a file from its metadata
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Ok(Self::new(path_str, filename, modified))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Database(format!("Failed to serialize document: {}", e)))
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Database(format!("Failed to deserialize document: {}", e)))
    }

    /// Rebuild a document from its index key alone, for records whose value
    /// can't be decoded. It sorts after every real insertion.
    fn recovered(path: &str) -> Option<Self> {
        let filename = Path::new(path).file_name()?.to_str()?;
        Some(Self {
            seq: u64::MAX,
            ..Self::new(path, filename, 0)
        })
    }
}

/// Conjunctive search predicate: filename pattern AND path prefix
#[derive(Debug, Clone, Copy)]
pub struct SearchPredicate<'a> {
    pub filename: &'a FilenamePattern,
    pub path_prefix: &'a Path,
}

/// A ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub document: Document,
    pub score: f32,
}

impl Hit {
    pub fn path(&self) -> &str {
        &self.document.path
    }
}

/// Best first: higher score, then earlier insertion
fn rank(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then(a.document.seq.cmp(&b.document.seq))
}

// Heap entry ordered by rank, so the heap's maximum is the weakest hit.
struct Ranked(Hit);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank(&self.0, &other.0)
    }
}

/// Outcome of committing a writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub upserted: usize,
    pub deleted: usize,
    /// Mutations that failed and were left out of the commit
    pub dropped: usize,
}

#[derive(Debug)]
enum Mutation {
    Upsert(Document),
    Delete(String),
}

/// Persistent document index
pub struct IndexStore {
    db: Database,
    location: PathBuf,
}

impl IndexStore {
    /// Open or create the index at `location`
    pub fn open(location: &Path, mode: OpenMode) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if location.exists() {
            Database::open(location).map_err(|e| {
                let msg = e.to_string();
                if msg.to_lowercase().contains("lock") || msg.to_lowercase().contains("already open") {
                    Error::Database(
                        "Index is locked. Another filescout session may be using it.".to_string(),
                    )
                } else {
                    Error::Database(format!("Failed to open index: {}", e))
                }
            })?
        } else {
            Database::create(location)
                .map_err(|e| Error::Database(format!("Failed to create index: {}", e)))?
        };

        // Initialize tables (safe even if they already exist)
        let write_txn = db.begin_write().map_err(|e| {
            Error::Database(format!("Failed to begin write transaction: {}", e))
        })?;
        if mode == OpenMode::Create {
            write_txn.delete_table(DOCUMENTS_TABLE).map_err(|e| {
                Error::Database(format!("Failed to clear documents: {}", e))
            })?;
            tracing::debug!(location = %location.display(), "index opened in create mode, existing documents discarded");
        }
        {
            let _documents = write_txn.open_table(DOCUMENTS_TABLE).map_err(|e| {
                Error::Database(format!("Failed to open table: {}", e))
            })?;
            let _meta = write_txn.open_table(META_TABLE).map_err(|e| {
                Error::Database(format!("Failed to open table: {}", e))
            })?;
        }
        write_txn.commit().map_err(|e| {
            Error::Database(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(Self {
            db,
            location: location.to_path_buf(),
        })
    }

    /// Location of the index on disk
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Start buffering mutations. Nothing is visible until the writer is closed.
    pub fn writer(&self) -> IndexWriter<'_> {
        IndexWriter {
            store: self,
            pending: Vec::new(),
        }
    }

    /// Open a read handle on the committed state of the index
    pub fn reader(&self) -> IndexReader<'_> {
        IndexReader { store: self }
    }
}

/// Buffered write handle. `close` commits every mutation in one transaction.
pub struct IndexWriter<'a> {
    store: &'a IndexStore,
    pending: Vec<Mutation>,
}

impl IndexWriter<'_> {
    /// Insert a document, replacing any record with the same path
    pub fn upsert(&mut self, doc: Document) {
        self.pending.push(Mutation::Upsert(doc));
    }

    /// Remove the record for `path`; absent paths are ignored
    pub fn delete(&mut self, path: impl Into<String>) {
        self.pending.push(Mutation::Delete(path.into()));
    }

    /// Number of mutations waiting for `close`
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Commit all buffered mutations.
    ///
    /// A mutation that fails is logged and left out; the rest still commit.
    pub fn close(self) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        if self.pending.is_empty() {
            return Ok(summary);
        }

        let write_txn = self.store.db.begin_write().map_err(|e| {
            Error::Database(format!("Failed to begin write transaction: {}", e))
        })?;

        {
            let mut documents = write_txn.open_table(DOCUMENTS_TABLE).map_err(|e| {
                Error::Database(format!("Failed to open table: {}", e))
            })?;
            let mut meta = write_txn.open_table(META_TABLE).map_err(|e| {
                Error::Database(format!("Failed to open table: {}", e))
            })?;

            let mut next_seq = meta
                .get(META_NEXT_SEQ_KEY)
                .map_err(|e| Error::Database(format!("Failed to read sequence: {}", e)))?
                .map(|guard| guard.value())
                .unwrap_or(0);

            for mutation in self.pending {
                match mutation {
                    Mutation::Upsert(mut doc) => {
                        doc.seq = next_seq;
                        let json_str = match doc.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::warn!(path = %doc.path, error = %e, "dropping document");
                                summary.dropped += 1;
                                continue;
                            }
                        };
                        match documents.insert(doc.path.as_str(), json_str.as_str()) {
                            Ok(_) => {
                                next_seq += 1;
                                summary.upserted += 1;
                                tracing::trace!(path = %doc.path, "upserted");
                            }
                            Err(e) => {
                                tracing::warn!(path = %doc.path, error = %e, "failed to upsert document");
                                summary.dropped += 1;
                            }
                        }
                    }
                    Mutation::Delete(path) => match documents.remove(path.as_str()) {
                        Ok(Some(_)) => {
                            summary.deleted += 1;
                            tracing::trace!(path = %path, "deleted");
                        }
                        Ok(None) => tracing::trace!(path = %path, "not indexed, nothing to delete"),
                        Err(e) => {
                            tracing::warn!(path = %path, error = %e, "failed to delete document");
                            summary.dropped += 1;
                        }
                    },
                }
            }

            meta.insert(META_NEXT_SEQ_KEY, next_seq).map_err(|e| {
                Error::Database(format!("Failed to store sequence: {}", e))
            })?;
        }

        write_txn.commit().map_err(|e| {
            Error::Database(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(summary)
    }
}

/// Read handle. Every call reads the latest committed state.
pub struct IndexReader<'a> {
    store: &'a IndexStore,
}

impl IndexReader<'_> {
    /// Ranked search, at most `k` hits.
    ///
    /// Hits are ordered by score, highest first; ties go to the earlier
    /// insertion. Only the best `k` are held while scanning. A record that
    /// can't be decoded is logged and matched on its key, so the caller can
    /// still reconcile it.
    pub fn search(&self, predicate: &SearchPredicate<'_>, k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let prefix = predicate
            .path_prefix
            .to_str()
            .ok_or_else(|| Error::InvalidPath(predicate.path_prefix.display().to_string()))?;

        let read_txn = self.store.db.begin_read().map_err(|e| {
            Error::Database(format!("Failed to begin read transaction: {}", e))
        })?;
        let table = read_txn.open_table(DOCUMENTS_TABLE).map_err(|e| {
            Error::Database(format!("Failed to open table: {}", e))
        })?;

        let mut best = BinaryHeap::new();

        // Keys are sorted, so everything sharing the string prefix is contiguous
        for item in table.range(prefix..).map_err(|e| {
            Error::Database(format!("Failed to iterate table: {}", e))
        })? {
            let (key, value) = item.map_err(|e| {
                Error::Database(format!("Failed to read table item: {}", e))
            })?;
            let key_str = key.value();
            if !key_str.starts_with(prefix) {
                break;
            }
            // Component-wise prefix: /data/target2 is not under /data/target
            if !Path::new(key_str).starts_with(predicate.path_prefix) {
                continue;
            }

            let doc = match Document::from_json(value.value()) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(path = %key_str, error = %e, "undecodable document, matching on its key");
                    match Document::recovered(key_str) {
                        Some(doc) => doc,
                        None => continue,
                    }
                }
            };
            if predicate.filename.is_match(&doc.filename) {
                let score = predicate.filename.score(&doc.filename);
                best.push(Ranked(Hit { document: doc, score }));
                if best.len() > k {
                    best.pop();
                }
            }
        }

        Ok(best.into_sorted_vec().into_iter().map(|ranked| ranked.0).collect())
    }

    /// Get a document by path
    pub fn get(&self, path: &str) -> Result<Option<Document>> {
        let read_txn = self.store.db.begin_read().map_err(|e| {
            Error::Database(format!("Failed to begin read transaction: {}", e))
        })?;
        let table = read_txn.open_table(DOCUMENTS_TABLE).map_err(|e| {
            Error::Database(format!("Failed to open table: {}", e))
        })?;

        let guard_option = table.get(path).map_err(|e| {
            Error::Database(format!("Failed to get document: {}", e))
        })?;

        let result = match guard_option {
            Some(guard) => {
                let json_str = guard.value().to_string();
                drop(guard);
                Document::from_json(&json_str).map(Some)
            }
            None => Ok(None),
        };

        result
    }

    /// Number of documents in the index
    pub fn len(&self) -> Result<u64> {
        let read_txn = self.store.db.begin_read().map_err(|e| {
            Error::Database(format!("Failed to begin read transaction: {}", e))
        })?;
        let table = read_txn.open_table(DOCUMENTS_TABLE).map_err(|e| {
            Error::Database(format!("Failed to open table: {}", e))
        })?;

        table
            .len()
            .map_err(|e| Error::Database(format!("Failed to count documents: {}", e)))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All indexed paths under `prefix`, in key order
    pub fn paths_under(&self, prefix: &Path) -> Result<Vec<String>> {
        let prefix_str = prefix
            .to_str()
            .ok_or_else(|| Error::InvalidPath(prefix.display().to_string()))?;

        let read_txn = self.store.db.begin_read().map_err(|e| {
            Error::Database(format!("Failed to begin read transaction: {}", e))
        })?;
        let table = read_txn.open_table(DOCUMENTS_TABLE).map_err(|e| {
            Error::Database(format!("Failed to open table: {}", e))
        })?;

        let mut paths = Vec::new();
        for item in table.range(prefix_str..).map_err(|e| {
            Error::Database(format!("Failed to iterate table: {}", e))
        })? {
            let (key, _value) = item.map_err(|e| {
                Error::Database(format!("Failed to read table item: {}", e))
            })?;
            let key_str = key.value();
            if !key_str.starts_with(prefix_str) {
                break;
            }
            if Path::new(key_str).starts_with(prefix) {
                paths.push(key_str.to_string());
            }
        }

        Ok(paths)
    }

    /// Release the read handle.
    ///
    /// Every call above runs in its own read transaction, which has already
    /// ended by the time it returns; closing only gives up the handle.
    pub fn close(self) {}
}
