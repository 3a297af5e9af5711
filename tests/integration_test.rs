mod common;

use common::{path_str, Fixture, RecordingSink};
use filescout::{CancellationToken, OpenMode, Result, SessionState};
use std::collections::HashSet;
use std::fs;

/// Every matching file is reported exactly once per session
#[test]
fn test_each_match_delivered_once() -> Result<()> {
    let fx = Fixture::new();
    let a = fx.touch("a.txt");
    let b = fx.touch("sub/b.txt");
    let c = fx.touch("sub/deeper/c.txt");
    fx.touch("sub/ignored.md");

    let expected = {
        let mut v = vec![path_str(&a), path_str(&b), path_str(&c)];
        v.sort();
        v
    };

    // First run starts from an empty index, second from a full one
    for _ in 0..2 {
        let (report, sink) = fx.search("*.txt");
        let log = sink.log();

        assert_eq!(report.state, SessionState::Done);
        assert_eq!(report.delivered, 3);
        assert_eq!(log.completed, 1);
        assert!(log.failures.is_empty());
        assert_eq!(sink.sorted_matches(), expected);

        let unique: HashSet<&String> = log.matches.iter().collect();
        assert_eq!(unique.len(), log.matches.len());
    }

    Ok(())
}

/// A deleted file is no longer reported and drops out of the index
#[test]
fn test_deleted_file_is_purged() -> Result<()> {
    let fx = Fixture::new();
    let keep = fx.touch("keep.txt");
    let gone = fx.touch("gone.txt");

    let (_, sink) = fx.search("*.txt");
    assert_eq!(sink.log().matches.len(), 2);
    assert!(fx.indexed_under(&fx.root).contains(&path_str(&gone)));

    fs::remove_file(&gone)?;

    let (report, sink) = fx.search("*.txt");
    assert_eq!(sink.log().matches, vec![path_str(&keep)]);
    assert_eq!(report.stale_removed, 1);
    assert_eq!(fx.indexed_under(&fx.root), vec![path_str(&keep)]);

    Ok(())
}

/// Re-running without changes delivers the same set and keeps one record per file
#[test]
fn test_rerun_is_idempotent() -> Result<()> {
    let fx = Fixture::new();
    fx.touch("one.log");
    fx.touch("two.log");
    fx.touch("nested/three.log");

    let (_, first) = fx.search("*.log");
    let count_after_first = fx.index_len();

    let (_, second) = fx.search("*.log");
    let count_after_second = fx.index_len();

    assert_eq!(first.sorted_matches(), second.sorted_matches());
    assert_eq!(count_after_first, 3);
    assert_eq!(count_after_first, count_after_second);

    Ok(())
}

/// `*.txt` is a substring match on the filename
#[test]
fn test_wildcard_substring_semantics() -> Result<()> {
    let fx = Fixture::new();
    let report_txt = fx.touch("report.txt");
    let backup = fx.touch("a.txt.bak");
    fx.touch("report.doc");

    let (_, sink) = fx.search("*.txt");

    let mut expected = vec![path_str(&backup), path_str(&report_txt)];
    expected.sort();
    assert_eq!(sink.sorted_matches(), expected);

    Ok(())
}

/// Files outside the target folder are never reported, even from the index
#[test]
fn test_path_prefix_scoping() -> Result<()> {
    let fx = Fixture::new();
    let inside = fx.touch("target/report.txt");
    fx.touch("target2/report.txt");
    fx.touch("other/report.txt");

    // Index the whole tree first so the siblings are in the store
    let (_, sink) = fx.search("report");
    assert_eq!(sink.log().matches.len(), 3);

    let (report, sink) = fx.search_in(&fx.root.join("target"), "report");
    assert_eq!(report.state, SessionState::Done);
    assert_eq!(sink.log().matches, vec![path_str(&inside)]);

    Ok(())
}

/// Cancelling mid-walk keeps what was already indexed and still completes
#[test]
fn test_cancellation_mid_walk() -> Result<()> {
    let fx = Fixture::new();
    for i in 0..5 {
        fx.touch(&format!("file{}.txt", i));
    }

    let token = CancellationToken::new();
    let sink = RecordingSink::cancelling(token.clone());
    let report = fx
        .searcher
        .task(&fx.root, Some("*.txt"), sink.clone())?
        .with_cancellation(token)
        .run();

    let log = sink.log();
    assert_eq!(report.state, SessionState::Cancelled);
    assert_eq!(log.completed, 1);
    assert!(log.failures.is_empty());
    assert_eq!(log.matches, vec![path_str(&fx.root.join("file0.txt"))]);

    let indexed = fx.indexed_under(&fx.root);
    assert!(indexed.contains(&path_str(&fx.root.join("file0.txt"))));
    assert!(indexed.len() < 5);

    Ok(())
}

/// A cancelled walk still leaves the second query pass to report files it never reached
#[test]
fn test_cancelled_walk_still_queries_fresh_index() -> Result<()> {
    let fx = Fixture::with_config(|config| config.with_top_k(1));
    fx.touch("b.txt");
    let c = fx.touch("c.txt");

    let (_, sink) = fx.search("*.txt");
    assert_eq!(sink.log().matches.len(), 2);

    fs::remove_file(fx.root.join("b.txt"))?;
    let a = fx.touch("a.txt");

    // The walk stops right after a.txt, before it reaches c.txt
    let token = CancellationToken::new();
    let sink = RecordingSink::cancelling(token.clone());
    let report = fx
        .searcher
        .task(&fx.root, Some("*.txt"), sink.clone())?
        .with_cancellation(token)
        .run();

    let mut expected = vec![path_str(&a), path_str(&c)];
    expected.sort();

    assert_eq!(report.state, SessionState::Cancelled);
    assert_eq!(report.stale_removed, 1);
    assert_eq!(sink.log().completed, 1);
    assert_eq!(sink.sorted_matches(), expected);
    assert_eq!(fx.indexed_under(&fx.root), expected);

    Ok(())
}

/// A record that can't be decoded neither hides its neighbours nor outlives its file
#[test]
fn test_undecodable_record_is_reconciled() -> Result<()> {
    let fx = Fixture::new();
    let keep = fx.touch("keep.txt");
    fx.search("*.txt");

    let gone = path_str(&fx.root.join("zz_gone.txt"));
    {
        let documents: redb::TableDefinition<&str, &str> = redb::TableDefinition::new("documents");
        let db = redb::Database::open(fx.index_path()).unwrap();
        let write_txn = db.begin_write().unwrap();
        {
            let mut table = write_txn.open_table(documents).unwrap();
            table.insert(gone.as_str(), "not json").unwrap();
        }
        write_txn.commit().unwrap();
    }

    let (report, sink) = fx.search("*.txt");

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(sink.log().matches, vec![path_str(&keep)]);
    assert_eq!(report.stale_removed, 1);
    assert_eq!(fx.indexed_under(&fx.root), vec![path_str(&keep)]);

    Ok(())
}

/// An empty search string touches neither the index nor the filesystem
#[test]
fn test_empty_search_is_noop() -> Result<()> {
    let fx = Fixture::new();
    fx.touch("a.txt");

    let sink = RecordingSink::new();
    let report = fx
        .searcher
        .task(&fx.root.join("does-not-exist"), None, sink.clone())?
        .run();

    let log = sink.log();
    assert_eq!(report.state, SessionState::Done);
    assert!(log.matches.is_empty());
    assert_eq!(log.completed, 1);
    assert!(!fx.index_path().exists());

    Ok(())
}

/// An index that can't be opened fails the session through on_failure only
#[test]
fn test_index_open_failure() -> Result<()> {
    let blocker_dir = tempfile::TempDir::new().unwrap();
    let blocker = blocker_dir.path().join("not-a-dir");
    fs::write(&blocker, "")?;

    let fx = Fixture::with_config(|config| config.with_index_path(blocker.join("documents.redb")));
    fx.touch("a.txt");

    let (report, sink) = fx.search("*.txt");
    let log = sink.log();

    assert_eq!(report.state, SessionState::Failed);
    assert!(report.failure.is_some());
    assert_eq!(log.failures.len(), 1);
    assert_eq!(log.completed, 0);
    assert!(log.matches.is_empty());

    Ok(())
}

/// Case folding is opt-in
#[test]
fn test_case_policy() -> Result<()> {
    let fx = Fixture::new();
    let upper = fx.touch("README.TXT");

    let (_, sink) = fx.search("readme");
    assert!(sink.log().matches.is_empty());

    let folded = Fixture::with_config(|config| config.with_case_sensitive(false));
    let upper_folded = folded.touch("README.TXT");
    let (_, sink) = folded.search("readme");
    assert_eq!(sink.log().matches, vec![path_str(&upper_folded)]);

    assert_ne!(upper, upper_folded);
    Ok(())
}

/// Create mode discards whatever the index held before reindexing
#[test]
fn test_rebuild_discards_old_documents() -> Result<()> {
    let fx = Fixture::new();
    fx.touch("a/one.txt");
    fx.touch("b/two.txt");

    let (_, _) = fx.search("*.txt");
    assert_eq!(fx.index_len(), 2);

    let rebuilt = Fixture {
        searcher: filescout::Searcher::new(
            fx.searcher.config().clone().with_open_mode(OpenMode::Create),
        ),
        root: fx.root.clone(),
        temp_dir: tempfile::TempDir::new().unwrap(),
    };
    let (report, sink) = rebuilt.search_in(&fx.root.join("a"), "*.txt");

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(sink.log().matches, vec![path_str(&fx.root.join("a/one.txt"))]);
    assert_eq!(fx.index_len(), 1);

    Ok(())
}
