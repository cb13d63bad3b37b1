use simcat::{BreakpointStore, DebugError};

use crate::support::DebugDb;

fn sample_db() -> DebugDb {
    DebugDb::create(
        &[(1, "/work/a.py", 10), (2, "/work/a.py", 3), (3, "/work/lib/b.py", 8)],
        &[("g1", "x", "X", 1), ("TOP.g2", "y", "Y", 1), ("g3", "n", "n", 3)],
    )
}

#[test]
fn test_open_and_query_on_disk() {
    let db = sample_db();
    let store = BreakpointStore::open(db.path()).unwrap();

    assert_eq!(
        store.list_files().unwrap(),
        vec!["/work/a.py".to_string(), "/work/lib/b.py".to_string()]
    );
    assert_eq!(store.list_breakpoint_lines("/work/a.py").unwrap(), vec![3, 10]);
    assert_eq!(store.find_breakpoint_id("/work/lib/b.py", 8).unwrap(), Some(3));
    assert_eq!(store.lookup_breakpoint(3).unwrap().location(), "b.py:8");
}

#[test]
fn test_list_files_is_idempotent() {
    let db = sample_db();
    let store = BreakpointStore::open(db.path()).unwrap();

    let first = store.list_files().unwrap();
    for _ in 0..5 {
        assert_eq!(store.list_files().unwrap(), first);
    }
}

#[test]
fn test_legacy_statement_column() {
    let db = DebugDb::create_with_key("id", &[(4, "/a.py", 1)], &[("TOP", "clk", "clock", 4)]);
    let store = BreakpointStore::open(db.path()).unwrap();

    let vars = store.list_variables(4).unwrap();
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0].handle(), "TOP.clk");
}

#[test]
fn test_store_is_shared_across_threads() {
    let db = sample_db();
    let store = std::sync::Arc::new(BreakpointStore::open(db.path()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || store.list_variables(1).unwrap().len())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
}

#[test]
fn test_missing_database_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = BreakpointStore::open(dir.path().join("nope.db")).unwrap_err();
    assert!(matches!(err, DebugError::StoreUnavailable(_)));
}

#[test]
fn test_garbage_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.db");
    std::fs::write(&path, "not an sqlite database\n".repeat(512)).unwrap();

    let err = BreakpointStore::open(&path).unwrap_err();
    assert!(matches!(err, DebugError::StoreUnavailable(_)));
}

#[test]
fn test_empty_database_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.db");
    std::fs::write(&path, b"").unwrap();

    let err = BreakpointStore::open(&path).unwrap_err();
    assert!(matches!(err, DebugError::StoreUnavailable(_)));
}
