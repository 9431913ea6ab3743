//! On-disk tests for the durable store: open modes, idempotence, cursor
//! behavior, and corruption reporting.

use super::*;
use crate::error::IndexError;
use crate::model::{MemberEntry, NameKind, TypeEntry, TypeKind, TypeUseEntry, TypenameEntry, UseKind};

fn temp_db() -> (tempfile::TempDir, std::path::PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("cf.db");
    (tmp, db)
}

fn loc(file: FileRef, line: u32, col: u32) -> SourceLoc {
    SourceLoc::global(file, line, col)
}

#[test]
fn test_open_creates_wal_database() {
    let (_tmp, db) = temp_db();
    let store = SqliteStore::open(&db, false).unwrap();
    Box::new(store).close().unwrap();

    let conn = Connection::open(&db).unwrap();
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
    for table in ["file", "type", "typename", "incomplete_type", "type_use", "member"] {
        let n: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 1, "missing table {table}");
    }
}

#[test]
fn test_add_file_idempotent_across_spellings() {
    let (tmp, db) = temp_db();
    let hdr = tmp.path().join("hdr.h");
    std::fs::write(&hdr, "struct s { int x; };").unwrap();
    let dotted = tmp.path().join(".").join("hdr.h");

    let mut store = SqliteStore::open(&db, false).unwrap();
    let a = store.add_file(&hdr, 20).unwrap();
    let b = store.add_file(&dotted, 20).unwrap();
    assert_eq!(a, b);

    Box::new(store).close().unwrap();
    let conn = Connection::open(&db).unwrap();
    let rows: i64 = conn
        .query_row("SELECT count(*) FROM file", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_type_roundtrip() {
    let (_tmp, db) = temp_db();
    let mut store = SqliteStore::open(&db, false).unwrap();
    let entry = TypeEntry { kind: TypeKind::Union, complete: true };
    let at = loc(FileRef(1), 3, 5);
    let tref = store.type_insert(&at, &entry).unwrap();

    let (got, got_at) = store.type_lookup(tref).unwrap();
    assert_eq!(got, entry);
    assert_eq!(got_at, at);
}

#[test]
fn test_read_only_rejects_writes() {
    let (_tmp, db) = temp_db();
    let store = SqliteStore::open(&db, false).unwrap();
    Box::new(store).close().unwrap();

    let mut ro = SqliteStore::open(&db, true).unwrap();
    let err = ro
        .type_insert(&loc(FileRef(1), 1, 1), &TypeEntry { kind: TypeKind::Struct, complete: true })
        .unwrap_err();
    assert!(matches!(err, IndexError::PermissionDenied));
    let err = ro.add_file(std::path::Path::new("x.c"), 0).unwrap_err();
    assert!(matches!(err, IndexError::PermissionDenied));
}

#[test]
fn test_typename_lookup_namespaces_disjoint() {
    let (_tmp, db) = temp_db();
    let mut store = SqliteStore::open(&db, false).unwrap();
    let at = loc(FileRef(1), 1, 1);
    let tref = store
        .type_insert(&at, &TypeEntry { kind: TypeKind::Struct, complete: true })
        .unwrap();
    store
        .typename_insert(
            &at,
            &TypenameEntry { name: "foo".into(), kind: NameKind::Direct, base: tref },
        )
        .unwrap();

    assert_eq!(store.typename_lookup(&at, "foo", NameKind::Direct).unwrap(), tref);
    assert!(matches!(
        store.typename_lookup(&at, "foo", NameKind::Typedef),
        Err(IndexError::NotFound)
    ));
    let other_file = loc(FileRef(2), 1, 1);
    assert!(matches!(
        store.typename_lookup(&other_file, "foo", NameKind::Direct),
        Err(IndexError::NotFound)
    ));
}

#[test]
fn test_member_lookup_like_and_null_base() {
    let (_tmp, db) = temp_db();
    let mut store = SqliteStore::open(&db, false).unwrap();
    let at = loc(FileRef(1), 1, 1);
    let parent = store
        .type_insert(&at, &TypeEntry { kind: TypeKind::Struct, complete: true })
        .unwrap();
    store
        .member_insert(
            &loc(FileRef(1), 1, 14),
            &MemberEntry { parent, base: None, name: "count".into() },
        )
        .unwrap();

    let (entry, at) = store.member_lookup(parent, "cou%").unwrap();
    assert_eq!(entry.name, "count");
    assert_eq!(entry.base, None);
    assert_eq!(at.line, 1);
    assert_eq!(at.column, 14);
    assert!(matches!(
        store.member_lookup(parent, "absent"),
        Err(IndexError::NotFound)
    ));
}

#[test]
fn test_cursor_walks_matches_in_insert_order() {
    let (_tmp, db) = temp_db();
    let mut store = SqliteStore::open(&db, false).unwrap();
    let at = loc(FileRef(1), 1, 1);
    let tref = store
        .type_insert(&at, &TypeEntry { kind: TypeKind::Struct, complete: true })
        .unwrap();
    for name in ["node", "node_t", "list"] {
        store
            .typename_insert(
                &at,
                &TypenameEntry { name: name.into(), kind: NameKind::Typedef, base: tref },
            )
            .unwrap();
    }

    let mut cur = store.typename_find("node%").unwrap();
    assert!(cur.peek().is_none());
    assert!(cur.next().unwrap());
    assert_eq!(cur.peek().unwrap().name, "node");
    assert!(cur.next().unwrap());
    assert_eq!(cur.peek().unwrap().name, "node_t");
    assert!(!cur.next().unwrap());
    assert!(cur.peek().is_none());
}

#[test]
fn test_uncommitted_run_leaves_no_partial_index() {
    let (_tmp, db) = temp_db();
    let mut store = SqliteStore::open(&db, false).unwrap();
    let at = loc(FileRef(1), 1, 1);
    store
        .type_insert(&at, &TypeEntry { kind: TypeKind::Struct, complete: true })
        .unwrap();
    // Simulate a crash: drop without close, so the run transaction never
    // commits.
    drop(store);

    let conn = Connection::open(&db).unwrap();
    let rows: i64 = conn
        .query_row("SELECT count(*) FROM type", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn test_type_use_persists() {
    let (_tmp, db) = temp_db();
    let mut store = SqliteStore::open(&db, false).unwrap();
    let at = loc(FileRef(1), 2, 3);
    let tref = store
        .type_insert(&at, &TypeEntry { kind: TypeKind::Struct, complete: true })
        .unwrap();
    store
        .type_use_insert(&at, &TypeUseEntry { base: tref, kind: UseKind::Decl })
        .unwrap();
    Box::new(store).close().unwrap();

    let conn = Connection::open(&db).unwrap();
    let (base, kind): (i64, i64) = conn
        .query_row("SELECT base_type, kind FROM type_use", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(base, tref.0);
    assert_eq!(kind, UseKind::Decl.as_i64());
}

#[test]
fn test_corrupt_column_type_reported() {
    let (_tmp, db) = temp_db();
    let store = SqliteStore::open(&db, false).unwrap();
    Box::new(store).close().unwrap();

    // Plant a typename row whose base_type is text. SQLite's dynamic typing
    // stores it as-is; the read boundary must refuse it.
    let conn = Connection::open(&db).unwrap();
    conn.execute(
        "INSERT INTO typename (name, kind, base_type, file, func, scope, line, \"column\") \
         VALUES ('bad', 0, 'oops', 1, 0, 0, 1, 1)",
        [],
    )
    .unwrap();
    drop(conn);

    let mut store = SqliteStore::open(&db, true).unwrap();
    let mut cur = store.typename_find("bad").unwrap();
    let err = cur.next().unwrap_err();
    assert!(matches!(err, IndexError::Corruption(_)));
}

#[test]
fn test_negative_id_reported_as_range_error() {
    let (_tmp, db) = temp_db();
    let store = SqliteStore::open(&db, false).unwrap();
    Box::new(store).close().unwrap();

    let conn = Connection::open(&db).unwrap();
    conn.execute(
        "INSERT INTO typename (name, kind, base_type, file, func, scope, line, \"column\") \
         VALUES ('neg', 0, -4, 1, 0, 0, 1, 1)",
        [],
    )
    .unwrap();
    drop(conn);

    let mut store = SqliteStore::open(&db, true).unwrap();
    let mut cur = store.typename_find("neg").unwrap();
    let err = cur.next().unwrap_err();
    assert!(matches!(err, IndexError::Range(_)));
}
