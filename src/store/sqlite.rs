//! Durable SQLite-backed record store.
//!
//! One connection, private cache, WAL journal. A read-write open starts a
//! transaction that spans the entire indexing run and commits on close, so a
//! crash mid-run leaves no partial index. Every statement goes through the
//! registry in `queries`.

use std::path::{Path, PathBuf};

use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::model::{
    FileRef, FuncRef, MemberEntry, NameKind, SourceLoc, TypeEntry, TypeKind, TypeRef, TypeUseEntry,
    TypenameEntry,
};

use super::queries::{self, QueryDesc, Value};
use super::{canonical_path, RecordStore, TypenameCursor, TypenameHit};

pub struct SqliteStore {
    conn: Connection,
    read_only: bool,
}

impl SqliteStore {
    /// Open (and for read-write, create) the database at `path`.
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_PRIVATE_CACHE
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_PRIVATE_CACHE
        };
        let conn = Connection::open_with_flags(path, flags).map_err(IndexError::from)?;

        if !read_only {
            // journal_mode is a query pragma: it reports the resulting mode.
            let mode: String = conn
                .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
                .map_err(IndexError::from)?;
            debug!(journal_mode = %mode, db = %path.display(), "opened database");
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(IndexError::from)?;
            conn.execute_batch(queries::CREATE_SCHEMA)
                .map_err(IndexError::from)?;
            // One write transaction for the whole run.
            conn.execute_batch("BEGIN").map_err(IndexError::from)?;
        }

        Ok(Self { conn, read_only })
    }

    fn writable(&self) -> Result<()> {
        if self.read_only {
            Err(IndexError::PermissionDenied)
        } else {
            Ok(())
        }
    }
}

// ─── Statement execution ─────────────────────────────────────────────

fn run_insert(conn: &Connection, desc: &'static QueryDesc, params: &[Value]) -> Result<()> {
    queries::assert_registered(desc);
    queries::check_params(desc, params)?;
    let mut stmt = conn.prepare_cached(desc.sql).map_err(IndexError::from)?;
    stmt.execute(params_from_iter(params.iter()))
        .map_err(IndexError::from)?;
    Ok(())
}

/// Run a select expected to produce at most one row; `NotFound` when empty.
fn run_select_one(
    conn: &Connection,
    desc: &'static QueryDesc,
    params: &[Value],
) -> Result<Vec<Value>> {
    queries::assert_registered(desc);
    queries::check_params(desc, params)?;
    let mut stmt = conn.prepare_cached(desc.sql).map_err(IndexError::from)?;
    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(IndexError::from)?;
    match rows.next().map_err(IndexError::from)? {
        Some(row) => queries::read_row(row, desc),
        None => Err(IndexError::NotFound),
    }
}

fn loc_values(loc: &SourceLoc) -> [i64; 5] {
    [
        loc.file.0,
        loc.func.0,
        loc.scope as i64,
        loc.line as i64,
        loc.column as i64,
    ]
}

impl RecordStore for SqliteStore {
    fn add_file(&mut self, path: &Path, _len: u64) -> Result<FileRef> {
        self.writable()?;
        let canon = canonical_path(path);
        let canon_str = canon.to_string_lossy().into_owned();

        match run_select_one(
            &self.conn,
            &queries::SELECT_FILE_BY_PATH,
            &[Value::Text(canon_str.clone())],
        ) {
            Ok(row) => return Ok(FileRef(queries::id_from(&row[0], "file id")?)),
            Err(IndexError::NotFound) => {}
            Err(e) => return Err(e),
        }

        run_insert(&self.conn, &queries::INSERT_FILE, &[Value::Text(canon_str)])?;
        Ok(FileRef(self.conn.last_insert_rowid()))
    }

    fn typename_lookup(&mut self, loc: &SourceLoc, name: &str, kind: NameKind) -> Result<TypeRef> {
        let row = run_select_one(
            &self.conn,
            &queries::SELECT_TYPENAME_MATCH,
            &[
                Value::Int(loc.file.0),
                Value::Text(name.to_string()),
                Value::Int(kind.as_i64()),
            ],
        )?;
        Ok(TypeRef(queries::id_from(&row[0], "typename base")?))
    }

    fn type_insert(&mut self, loc: &SourceLoc, entry: &TypeEntry) -> Result<TypeRef> {
        self.writable()?;
        let [file, func, scope, line, column] = loc_values(loc);
        run_insert(
            &self.conn,
            &queries::INSERT_TYPE,
            &[
                Value::Int(entry.kind.as_i64()),
                Value::Int(entry.complete as i64),
                Value::Int(file),
                Value::Int(func),
                Value::Int(scope),
                Value::Int(line),
                Value::Int(column),
            ],
        )?;
        Ok(TypeRef(self.conn.last_insert_rowid()))
    }

    fn typename_insert(&mut self, loc: &SourceLoc, entry: &TypenameEntry) -> Result<()> {
        self.writable()?;
        let [file, func, scope, line, column] = loc_values(loc);
        run_insert(
            &self.conn,
            &queries::INSERT_TYPENAME,
            &[
                Value::Text(entry.name.clone()),
                Value::Int(entry.kind.as_i64()),
                Value::Int(entry.base.0),
                Value::Int(file),
                Value::Int(func),
                Value::Int(scope),
                Value::Int(line),
                Value::Int(column),
            ],
        )
    }

    fn member_insert(&mut self, loc: &SourceLoc, entry: &MemberEntry) -> Result<()> {
        self.writable()?;
        let [file, _, _, line, column] = loc_values(loc);
        run_insert(
            &self.conn,
            &queries::INSERT_MEMBER,
            &[
                Value::Int(entry.parent.0),
                entry.base.map_or(Value::Null, |b| Value::Int(b.0)),
                Value::Text(entry.name.clone()),
                Value::Int(file),
                Value::Int(line),
                Value::Int(column),
            ],
        )
    }

    fn type_use_insert(&mut self, loc: &SourceLoc, entry: &TypeUseEntry) -> Result<()> {
        self.writable()?;
        let [file, _, _, line, column] = loc_values(loc);
        run_insert(
            &self.conn,
            &queries::INSERT_TYPE_USE,
            &[
                Value::Int(entry.base.0),
                Value::Int(entry.kind.as_i64()),
                Value::Int(file),
                Value::Int(line),
                Value::Int(column),
            ],
        )
    }

    fn file_lookup(&mut self, file: FileRef) -> Result<PathBuf> {
        let row = run_select_one(
            &self.conn,
            &queries::SELECT_FILE_BY_ID,
            &[Value::Int(file.0)],
        )?;
        match &row[0] {
            Value::Text(path) => Ok(PathBuf::from(path)),
            _ => Err(IndexError::Corruption("file path is not text".into())),
        }
    }

    fn type_lookup(&mut self, tref: TypeRef) -> Result<(TypeEntry, SourceLoc)> {
        let row = run_select_one(
            &self.conn,
            &queries::SELECT_TYPE_BY_ID,
            &[Value::Int(tref.0)],
        )?;
        let kind_raw = queries::id_from(&row[0], "type kind")?;
        let kind = TypeKind::from_i64(kind_raw).ok_or_else(|| {
            IndexError::Corruption(format!("type {tref} has unknown kind {kind_raw}"))
        })?;
        let entry = TypeEntry {
            kind,
            complete: queries::id_from(&row[1], "complete flag")? != 0,
        };
        let loc = SourceLoc {
            file: FileRef(queries::id_from(&row[2], "file ref")?),
            func: FuncRef(queries::id_from(&row[3], "func ref")?),
            scope: queries::counter_from(&row[4], "scope")?,
            line: queries::counter_from(&row[5], "line")?,
            column: queries::counter_from(&row[6], "column")?,
        };
        Ok((entry, loc))
    }

    fn member_lookup(&mut self, parent: TypeRef, name: &str) -> Result<(MemberEntry, SourceLoc)> {
        let row = run_select_one(
            &self.conn,
            &queries::SELECT_MEMBER,
            &[Value::Int(parent.0), Value::Text(name.to_string())],
        )?;
        let base = match &row[1] {
            Value::Null => None,
            v => Some(TypeRef(queries::id_from(v, "member base")?)),
        };
        let member_name = match &row[2] {
            Value::Text(s) => s.clone(),
            _ => return Err(IndexError::Corruption("member name is not text".into())),
        };
        let entry = MemberEntry {
            parent: TypeRef(queries::id_from(&row[0], "member parent")?),
            base,
            name: member_name,
        };
        let loc = SourceLoc::global(
            FileRef(queries::id_from(&row[3], "file ref")?),
            queries::counter_from(&row[4], "line")?,
            queries::counter_from(&row[5], "column")?,
        );
        Ok((entry, loc))
    }

    fn typename_find<'a>(&'a mut self, pattern: &str) -> Result<Box<dyn TypenameCursor + 'a>> {
        Ok(Box::new(SqliteCursor {
            conn: &self.conn,
            pattern: pattern.to_string(),
            last_rowid: 0,
            current: None,
        }))
    }

    fn close(self: Box<Self>) -> Result<()> {
        if !self.read_only {
            self.conn.execute_batch("COMMIT").map_err(IndexError::from)?;
        }
        self.conn
            .close()
            .map_err(|(_, err)| IndexError::Db(err))
    }
}

// ─── Search cursor ───────────────────────────────────────────────────

/// Keyset-paginated cursor: each `next` is one self-contained
/// bind-step-finalize on the registered search statement, anchored on the
/// last seen rowid. Forward-only, single-pass, non-restartable.
struct SqliteCursor<'conn> {
    conn: &'conn Connection,
    pattern: String,
    last_rowid: i64,
    current: Option<TypenameHit>,
}

impl TypenameCursor for SqliteCursor<'_> {
    fn next(&mut self) -> Result<bool> {
        let row = match run_select_one(
            self.conn,
            &queries::SELECT_TYPENAME_FIND,
            &[
                Value::Text(self.pattern.clone()),
                Value::Int(self.last_rowid),
            ],
        ) {
            Ok(row) => row,
            Err(IndexError::NotFound) => {
                self.current = None;
                return Ok(false);
            }
            Err(e) => {
                self.current = None;
                return Err(e);
            }
        };

        self.last_rowid = queries::id_from(&row[0], "typename rowid")?;
        let name = match &row[1] {
            Value::Text(s) => s.clone(),
            _ => return Err(IndexError::Corruption("typename name is not text".into())),
        };
        let kind_raw = queries::id_from(&row[2], "typename kind")?;
        let kind = NameKind::from_i64(kind_raw).ok_or_else(|| {
            IndexError::Corruption(format!("typename '{name}' has unknown kind {kind_raw}"))
        })?;
        self.current = Some(TypenameHit {
            name,
            kind,
            base: TypeRef(queries::id_from(&row[3], "typename base")?),
            loc: SourceLoc {
                file: FileRef(queries::id_from(&row[4], "file ref")?),
                func: FuncRef(queries::id_from(&row[5], "func ref")?),
                scope: queries::counter_from(&row[6], "scope")?,
                line: queries::counter_from(&row[7], "line")?,
                column: queries::counter_from(&row[8], "column")?,
            },
        });
        Ok(true)
    }

    fn peek(&self) -> Option<&TypenameHit> {
        self.current.as_ref()
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
