//! Record store boundary: one trait, three backends (no-op, in-memory,
//! SQLite), dispatched dynamically.

mod mem;
mod nop;
mod queries;
mod sqlite;

pub use mem::MemStore;
pub use nop::NopStore;
pub use sqlite::SqliteStore;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{
    FileRef, MemberEntry, NameKind, SourceLoc, TypeEntry, TypeRef, TypeUseEntry, TypenameEntry,
};

// ─── Store interface ─────────────────────────────────────────────────

/// Capability-uniform insert/lookup surface over the index records.
///
/// Mutating calls on a read-only store fail with `PermissionDenied`.
/// Lookups return `NotFound` for expected-negative results; callers branch
/// on it rather than surfacing it.
pub trait RecordStore {
    /// Idempotent: if the canonicalized path already has a row, its existing
    /// ref is returned and nothing is inserted.
    fn add_file(&mut self, path: &Path, len: u64) -> Result<FileRef>;

    /// Probe for a typename matching file, scope, name bytes, and name kind.
    /// Tag and typedef namespaces are disjoint, so `kind` is part of the key.
    fn typename_lookup(&mut self, loc: &SourceLoc, name: &str, kind: NameKind) -> Result<TypeRef>;

    /// Insert a new type row and return its durable ref.
    fn type_insert(&mut self, loc: &SourceLoc, entry: &TypeEntry) -> Result<TypeRef>;

    /// Insert a typename referencing an existing type.
    fn typename_insert(&mut self, loc: &SourceLoc, entry: &TypenameEntry) -> Result<()>;

    fn member_insert(&mut self, loc: &SourceLoc, entry: &MemberEntry) -> Result<()>;

    fn type_use_insert(&mut self, loc: &SourceLoc, entry: &TypeUseEntry) -> Result<()>;

    fn file_lookup(&mut self, file: FileRef) -> Result<PathBuf>;

    fn type_lookup(&mut self, tref: TypeRef) -> Result<(TypeEntry, SourceLoc)>;

    /// Look up one member of `parent` by name. The name is matched with SQL
    /// `LIKE` semantics; callers do not escape wildcards.
    fn member_lookup(&mut self, parent: TypeRef, name: &str) -> Result<(MemberEntry, SourceLoc)>;

    /// Produce a lazy, forward-only, single-pass cursor over typenames whose
    /// name matches `pattern` (`LIKE` semantics). The cursor borrows the
    /// store; no mutating operation can be issued while it is alive.
    fn typename_find<'a>(&'a mut self, pattern: &str) -> Result<Box<dyn TypenameCursor + 'a>>;

    /// Release resources. For a durable read-write store this commits the
    /// pending transaction.
    fn close(self: Box<Self>) -> Result<()>;
}

// ─── Typename search cursor ──────────────────────────────────────────

/// One row produced by [`RecordStore::typename_find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypenameHit {
    pub name: String,
    pub kind: NameKind,
    pub base: TypeRef,
    pub loc: SourceLoc,
}

/// Forward-only, non-restartable cursor. `peek` borrows the current row from
/// the cursor; the borrow ends at the next `next` call or at drop, which is
/// what bounds the lifetime of the row's name string.
pub trait TypenameCursor {
    /// Advance to the next row. Returns `false` once the cursor is exhausted.
    fn next(&mut self) -> Result<bool>;

    /// The current row, or `None` before the first `next` / after exhaustion.
    fn peek(&self) -> Option<&TypenameHit>;
}

// ─── Constructors ────────────────────────────────────────────────────

/// A store that swallows every record. Used by dry runs.
pub fn open_nop() -> Box<dyn RecordStore> {
    Box::new(NopStore::new())
}

/// A transient vector-backed store. Used by tests.
pub fn open_mem() -> Box<dyn RecordStore> {
    Box::new(MemStore::new())
}

/// The durable SQLite-backed store.
pub fn open_durable(path: &Path, read_only: bool) -> Result<Box<dyn RecordStore>> {
    Ok(Box::new(SqliteStore::open(path, read_only)?))
}

// ─── Shared helpers ──────────────────────────────────────────────────

/// Resolve `path` to its absolute canonical form (symlinks resolved, `.` and
/// `//` collapsed) so distinct spellings of one file map to one row. Falls
/// back to the input when the file cannot be resolved.
pub fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// SQL `LIKE` semantics over ASCII: `%` matches any run, `_` any single
/// character, letters compare case-insensitively. Used by the in-memory
/// backend so both durable and test stores answer pattern queries alike.
pub fn like_match(pattern: &str, text: &str) -> bool {
    fn eq_ci(a: u8, b: u8) -> bool {
        a.eq_ignore_ascii_case(&b)
    }
    fn matches(pat: &[u8], txt: &[u8]) -> bool {
        match pat.split_first() {
            None => txt.is_empty(),
            Some((b'%', rest)) => {
                (0..=txt.len()).any(|skip| matches(rest, &txt[skip..]))
            }
            Some((b'_', rest)) => !txt.is_empty() && matches(rest, &txt[1..]),
            Some((&c, rest)) => match txt.split_first() {
                Some((&t, txt_rest)) => eq_ci(c, t) && matches(rest, txt_rest),
                None => false,
            },
        }
    }
    matches(pattern.as_bytes(), text.as_bytes())
}
