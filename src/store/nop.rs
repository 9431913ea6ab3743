//! No-op store: accepts every record, persists nothing. Backs `indexer -n`.

use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::model::{
    FileRef, MemberEntry, NameKind, SourceLoc, TypeEntry, TypeRef, TypeUseEntry, TypenameEntry,
};

use super::{RecordStore, TypenameCursor, TypenameHit};

/// Counter-assigned refs keep the translator's id bookkeeping exercised even
/// though nothing is stored.
pub struct NopStore {
    next_file: i64,
    next_type: i64,
}

impl NopStore {
    pub fn new() -> Self {
        Self {
            next_file: 1,
            next_type: 1,
        }
    }
}

impl Default for NopStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for NopStore {
    fn add_file(&mut self, _path: &Path, _len: u64) -> Result<FileRef> {
        let r = FileRef(self.next_file);
        self.next_file += 1;
        Ok(r)
    }

    fn typename_lookup(
        &mut self,
        _loc: &SourceLoc,
        _name: &str,
        _kind: NameKind,
    ) -> Result<TypeRef> {
        Err(IndexError::NotFound)
    }

    fn type_insert(&mut self, _loc: &SourceLoc, _entry: &TypeEntry) -> Result<TypeRef> {
        let r = TypeRef(self.next_type);
        self.next_type += 1;
        Ok(r)
    }

    fn typename_insert(&mut self, _loc: &SourceLoc, _entry: &TypenameEntry) -> Result<()> {
        Ok(())
    }

    fn member_insert(&mut self, _loc: &SourceLoc, _entry: &MemberEntry) -> Result<()> {
        Ok(())
    }

    fn type_use_insert(&mut self, _loc: &SourceLoc, _entry: &TypeUseEntry) -> Result<()> {
        Ok(())
    }

    fn file_lookup(&mut self, _file: FileRef) -> Result<PathBuf> {
        Err(IndexError::NotFound)
    }

    fn type_lookup(&mut self, _tref: TypeRef) -> Result<(TypeEntry, SourceLoc)> {
        Err(IndexError::NotFound)
    }

    fn member_lookup(&mut self, _parent: TypeRef, _name: &str) -> Result<(MemberEntry, SourceLoc)> {
        Err(IndexError::NotFound)
    }

    fn typename_find<'a>(&'a mut self, _pattern: &str) -> Result<Box<dyn TypenameCursor + 'a>> {
        Ok(Box::new(EmptyCursor))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

struct EmptyCursor;

impl TypenameCursor for EmptyCursor {
    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn peek(&self) -> Option<&TypenameHit> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn test_refs_are_distinct() {
        let mut store = NopStore::new();
        let loc = SourceLoc::global(FileRef(1), 1, 1);
        let a = store
            .type_insert(&loc, &TypeEntry { kind: TypeKind::Struct, complete: true })
            .unwrap();
        let b = store
            .type_insert(&loc, &TypeEntry { kind: TypeKind::Union, complete: true })
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_lookups_miss() {
        let mut store = NopStore::new();
        let loc = SourceLoc::global(FileRef(1), 1, 1);
        assert!(matches!(
            store.typename_lookup(&loc, "foo", NameKind::Direct),
            Err(IndexError::NotFound)
        ));
        assert!(matches!(store.file_lookup(FileRef(1)), Err(IndexError::NotFound)));
    }

    #[test]
    fn test_cursor_is_empty() {
        let mut store = NopStore::new();
        let mut cur = store.typename_find("%").unwrap();
        assert!(!cur.next().unwrap());
        assert!(cur.peek().is_none());
    }
}
