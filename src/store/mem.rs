//! In-memory vector store. Mirrors the durable backend's semantics closely
//! enough that indexing tests can assert on rows without touching disk.

use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::model::{
    FileRef, MemberEntry, NameKind, SourceLoc, TypeEntry, TypeRef, TypeUseEntry, TypenameEntry,
};

use super::{canonical_path, like_match, RecordStore, TypenameCursor, TypenameHit};

#[derive(Default)]
pub struct MemStore {
    pub files: Vec<PathBuf>,
    pub types: Vec<(TypeEntry, SourceLoc)>,
    pub typenames: Vec<(TypenameEntry, SourceLoc)>,
    pub members: Vec<(MemberEntry, SourceLoc)>,
    pub type_uses: Vec<(TypeUseEntry, SourceLoc)>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_type_ref(&self, tref: TypeRef, what: &str) -> Result<()> {
        let idx = tref.0 - 1;
        if idx < 0 || idx as usize >= self.types.len() {
            return Err(IndexError::Corruption(format!(
                "{what} references missing type {tref}"
            )));
        }
        Ok(())
    }
}

impl RecordStore for MemStore {
    fn add_file(&mut self, path: &Path, _len: u64) -> Result<FileRef> {
        let canon = canonical_path(path);
        if let Some(idx) = self.files.iter().position(|p| *p == canon) {
            return Ok(FileRef(idx as i64 + 1));
        }
        self.files.push(canon);
        Ok(FileRef(self.files.len() as i64))
    }

    fn typename_lookup(&mut self, loc: &SourceLoc, name: &str, kind: NameKind) -> Result<TypeRef> {
        // Scope is pinned to 0, matching the durable lookup SQL.
        self.typenames
            .iter()
            .find(|(entry, at)| {
                at.file == loc.file && at.scope == 0 && entry.kind == kind && entry.name == name
            })
            .map(|(entry, _)| entry.base)
            .ok_or(IndexError::NotFound)
    }

    fn type_insert(&mut self, loc: &SourceLoc, entry: &TypeEntry) -> Result<TypeRef> {
        self.types.push((*entry, *loc));
        Ok(TypeRef(self.types.len() as i64))
    }

    fn typename_insert(&mut self, loc: &SourceLoc, entry: &TypenameEntry) -> Result<()> {
        self.check_type_ref(entry.base, "typename")?;
        self.typenames.push((entry.clone(), *loc));
        Ok(())
    }

    fn member_insert(&mut self, loc: &SourceLoc, entry: &MemberEntry) -> Result<()> {
        self.check_type_ref(entry.parent, "member parent")?;
        if let Some(base) = entry.base {
            self.check_type_ref(base, "member base")?;
        }
        self.members.push((entry.clone(), *loc));
        Ok(())
    }

    fn type_use_insert(&mut self, loc: &SourceLoc, entry: &TypeUseEntry) -> Result<()> {
        self.check_type_ref(entry.base, "type use")?;
        self.type_uses.push((*entry, *loc));
        Ok(())
    }

    fn file_lookup(&mut self, file: FileRef) -> Result<PathBuf> {
        let idx = file.0 - 1;
        if idx < 0 || idx as usize >= self.files.len() {
            return Err(IndexError::NotFound);
        }
        Ok(self.files[idx as usize].clone())
    }

    fn type_lookup(&mut self, tref: TypeRef) -> Result<(TypeEntry, SourceLoc)> {
        let idx = tref.0 - 1;
        if idx < 0 || idx as usize >= self.types.len() {
            return Err(IndexError::NotFound);
        }
        Ok(self.types[idx as usize])
    }

    fn member_lookup(&mut self, parent: TypeRef, name: &str) -> Result<(MemberEntry, SourceLoc)> {
        self.members
            .iter()
            .find(|(entry, _)| entry.parent == parent && like_match(name, &entry.name))
            .cloned()
            .ok_or(IndexError::NotFound)
    }

    fn typename_find<'a>(&'a mut self, pattern: &str) -> Result<Box<dyn TypenameCursor + 'a>> {
        let hits: Vec<TypenameHit> = self
            .typenames
            .iter()
            .filter(|(entry, _)| like_match(pattern, &entry.name))
            .map(|(entry, at)| TypenameHit {
                name: entry.name.clone(),
                kind: entry.kind,
                base: entry.base,
                loc: *at,
            })
            .collect();
        Ok(Box::new(MemCursor { hits, pos: None }))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

struct MemCursor {
    hits: Vec<TypenameHit>,
    pos: Option<usize>,
}

impl TypenameCursor for MemCursor {
    fn next(&mut self) -> Result<bool> {
        let next = self.pos.map_or(0, |p| p + 1);
        if next < self.hits.len() {
            self.pos = Some(next);
            Ok(true)
        } else {
            self.pos = Some(self.hits.len());
            Ok(false)
        }
    }

    fn peek(&self) -> Option<&TypenameHit> {
        self.pos.and_then(|p| self.hits.get(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    fn loc(file: i64, line: u32, col: u32) -> SourceLoc {
        SourceLoc::global(FileRef(file), line, col)
    }

    #[test]
    fn test_add_file_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("hdr.h");
        std::fs::write(&file, "struct s { int x; };").unwrap();

        let mut store = MemStore::new();
        let a = store.add_file(&file, 20).unwrap();
        let b = store.add_file(&file, 20).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.files.len(), 1);
    }

    #[test]
    fn test_add_file_canonical_spellings_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("hdr.h");
        std::fs::write(&file, "struct s;").unwrap();
        let dotted = tmp.path().join(".").join("hdr.h");

        let mut store = MemStore::new();
        let a = store.add_file(&file, 9).unwrap();
        let b = store.add_file(&dotted, 9).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.files.len(), 1);
    }

    #[test]
    fn test_type_roundtrip() {
        let mut store = MemStore::new();
        let entry = TypeEntry { kind: TypeKind::Struct, complete: true };
        let at = loc(1, 4, 1);
        let tref = store.type_insert(&at, &entry).unwrap();
        let (got, got_at) = store.type_lookup(tref).unwrap();
        assert_eq!(got, entry);
        assert_eq!(got_at, at);
    }

    #[test]
    fn test_typename_requires_existing_type() {
        let mut store = MemStore::new();
        let bad = TypenameEntry {
            name: "ghost".into(),
            kind: NameKind::Direct,
            base: TypeRef(9),
        };
        let err = store.typename_insert(&loc(1, 1, 1), &bad).unwrap_err();
        assert!(matches!(err, IndexError::Corruption(_)));
    }

    #[test]
    fn test_typename_lookup_keys() {
        let mut store = MemStore::new();
        let tref = store
            .type_insert(&loc(1, 1, 1), &TypeEntry { kind: TypeKind::Struct, complete: true })
            .unwrap();
        store
            .typename_insert(
                &loc(1, 1, 1),
                &TypenameEntry { name: "foo".into(), kind: NameKind::Direct, base: tref },
            )
            .unwrap();

        assert_eq!(
            store.typename_lookup(&loc(1, 9, 9), "foo", NameKind::Direct).unwrap(),
            tref
        );
        // Typedef namespace is disjoint from the tag namespace.
        assert!(store.typename_lookup(&loc(1, 9, 9), "foo", NameKind::Typedef).is_err());
        // Other file, no match.
        assert!(store.typename_lookup(&loc(2, 9, 9), "foo", NameKind::Direct).is_err());
    }

    #[test]
    fn test_member_lookup_like() {
        let mut store = MemStore::new();
        let tref = store
            .type_insert(&loc(1, 1, 1), &TypeEntry { kind: TypeKind::Struct, complete: true })
            .unwrap();
        store
            .member_insert(
                &loc(1, 1, 14),
                &MemberEntry { parent: tref, base: None, name: "count".into() },
            )
            .unwrap();

        assert!(store.member_lookup(tref, "count").is_ok());
        assert!(store.member_lookup(tref, "cou%").is_ok());
        assert!(store.member_lookup(tref, "missing").is_err());
    }

    #[test]
    fn test_cursor_borrow_discipline() {
        let mut store = MemStore::new();
        let tref = store
            .type_insert(&loc(1, 1, 1), &TypeEntry { kind: TypeKind::Struct, complete: true })
            .unwrap();
        for name in ["alpha", "alphabet"] {
            store
                .typename_insert(
                    &loc(1, 1, 1),
                    &TypenameEntry { name: name.into(), kind: NameKind::Typedef, base: tref },
                )
                .unwrap();
        }

        let mut cur = store.typename_find("alpha%").unwrap();
        assert!(cur.peek().is_none());
        assert!(cur.next().unwrap());
        assert_eq!(cur.peek().unwrap().name, "alpha");
        assert!(cur.next().unwrap());
        assert_eq!(cur.peek().unwrap().name, "alphabet");
        assert!(!cur.next().unwrap());
        assert!(cur.peek().is_none());
    }
}
