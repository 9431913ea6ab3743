//! Core data types: durable references, source locations, record entries.

use serde::{Deserialize, Serialize};

// ─── References ──────────────────────────────────────────────────────

/// Durable id of a `file` row.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRef(pub i64);

/// Durable id of a `type` row.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(pub i64);

/// Durable id of a function. Always 0 for now: only global scope is indexed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncRef(pub i64);

impl FuncRef {
    pub const GLOBAL: FuncRef = FuncRef(0);
}

/// Transient, translation-unit-local identity of a type: the AST node id of
/// its defining specifier. Never persisted; meaningless once the tree is
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueId(pub usize);

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Source locations ────────────────────────────────────────────────

/// Origin of a record. `func` is 0 and `scope` is 0 at global scope; `line`
/// and `column` are 1-based.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: FileRef,
    pub func: FuncRef,
    pub scope: u32,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    /// A global-scope location in `file`.
    pub fn global(file: FileRef, line: u32, column: u32) -> Self {
        Self {
            file,
            func: FuncRef::GLOBAL,
            scope: 0,
            line,
            column,
        }
    }
}

// ─── Record kinds ────────────────────────────────────────────────────

/// What sort of aggregate a `type` row describes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Struct,
    Union,
    Enum,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Struct),
            1 => Some(Self::Union),
            2 => Some(Self::Enum),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Struct => 0,
            Self::Union => 1,
            Self::Enum => 2,
        }
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TypeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "struct" => Ok(Self::Struct),
            "union" => Ok(Self::Union),
            "enum" => Ok(Self::Enum),
            other => Err(format!("unknown type kind: '{}'", other)),
        }
    }
}

/// How a typename refers to its type: an elaborated tag (`struct foo`), a
/// typedef name, or the name of a variable of an otherwise unnamed type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Direct,
    Typedef,
    Var,
}

impl NameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Typedef => "typedef",
            Self::Var => "var",
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Direct),
            1 => Some(Self::Typedef),
            2 => Some(Self::Var),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Direct => 0,
            Self::Typedef => 1,
            Self::Var => 2,
        }
    }
}

/// The syntactic role of a non-definition type mention.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseKind {
    Decl,
    Init,
    Param,
    Cast,
    Sizeof,
}

impl UseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decl => "decl",
            Self::Init => "init",
            Self::Param => "param",
            Self::Cast => "cast",
            Self::Sizeof => "sizeof",
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Decl),
            1 => Some(Self::Init),
            2 => Some(Self::Param),
            3 => Some(Self::Cast),
            4 => Some(Self::Sizeof),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Decl => 0,
            Self::Init => 1,
            Self::Param => 2,
            Self::Cast => 3,
            Self::Sizeof => 4,
        }
    }
}

// ─── Record entries ──────────────────────────────────────────────────

/// A user-defined aggregate type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEntry {
    pub kind: TypeKind,
    pub complete: bool,
}

/// A name by which a type can be referred to. `base` must resolve to an
/// existing type row; violating this is corruption.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TypenameEntry {
    pub name: String,
    pub kind: NameKind,
    pub base: TypeRef,
}

/// A field of a struct or union. `base` is `None` when the field's type is
/// not a user-defined aggregate (primitives, unresolved tags).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub parent: TypeRef,
    pub base: Option<TypeRef>,
    pub name: String,
}

/// A non-definition mention of a type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeUseEntry {
    pub base: TypeRef,
    pub kind: UseKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_kind_roundtrip() {
        for kind in [TypeKind::Struct, TypeKind::Union, TypeKind::Enum] {
            let parsed: TypeKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
            assert_eq!(TypeKind::from_i64(kind.as_i64()), Some(kind));
        }
    }

    #[test]
    fn test_type_kind_parse_invalid() {
        assert!("class".parse::<TypeKind>().is_err());
        assert!(TypeKind::from_i64(3).is_none());
        assert!(TypeKind::from_i64(-1).is_none());
    }

    #[test]
    fn test_name_kind_roundtrip() {
        for kind in [NameKind::Direct, NameKind::Typedef, NameKind::Var] {
            assert_eq!(NameKind::from_i64(kind.as_i64()), Some(kind));
        }
        assert!(NameKind::from_i64(7).is_none());
    }

    #[test]
    fn test_use_kind_roundtrip() {
        for kind in [
            UseKind::Decl,
            UseKind::Init,
            UseKind::Param,
            UseKind::Cast,
            UseKind::Sizeof,
        ] {
            assert_eq!(UseKind::from_i64(kind.as_i64()), Some(kind));
        }
        assert!(UseKind::from_i64(5).is_none());
    }

    #[test]
    fn test_global_location() {
        let loc = SourceLoc::global(FileRef(3), 10, 2);
        assert_eq!(loc.func, FuncRef::GLOBAL);
        assert_eq!(loc.scope, 0);
        assert_eq!(loc.line, 10);
        assert_eq!(loc.column, 2);
    }

    #[test]
    fn test_ref_display() {
        assert_eq!(TypeRef(42).to_string(), "42");
        assert_eq!(FileRef(1).to_string(), "1");
    }
}
