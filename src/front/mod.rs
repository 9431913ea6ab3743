//! C frontend adapter over tree-sitter.
//!
//! Parses a translation unit (the root source plus its quoted includes,
//! header-first), and presents each file's top level as a stream of logical
//! cursor visits: an aggregate definition inside a declaration or typedef is
//! its own visit, followed by one visit per declarator. Tree-sitter node ids
//! serve as the translation-unit-local opaque type identities.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::warn;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{IndexError, Result};
use crate::model::{OpaqueId, TypeKind};
use crate::store::canonical_path;

// ─── Translation unit ────────────────────────────────────────────────

/// One parsed file of a translation unit.
pub struct SourceFile {
    /// Canonical path, the spelling stored in the file table.
    pub path: PathBuf,
    pub text: String,
    pub tree: Tree,
}

impl SourceFile {
    pub fn len(&self) -> u64 {
        self.text.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A root source plus everything it includes, each parsed once. Files are
/// ordered includes-first so a header's types are known before its includer
/// refers to them.
pub struct TranslationUnit {
    pub files: Vec<SourceFile>,
}

/// Owns the reusable parser instance.
pub struct Frontend {
    parser: Parser,
}

impl Frontend {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .map_err(|e| IndexError::Frontend(format!("loading C grammar: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse `root` and its quoted includes, resolved against the including
    /// file's directory and then `include_dirs`. Unresolvable and system
    /// includes are skipped; include cycles are broken by a visited set.
    pub fn parse_unit(&mut self, root: &Path, include_dirs: &[PathBuf]) -> Result<TranslationUnit> {
        let mut files = Vec::new();
        let mut visited = HashSet::new();
        self.load_recursive(root, include_dirs, &mut visited, &mut files)?;
        Ok(TranslationUnit { files })
    }

    fn load_recursive(
        &mut self,
        path: &Path,
        include_dirs: &[PathBuf],
        visited: &mut HashSet<PathBuf>,
        files: &mut Vec<SourceFile>,
    ) -> Result<()> {
        let canon = canonical_path(path);
        if !visited.insert(canon.clone()) {
            return Ok(());
        }

        let text = std::fs::read_to_string(&canon)?;
        let tree = self
            .parser
            .parse(&text, None)
            .ok_or_else(|| IndexError::Frontend(format!("parse failed: {}", canon.display())))?;

        let here = canon.parent().map(Path::to_path_buf);
        for include in quoted_includes(tree.root_node(), &text) {
            let Some(resolved) = resolve_include(&include, here.as_deref(), include_dirs) else {
                warn!(include = %include, from = %canon.display(), "include not found, skipping");
                continue;
            };
            self.load_recursive(&resolved, include_dirs, visited, files)?;
        }

        files.push(SourceFile { path: canon, text, tree });
        Ok(())
    }
}

/// Collect the paths of `#include "…"` directives, in source order.
/// System includes (`<…>`) do not define project types and are ignored.
fn quoted_includes(root: Node<'_>, src: &str) -> Vec<String> {
    fn scan(node: Node<'_>, src: &str, found: &mut Vec<String>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            if child.kind() == "preproc_include" {
                if let Some(path_node) = child.child_by_field_name("path") {
                    if path_node.kind() == "string_literal" {
                        let raw = node_text(path_node, src);
                        found.push(raw.trim_matches('"').to_string());
                    }
                }
            } else if child.kind().starts_with("preproc_") {
                // Includes can hide under #ifdef guards.
                scan(child, src, found);
            }
        }
    }

    let mut found = Vec::new();
    scan(root, src, &mut found);
    found
}

fn resolve_include(
    include: &str,
    here: Option<&Path>,
    include_dirs: &[PathBuf],
) -> Option<PathBuf> {
    if let Some(dir) = here {
        let candidate = dir.join(include);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    for dir in include_dirs {
        let candidate = dir.join(include);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

// ─── Logical top-level cursor stream ─────────────────────────────────

/// What role a declarator-bearing visit plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclRole {
    Typedef,
    Var,
}

/// One logical top-level cursor visit.
pub enum Visit<'t> {
    /// A struct/union/enum specifier with a body: a definition site.
    Aggregate(Node<'t>),
    /// `struct foo;`: incomplete, not indexed.
    ForwardDecl(Node<'t>),
    /// One declarator of a typedef or file-scope variable declaration.
    Decl(DeclVisit<'t>),
    /// Anything else (functions, preprocessor lines, stray nodes).
    Other(Node<'t>),
}

/// A typedef or variable declarator together with its type specifier.
pub struct DeclVisit<'t> {
    pub role: DeclRole,
    /// The whole `declaration` / `type_definition` node.
    pub decl: Node<'t>,
    /// The type portion (specifier or type identifier).
    pub specifier: Node<'t>,
    /// The identifier leaf naming the declared entity, if the declarator is
    /// well-formed.
    pub name: Option<Node<'t>>,
    /// True when the declarator is a plain (possibly parenthesized)
    /// identifier. Pointer, array, and function declarators change the
    /// canonical type to a non-aggregate.
    pub bare: bool,
}

/// Decompose one file's top level into the logical visit stream.
pub fn top_level_visits<'t>(file: &'t SourceFile) -> Vec<Visit<'t>> {
    let mut visits = Vec::new();
    let root = file.tree.root_node();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                if child.child_by_field_name("body").is_some() {
                    visits.push(Visit::Aggregate(child));
                } else {
                    visits.push(Visit::ForwardDecl(child));
                }
            }
            "declaration" => push_decl_visits(child, DeclRole::Var, &mut visits),
            "type_definition" => push_decl_visits(child, DeclRole::Typedef, &mut visits),
            _ => visits.push(Visit::Other(child)),
        }
    }
    visits
}

fn push_decl_visits<'t>(decl: Node<'t>, role: DeclRole, visits: &mut Vec<Visit<'t>>) {
    let Some(specifier) = decl.child_by_field_name("type") else {
        visits.push(Visit::Other(decl));
        return;
    };

    let mut declarators = Vec::new();
    let mut cursor = decl.walk();
    for declarator in decl.children_by_field_name("declarator", &mut cursor) {
        declarators.push(declarator);
    }

    if aggregate_kind(specifier).is_some() {
        if specifier.child_by_field_name("body").is_some() {
            visits.push(Visit::Aggregate(specifier));
        } else if declarators.is_empty() {
            // `struct foo;` parsed as a declaration without declarators.
            visits.push(Visit::ForwardDecl(specifier));
            return;
        }
    }

    for declarator in declarators {
        visits.push(Visit::Decl(DeclVisit {
            role,
            decl,
            specifier,
            name: declarator_name(declarator),
            bare: declarator_is_bare(declarator),
        }));
    }
}

// ─── Node helpers ────────────────────────────────────────────────────

pub fn node_text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

/// 1-based (line, column) of a node's start.
pub fn node_pos(node: Node<'_>) -> (u32, u32) {
    let p = node.start_position();
    (p.row as u32 + 1, p.column as u32 + 1)
}

/// The `TypeKind` of an aggregate specifier node.
pub fn aggregate_kind(node: Node<'_>) -> Option<TypeKind> {
    match node.kind() {
        "struct_specifier" => Some(TypeKind::Struct),
        "union_specifier" => Some(TypeKind::Union),
        "enum_specifier" => Some(TypeKind::Enum),
        _ => None,
    }
}

/// The tag identifier of an aggregate specifier, if any.
pub fn tag_name<'t>(node: Node<'t>) -> Option<Node<'t>> {
    node.child_by_field_name("name")
}

/// Descend through derived declarators to the identifier leaf.
pub fn declarator_name(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" => Some(node),
        "pointer_declarator"
        | "array_declarator"
        | "function_declarator"
        | "init_declarator"
        | "parenthesized_declarator" => {
            let inner = node
                .child_by_field_name("declarator")
                .or_else(|| node.named_child(0))?;
            declarator_name(inner)
        }
        _ => None,
    }
}

/// Whether the declarator leaves the declared entity's type equal to the
/// specifier's type (no pointer/array/function derivation).
pub fn declarator_is_bare(node: Node<'_>) -> bool {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" => true,
        "init_declarator" | "parenthesized_declarator" => node
            .child_by_field_name("declarator")
            .or_else(|| node.named_child(0))
            .is_some_and(declarator_is_bare),
        _ => false,
    }
}

// ─── Canonical type resolution ───────────────────────────────────────

/// Per-translation-unit registry resolving type spellings to the opaque
/// identity of the defining aggregate specifier. Tag names and typedef
/// names live in disjoint namespaces; typedef chains collapse at
/// registration time because a typedef records the already-resolved id.
#[derive(Default)]
pub struct Resolver {
    tags: HashMap<String, OpaqueId>,
    typedefs: HashMap<String, OpaqueId>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tag(&mut self, name: &str, opaque: OpaqueId) {
        self.tags.insert(name.to_string(), opaque);
    }

    pub fn register_typedef(&mut self, name: &str, opaque: OpaqueId) {
        self.typedefs.insert(name.to_string(), opaque);
    }

    /// Canonical aggregate identity of a type specifier node: a bodied
    /// specifier is its own identity, an elaborated tag reference resolves
    /// through the tag namespace, a lone type identifier through the typedef
    /// namespace. `None` for primitives and unknown names.
    pub fn resolve_specifier(&self, specifier: Node<'_>, src: &str) -> Option<OpaqueId> {
        if aggregate_kind(specifier).is_some() {
            if specifier.child_by_field_name("body").is_some() {
                return Some(OpaqueId(specifier.id()));
            }
            let tag = tag_name(specifier)?;
            return self.tags.get(node_text(tag, src)).copied();
        }
        if specifier.kind() == "type_identifier" {
            return self.typedefs.get(node_text(specifier, src)).copied();
        }
        None
    }

    pub fn clear(&mut self) {
        self.tags.clear();
        self.typedefs.clear();
    }
}

#[cfg(test)]
#[path = "front_tests.rs"]
mod tests;
