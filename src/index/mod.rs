//! AST translator: drives the per-translation-unit cursor visits and turns
//! them into staged records, committed aggregate-by-aggregate.
//!
//! The ordering problem this module exists for: the declarator that names an
//! unnamed aggregate (`typedef struct { … } foo_t;`) is visited after the
//! aggregate's whole subtree. Every top-level aggregate is therefore staged
//! in the scoreboard and committed only when the next sibling visit (or the
//! end of the file) has settled its name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::compdb;
use crate::error::{IndexError, Result};
use crate::front::{
    self, aggregate_kind, declarator_name, node_pos, node_text, tag_name, DeclRole, DeclVisit,
    Frontend, Resolver, SourceFile, Visit,
};
use crate::model::{
    FileRef, NameKind, OpaqueId, SourceLoc, TypeEntry, TypeRef, TypeUseEntry, TypenameEntry,
    UseKind,
};
use crate::stage::{Scoreboard, StagedName};
use crate::store::RecordStore;

/// Per-translation-unit translator state. Reset for every root source; the
/// durable tables are unaffected by the reset.
struct TuState {
    /// Opaque id → durable id, for every aggregate resolved so far in this
    /// TU (fresh inserts and duplicates alike).
    type_map: HashMap<OpaqueId, TypeRef>,
    resolver: Resolver,
    scoreboard: Scoreboard,
    /// The just-dispatched top-level aggregate, awaiting its naming sibling.
    last_aggregate: Option<OpaqueId>,
    /// File currently being walked.
    file: FileRef,
}

impl TuState {
    fn new() -> Self {
        Self {
            type_map: HashMap::new(),
            resolver: Resolver::new(),
            scoreboard: Scoreboard::new(),
            last_aggregate: None,
            file: FileRef(0),
        }
    }
}

/// The indexer: owns the frontend, borrows the record store.
pub struct Indexer<'s> {
    store: &'s mut dyn RecordStore,
    frontend: Frontend,
}

impl<'s> Indexer<'s> {
    pub fn new(store: &'s mut dyn RecordStore) -> Result<Self> {
        Ok(Self {
            store,
            frontend: Frontend::new()?,
        })
    }

    /// Index one translation unit: the root source and its quoted includes.
    pub fn index_file(&mut self, source: &Path, include_dirs: &[PathBuf]) -> Result<()> {
        let unit = self.frontend.parse_unit(source, include_dirs)?;
        let mut state = TuState::new();

        // Inclusion enumeration first: every file of the unit gets its
        // durable ref before any record is built.
        let mut refs = Vec::with_capacity(unit.files.len());
        for file in &unit.files {
            refs.push(self.store.add_file(&file.path, file.len())?);
        }

        for (file, fref) in unit.files.iter().zip(refs) {
            state.file = fref;
            self.walk_file(&mut state, file)?;
        }

        info!(
            source = %source.display(),
            files = unit.files.len(),
            types = state.type_map.len(),
            "indexed translation unit"
        );
        Ok(())
    }

    /// Index every entry of a compile-commands database directory.
    pub fn index_compile_commands(&mut self, dir: &Path) -> Result<()> {
        let commands = compdb::load(dir)?;
        info!(dir = %dir.display(), entries = commands.len(), "loaded compile commands");
        for command in &commands {
            let source = command.source_path();
            let include_dirs = command.include_dirs();
            match self.index_file(&source, &include_dirs) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(source = %source.display(), error = %e, "skipping translation unit"),
            }
        }
        Ok(())
    }

    // ─── Top-level visitation ────────────────────────────────────

    fn walk_file(&mut self, state: &mut TuState, file: &SourceFile) -> Result<()> {
        for visit in front::top_level_visits(file) {
            // A pending aggregate commits once its naming sibling has been
            // seen; a sibling consumed as the name is not dispatched again.
            if state.last_aggregate.is_some() {
                let consumed = self.settle_pending(state, file, Some(&visit))?;
                if consumed {
                    continue;
                }
            }

            let result = self.dispatch(state, file, &visit);
            if let Err(e) = result {
                if e.is_fatal() {
                    return Err(e);
                }
                note_skip(&e, file, &visit);
            }
        }

        // End of file: nothing can name the pending aggregate anymore.
        if state.last_aggregate.is_some() {
            self.settle_pending(state, file, None)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, state: &mut TuState, file: &SourceFile, visit: &Visit<'_>) -> Result<()> {
        match visit {
            Visit::Aggregate(spec) => self.index_aggregate(state, file, *spec),
            Visit::ForwardDecl(_) => Err(IndexError::Unimplemented("incomplete aggregate types")),
            Visit::Decl(decl) => match decl.role {
                DeclRole::Typedef => self.index_typedef(state, file, decl),
                DeclRole::Var => self.index_var(state, file, decl),
            },
            Visit::Other(_) => Ok(()),
        }
    }

    /// Resolve the pending aggregate's late name against `next` (the sibling
    /// visit, or `None` at end of file), then commit the scoreboard.
    /// Returns whether the sibling was consumed as the name.
    fn settle_pending(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        next: Option<&Visit<'_>>,
    ) -> Result<bool> {
        let pending = state
            .last_aggregate
            .take()
            .expect("settle_pending requires a pending aggregate");

        let mut consumed = false;
        if state.scoreboard.is_unnamed(pending) {
            if let Some(Visit::Decl(decl)) = next {
                consumed = self.try_adopt(state, file, decl, pending);
            }
        }

        match state.scoreboard.commit(self.store, &mut state.type_map) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, file = %file.path.display(), "aggregate commit failed, records dropped");
                state.scoreboard.clear();
            }
        }
        Ok(consumed)
    }

    /// Adopt the sibling declarator's spelling as the pending aggregate's
    /// typename if its canonical type is the pending aggregate itself.
    fn try_adopt(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        decl: &DeclVisit<'_>,
        pending: OpaqueId,
    ) -> bool {
        if !decl.bare {
            return false;
        }
        let Some(name_node) = decl.name else {
            return false;
        };
        if state.resolver.resolve_specifier(decl.specifier, &file.text) != Some(pending) {
            return false;
        }

        let name = node_text(name_node, &file.text).to_string();
        let kind = match decl.role {
            DeclRole::Typedef => NameKind::Typedef,
            DeclRole::Var => NameKind::Var,
        };
        let (line, column) = node_pos(name_node);
        let adopted = state.scoreboard.adopt_name(
            pending,
            StagedName {
                name: name.clone(),
                kind,
                loc: SourceLoc::global(state.file, line, column),
            },
        );
        if adopted && decl.role == DeclRole::Typedef {
            state.resolver.register_typedef(&name, pending);
        }
        adopted
    }

    // ─── Aggregate indexing ──────────────────────────────────────

    fn index_aggregate(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        spec: tree_sitter::Node<'_>,
    ) -> Result<()> {
        assert!(
            state.scoreboard.is_empty(),
            "scoreboard must be empty on top-level aggregate entry"
        );

        let opaque = self.stage_aggregate(state, file, spec)?;
        let mut parents = vec![opaque];
        self.walk_aggregate_body(state, file, spec, &mut parents)?;
        debug_assert_eq!(parents.len(), 1);

        state.last_aggregate = Some(opaque);
        Ok(())
    }

    /// Stage one aggregate definition (top-level or nested named) and
    /// register its tag. Returns its opaque identity.
    fn stage_aggregate(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        spec: tree_sitter::Node<'_>,
    ) -> Result<OpaqueId> {
        let kind = aggregate_kind(spec).expect("caller checked the specifier kind");
        let opaque = OpaqueId(spec.id());
        let (line, column) = node_pos(spec);
        let loc = SourceLoc::global(state.file, line, column);

        let name = tag_name(spec).map(|tag| {
            let text = node_text(tag, &file.text).to_string();
            state.resolver.register_tag(&text, opaque);
            StagedName {
                name: text,
                kind: NameKind::Direct,
                loc,
            }
        });

        state
            .scoreboard
            .stage_type(opaque, TypeEntry { kind, complete: true }, loc, name);
        Ok(opaque)
    }

    /// Visit the children of an aggregate body, attributing fields to the
    /// nearest named ancestor on the current-parent stack.
    fn walk_aggregate_body(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        spec: tree_sitter::Node<'_>,
        parents: &mut Vec<OpaqueId>,
    ) -> Result<()> {
        let Some(body) = spec.child_by_field_name("body") else {
            return Ok(());
        };

        if body.kind() == "enumerator_list" {
            let constants = body.named_child_count();
            if constants > 0 {
                debug!(constants, "enum constants not indexed");
            }
            return Ok(());
        }

        let mut cursor = body.walk();
        let fields: Vec<tree_sitter::Node<'_>> = body.named_children(&mut cursor).collect();
        for field in fields {
            if field.kind() != "field_declaration" {
                continue;
            }
            self.index_field(state, file, field, parents)?;
        }
        Ok(())
    }

    fn index_field(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        field: tree_sitter::Node<'_>,
        parents: &mut Vec<OpaqueId>,
    ) -> Result<()> {
        let Some(ftype) = field.child_by_field_name("type") else {
            return Ok(());
        };
        let (line, column) = node_pos(field);
        let loc = SourceLoc::global(state.file, line, column);

        // A nested definition site first: named nested aggregates become
        // staged types of their own (the C rule puts their tag in the
        // enclosing file scope, so they commit alongside the top level);
        // anonymous ones merge into the nearest named ancestor.
        if aggregate_kind(ftype).is_some() && ftype.child_by_field_name("body").is_some() {
            if tag_name(ftype).is_some() {
                let nested = self.stage_aggregate(state, file, ftype)?;
                parents.push(nested);
                self.walk_aggregate_body(state, file, ftype, parents)?;
                parents.pop();
            } else {
                self.walk_aggregate_body(state, file, ftype, parents)?;
            }
        }

        let parent = *parents.last().expect("parent stack is never empty");
        let base = self.field_base(state, file, ftype);

        let mut declarators = Vec::new();
        let mut cursor = field.walk();
        for declarator in field.children_by_field_name("declarator", &mut cursor) {
            declarators.push(declarator);
        }

        for declarator in declarators {
            let Some(name_node) = declarator_name(declarator) else {
                continue;
            };
            let name = node_text(name_node, &file.text).to_string();

            // A field can be the declarator that names a staged unnamed
            // aggregate: its spelling becomes a var typename.
            if let Some(identity) = state.resolver.resolve_specifier(ftype, &file.text) {
                if state.scoreboard.is_unnamed(identity) {
                    let (nl, nc) = node_pos(name_node);
                    state.scoreboard.adopt_name(
                        identity,
                        StagedName {
                            name: name.clone(),
                            kind: NameKind::Var,
                            loc: SourceLoc::global(state.file, nl, nc),
                        },
                    );
                }
            }

            state.scoreboard.stage_member(parent, base, name, loc);
            if let Some(base) = base {
                state.scoreboard.stage_use(parent, base, UseKind::Decl, loc);
            }
        }
        Ok(())
    }

    /// The aggregate identity of a field's type, if it has one. Pointer and
    /// array declarators do not affect this: `struct s *next` has base `s`.
    /// A bodied specifier without a tag is the anonymous case and has no
    /// identity of its own.
    fn field_base(
        &self,
        state: &TuState,
        file: &SourceFile,
        ftype: tree_sitter::Node<'_>,
    ) -> Option<OpaqueId> {
        if aggregate_kind(ftype).is_some()
            && ftype.child_by_field_name("body").is_some()
            && tag_name(ftype).is_none()
        {
            return None;
        }
        state.resolver.resolve_specifier(ftype, &file.text)
    }

    // ─── Typedef and variable declarations ───────────────────────

    /// `typedef struct foo foo_t;` and friends. Typedefs whose canonical
    /// type is not a known aggregate are silently skipped.
    fn index_typedef(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        decl: &DeclVisit<'_>,
    ) -> Result<()> {
        if !decl.bare {
            return Ok(());
        }
        let Some(name_node) = decl.name else {
            return Ok(());
        };
        let Some(opaque) = state.resolver.resolve_specifier(decl.specifier, &file.text) else {
            return Ok(());
        };
        let Some(base) = state.type_map.get(&opaque).copied() else {
            debug!("typedef of an unindexed aggregate, skipping");
            return Ok(());
        };

        let name = node_text(name_node, &file.text).to_string();
        state.resolver.register_typedef(&name, opaque);

        let (line, column) = node_pos(name_node);
        let loc = SourceLoc::global(state.file, line, column);

        match self.store.typename_lookup(&loc, &name, NameKind::Typedef) {
            Ok(existing) if existing == base => Ok(()),
            Ok(existing) => {
                error!(
                    typedef = %name,
                    existing = %existing,
                    new = %base,
                    "typedef already indexed with a different base type"
                );
                Ok(())
            }
            Err(IndexError::NotFound) => self.store.typename_insert(
                &loc,
                &TypenameEntry {
                    name,
                    kind: NameKind::Typedef,
                    base,
                },
            ),
            Err(e) => Err(e),
        }
    }

    /// A file-scope variable of an aggregate type is a use of that type.
    /// Variables of non-aggregate types are not indexed.
    fn index_var(
        &mut self,
        state: &mut TuState,
        file: &SourceFile,
        decl: &DeclVisit<'_>,
    ) -> Result<()> {
        if !decl.bare {
            return Ok(());
        }
        let Some(opaque) = state.resolver.resolve_specifier(decl.specifier, &file.text) else {
            return Ok(());
        };
        let Some(base) = state.type_map.get(&opaque).copied() else {
            return Ok(());
        };

        let (line, column) = node_pos(decl.decl);
        let loc = SourceLoc::global(state.file, line, column);
        self.store.type_use_insert(
            &loc,
            &TypeUseEntry {
                base,
                kind: UseKind::Decl,
            },
        )
    }
}

/// Log a recoverable per-node failure with the right severity for its kind.
fn note_skip(err: &IndexError, file: &SourceFile, visit: &Visit<'_>) {
    let (line, column) = match visit {
        Visit::Aggregate(n) | Visit::ForwardDecl(n) | Visit::Other(n) => node_pos(*n),
        Visit::Decl(d) => node_pos(d.decl),
    };
    match err {
        IndexError::Unimplemented(_) => {
            debug!(file = %file.path.display(), line, column, "{err}, node skipped");
        }
        IndexError::Corruption(_) => {
            error!(file = %file.path.display(), line, column, "{err}");
        }
        _ => {
            warn!(file = %file.path.display(), line, column, "{err}, node skipped");
        }
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
