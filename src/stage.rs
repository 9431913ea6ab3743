//! Staging scoreboard: the in-memory transactional buffer for all records
//! emitted while one top-level aggregate's subtree is walked.
//!
//! The declarator that names an unnamed aggregate arrives only after the
//! aggregate's body has been visited, so nothing can be persisted during the
//! walk. Records are staged here and drained as a unit: commit resolves each
//! staged type against the durable store (reusing a preexisting id when the
//! same typename is already indexed), then translates member and use records
//! through the resulting id maps. Aggregates that never received a name are
//! dropped, and their members with them.

use std::collections::HashMap;

use crate::error::{IndexError, Result};
use crate::model::{
    MemberEntry, NameKind, OpaqueId, SourceLoc, TypeEntry, TypeRef, TypeUseEntry, TypenameEntry,
    UseKind,
};
use crate::store::RecordStore;

/// The name a staged aggregate will be inserted under.
#[derive(Debug, Clone)]
pub struct StagedName {
    pub name: String,
    pub kind: NameKind,
    pub loc: SourceLoc,
}

#[derive(Debug)]
struct StagedType {
    opaque: OpaqueId,
    entry: TypeEntry,
    loc: SourceLoc,
    name: Option<StagedName>,
}

#[derive(Debug)]
struct StagedMember {
    parent: OpaqueId,
    base: Option<OpaqueId>,
    name: String,
    loc: SourceLoc,
}

#[derive(Debug)]
struct StagedUse {
    /// The aggregate whose definition contains the use. Commit suppresses
    /// uses whose enclosing aggregate turned out to be a duplicate, so
    /// re-walking a shared header does not duplicate use rows.
    enclosing: OpaqueId,
    base: OpaqueId,
    kind: UseKind,
    loc: SourceLoc,
}

/// Per-aggregate staging buffer. Must be empty when a top-level aggregate is
/// entered and is empty again after `commit`.
#[derive(Default)]
pub struct Scoreboard {
    types: Vec<StagedType>,
    members: Vec<StagedMember>,
    uses: Vec<StagedUse>,
    /// Opaque id → index into `types`, only for aggregates whose name is
    /// still unknown (candidates for a later declarator-supplied name).
    unnamed: HashMap<OpaqueId, usize>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.members.is_empty()
            && self.uses.is_empty()
            && self.unnamed.is_empty()
    }

    /// Stage a type. A type staged without a name is enrolled as a naming
    /// candidate; if nothing adopts it before commit it is discarded.
    pub fn stage_type(
        &mut self,
        opaque: OpaqueId,
        entry: TypeEntry,
        loc: SourceLoc,
        name: Option<StagedName>,
    ) {
        let idx = self.types.len();
        if name.is_none() {
            self.unnamed.insert(opaque, idx);
        }
        self.types.push(StagedType { opaque, entry, loc, name });
    }

    pub fn stage_member(
        &mut self,
        parent: OpaqueId,
        base: Option<OpaqueId>,
        name: String,
        loc: SourceLoc,
    ) {
        self.members.push(StagedMember { parent, base, name, loc });
    }

    pub fn stage_use(&mut self, enclosing: OpaqueId, base: OpaqueId, kind: UseKind, loc: SourceLoc) {
        self.uses.push(StagedUse { enclosing, base, kind, loc });
    }

    /// Whether `opaque` is a staged aggregate still waiting for a name.
    pub fn is_unnamed(&self, opaque: OpaqueId) -> bool {
        self.unnamed.contains_key(&opaque)
    }

    /// Supply the late name for an unnamed staged aggregate. Returns `false`
    /// when `opaque` is not an unnamed candidate.
    pub fn adopt_name(&mut self, opaque: OpaqueId, name: StagedName) -> bool {
        match self.unnamed.remove(&opaque) {
            Some(idx) => {
                self.types[idx].name = Some(name);
                true
            }
            None => false,
        }
    }

    /// Drain the scoreboard into the store.
    ///
    /// Types go first so self-referential members can resolve their base.
    /// For each named type, a preexisting equal typename in the store marks
    /// the whole aggregate as a duplicate: the prior durable id is recorded
    /// in `tu_map` and nothing is inserted. Fresh inserts are tracked in a
    /// new-types-only sub-map; member parents translate through that sub-map
    /// alone, which is what suppresses the subtree of a duplicate aggregate.
    /// The sub-map is merged into `tu_map` at the end.
    pub fn commit(
        &mut self,
        store: &mut dyn RecordStore,
        tu_map: &mut HashMap<OpaqueId, TypeRef>,
    ) -> Result<()> {
        let mut new_types: HashMap<OpaqueId, TypeRef> = HashMap::new();

        for staged in &self.types {
            // Never-named aggregates are dropped here; their members fail
            // parent translation below.
            let Some(name) = &staged.name else { continue };

            match store.typename_lookup(&name.loc, &name.name, name.kind) {
                Ok(existing) => {
                    tu_map.insert(staged.opaque, existing);
                }
                Err(IndexError::NotFound) => {
                    let tref = store.type_insert(&staged.loc, &staged.entry)?;
                    new_types.insert(staged.opaque, tref);
                    store.typename_insert(
                        &name.loc,
                        &TypenameEntry {
                            name: name.name.clone(),
                            kind: name.kind,
                            base: tref,
                        },
                    )?;
                }
                Err(e) => return Err(e),
            }
        }

        for member in &self.members {
            let Some(parent) = new_types.get(&member.parent) else {
                continue;
            };
            let base = match member.base {
                None => None,
                Some(opaque) => match new_types.get(&opaque).or_else(|| tu_map.get(&opaque)) {
                    Some(tref) => Some(*tref),
                    None => continue,
                },
            };
            store.member_insert(
                &member.loc,
                &MemberEntry {
                    parent: *parent,
                    base,
                    name: member.name.clone(),
                },
            )?;
        }

        for type_use in &self.uses {
            if !new_types.contains_key(&type_use.enclosing) {
                continue;
            }
            let Some(base) = new_types
                .get(&type_use.base)
                .or_else(|| tu_map.get(&type_use.base))
            else {
                continue;
            };
            store.type_use_insert(
                &type_use.loc,
                &TypeUseEntry {
                    base: *base,
                    kind: type_use.kind,
                },
            )?;
        }

        tu_map.extend(new_types);
        self.clear();
        Ok(())
    }

    /// Drop all staged records without persisting anything.
    pub fn clear(&mut self) {
        self.types.clear();
        self.members.clear();
        self.uses.clear();
        self.unnamed.clear();
    }
}
