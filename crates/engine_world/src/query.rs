//! Query index: compiled presence predicates with live result sets.
//!
//! A [`CompiledQuery`] turns a [`QueryDescriptor`] into per-word `all`, `any`
//! and `none` masks and owns the [`SparseSet`] of entities that currently
//! satisfy it. The [`QueryIndex`] keeps those sets in step with the
//! [`EntityMaskTable`]: every attach or detach re-checks only the mutated
//! entity against the queries that mention the mutated bit.
//!
//! An entity matches when, for every word `w`:
//!
//! ```text
//! (bits[w] & all[w]) == all[w]  AND  (bits[w] & none[w]) == 0
//! ```
//!
//! and, if the query has any `any` bits at all, `(bits[w] & any[w]) != 0`
//! holds for at least one word.

use std::collections::{BTreeMap, HashMap};

use engine_component::{ComponentBit, ComponentTypeId, Entity, QueryDescriptor, SparseSet};
use serde::{Deserialize, Serialize};

use crate::bitmask::{ComponentRegistry, EntityMaskTable};

/// Identifies a query within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub u32);

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query({})", self.0)
    }
}

/// A descriptor compiled against one world's component bits.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    descriptor: QueryDescriptor,
    all: Vec<u64>,
    any: Vec<u64>,
    none: Vec<u64>,
    has_any: bool,
    entities: SparseSet,
    entered: Vec<Entity>,
    exited: Vec<Entity>,
}

impl CompiledQuery {
    /// Compiles `descriptor`. Every type it names must already be registered
    /// in `components`.
    #[must_use]
    pub fn compile(descriptor: QueryDescriptor, components: &ComponentRegistry) -> Self {
        let words = components.word_count();
        let fold = |types: &[ComponentTypeId]| {
            let mut masks = vec![0u64; words];
            for bit in types.iter().filter_map(|&ty| components.bit(ty)) {
                masks[bit.word] |= bit.mask;
            }
            masks
        };

        let all = fold(descriptor.required());
        let any = fold(descriptor.any_of());
        let none = fold(descriptor.excluded());
        let has_any = any.iter().any(|&m| m != 0);

        Self {
            descriptor,
            all,
            any,
            none,
            has_any,
            entities: SparseSet::new(),
            entered: Vec::new(),
            exited: Vec::new(),
        }
    }

    /// The descriptor this query was compiled from.
    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Entities currently matching, in dense order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.entities.as_slice()
    }

    /// Returns `true` if `entity` is in the result set.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Returns `true` if a freshly created entity with no components can
    /// match, so the query must be checked at creation time.
    #[must_use]
    pub fn is_exclusion_only(&self) -> bool {
        self.descriptor.is_exclusion_only()
    }

    /// Evaluates the predicate against the current bits of `entity`.
    ///
    /// The `any` term is satisfied by a hit in any single word, not by a hit
    /// in every word that carries `any` bits. A per-word check would turn
    /// `any {A, B}` into `all {A, B}` when A and B land in different words.
    #[must_use]
    pub fn matches(&self, masks: &EntityMaskTable, entity: Entity) -> bool {
        let mut any_hit = !self.has_any;
        for w in 0..self.all.len() {
            let bits = masks.word(w, entity);
            if bits & self.all[w] != self.all[w] || bits & self.none[w] != 0 {
                return false;
            }
            any_hit |= bits & self.any[w] != 0;
        }
        any_hit
    }

    /// Returns `true` if the predicate mentions `bit`.
    #[must_use]
    pub fn touches(&self, bit: ComponentBit) -> bool {
        bit.word < self.all.len()
            && (self.all[bit.word] | self.any[bit.word] | self.none[bit.word]) & bit.mask != 0
    }

    /// Re-evaluates `entity` and records an enter or exit transition.
    pub(crate) fn check(&mut self, masks: &EntityMaskTable, entity: Entity) {
        let matched = self.matches(masks, entity);
        if matched {
            if self.entities.insert(entity) {
                self.entered.push(entity);
            }
        } else if self.entities.remove(entity) {
            self.exited.push(entity);
        }
    }

    /// Adds `entity` without recording a transition. Used for the initial
    /// population of a new query.
    pub(crate) fn seed(&mut self, masks: &EntityMaskTable, entity: Entity) {
        if self.matches(masks, entity) {
            self.entities.insert(entity);
        }
    }

    /// Drops `entity` regardless of its bits. Returns `true` if it was a
    /// member.
    pub(crate) fn evict(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity) {
            self.exited.push(entity);
            return true;
        }
        false
    }

    /// Takes the entities that started matching since the last drain.
    pub fn drain_entered(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.entered)
    }

    /// Takes the entities that stopped matching since the last drain.
    pub fn drain_exited(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.exited)
    }
}

/// All queries registered in one world.
#[derive(Debug, Clone, Default)]
pub struct QueryIndex {
    queries: BTreeMap<QueryId, CompiledQuery>,
    by_descriptor: HashMap<QueryDescriptor, QueryId>,
    next_id: u32,
}

impl QueryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The id of an already registered descriptor.
    #[must_use]
    pub fn find(&self, descriptor: &QueryDescriptor) -> Option<QueryId> {
        self.by_descriptor.get(descriptor).copied()
    }

    /// Registers a compiled query under a fresh id.
    pub fn insert(&mut self, query: CompiledQuery) -> QueryId {
        let id = QueryId(self.next_id);
        self.next_id += 1;
        self.by_descriptor.insert(query.descriptor.clone(), id);
        self.queries.insert(id, query);
        id
    }

    /// Unregisters a query.
    pub fn remove(&mut self, id: QueryId) -> Option<CompiledQuery> {
        let query = self.queries.remove(&id)?;
        self.by_descriptor.remove(&query.descriptor);
        Some(query)
    }

    /// Returns a registered query.
    #[must_use]
    pub fn get(&self, id: QueryId) -> Option<&CompiledQuery> {
        self.queries.get(&id)
    }

    /// Returns a registered query mutably.
    pub fn get_mut(&mut self, id: QueryId) -> Option<&mut CompiledQuery> {
        self.queries.get_mut(&id)
    }

    /// Number of registered queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns `true` if no query is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Classifies a newly created entity against exclusion-only queries.
    pub(crate) fn on_spawn(&mut self, masks: &EntityMaskTable, entity: Entity) {
        for query in self.queries.values_mut() {
            if query.is_exclusion_only() {
                query.check(masks, entity);
            }
        }
    }

    /// Re-checks `entity` against every query that mentions `bit`.
    pub(crate) fn on_change(&mut self, masks: &EntityMaskTable, bit: ComponentBit, entity: Entity) {
        for query in self.queries.values_mut() {
            if query.touches(bit) {
                query.check(masks, entity);
            }
        }
    }

    /// Removes `entity` from every query, whatever its bits say.
    pub(crate) fn evict_all(&mut self, entity: Entity) {
        for query in self.queries.values_mut() {
            query.evict(entity);
        }
    }
}
