//! Per-world entity state.
//!
//! A [`World`] owns its identifier cursor, recycling pools, alive-entity
//! index, presence bitmask table, tag sets, local-id mapping and queries.
//! Worlds are created and mutated through a [`Universe`], which supplies the
//! process-wide recycling threshold and keeps the identifier→world map.
//!
//! [`Universe`]: crate::Universe

use std::collections::{HashMap, VecDeque};

use engine_component::{ComponentBit, ComponentTypeId, Entity, QueryDescriptor, SparseSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::bitmask::{ComponentRegistry, EntityMaskTable};
use crate::config::WorldConfig;
use crate::error::{Result, WorldError};
use crate::query::{CompiledQuery, QueryId, QueryIndex};

/// A unique world identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of queued ids automatic recycling waits for before reusing one.
fn reuse_floor(size: usize, threshold: f64) -> usize {
    (size as f64 * threshold).round() as usize
}

/// An isolated entity namespace.
#[derive(Debug)]
pub struct World {
    id: WorldId,
    size: usize,
    manual_entity_recycling: bool,
    entity_cursor: u32,
    /// Freed ids eligible for reuse, oldest first.
    recycled: VecDeque<Entity>,
    /// Freed ids waiting for a manual flush.
    removed: Vec<Entity>,
    alive: SparseSet,
    masks: EntityMaskTable,
    components: ComponentRegistry,
    /// Attached types of each alive entity, in attach order.
    entity_components: HashMap<Entity, Vec<ComponentTypeId>>,
    queries: QueryIndex,
    /// Serializer-local id → world id.
    local_entities: HashMap<Entity, Entity>,
    /// World id → serializer-local id.
    local_lookup: HashMap<Entity, Entity>,
}

impl World {
    /// Create an empty world of `size` identifiers.
    pub(crate) fn new(config: &WorldConfig, size: usize) -> Self {
        Self {
            id: WorldId::new_v4(),
            size,
            manual_entity_recycling: config.manual_entity_recycling,
            entity_cursor: 0,
            recycled: VecDeque::new(),
            removed: Vec::new(),
            alive: SparseSet::new(),
            masks: EntityMaskTable::new(size),
            components: ComponentRegistry::new(),
            entity_components: HashMap::new(),
            queries: QueryIndex::new(),
            local_entities: HashMap::new(),
            local_lookup: HashMap::new(),
        }
    }

    /// The world's id.
    #[must_use]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Maximum number of identifiers this world may issue.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` if freed ids wait for an explicit flush.
    #[must_use]
    pub fn manual_entity_recycling(&self) -> bool {
        self.manual_entity_recycling
    }

    /// The next never-issued identifier.
    #[must_use]
    pub fn entity_cursor(&self) -> u32 {
        self.entity_cursor
    }

    /// Returns `true` if `entity` is alive.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.alive.contains(entity)
    }

    /// Alive entities in dense order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.alive.as_slice()
    }

    /// Number of alive entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.alive.len()
    }

    /// The recycled pool followed by the ids still waiting for a flush.
    #[must_use]
    pub fn removed_entities(&self) -> Vec<Entity> {
        self.recycled
            .iter()
            .chain(self.removed.iter())
            .copied()
            .collect()
    }

    /// Ids eligible for reuse, oldest first.
    pub fn recycled(&self) -> impl Iterator<Item = Entity> + '_ {
        self.recycled.iter().copied()
    }

    /// Ids freed in a manual world that have not been flushed yet.
    #[must_use]
    pub fn pending_removed(&self) -> &[Entity] {
        &self.removed
    }

    /// The presence bitmask table.
    #[must_use]
    pub fn masks(&self) -> &EntityMaskTable {
        &self.masks
    }

    /// The component-type → bit assignments of this world.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// The registered queries.
    #[must_use]
    pub fn queries(&self) -> &QueryIndex {
        &self.queries
    }

    /// The component types attached to `entity`, in attach order.
    pub fn entity_components(&self, entity: Entity) -> Result<Vec<ComponentTypeId>> {
        if !entity.is_valid() {
            return Err(WorldError::InvalidEntity);
        }
        self.entity_components
            .get(&entity)
            .cloned()
            .ok_or(WorldError::EntityNotFound {
                world: self.id,
                entity,
            })
    }

    /// Returns `true` if `entity` is alive and has `type_id` attached.
    #[must_use]
    pub fn has_component(&self, type_id: ComponentTypeId, entity: Entity) -> bool {
        self.contains(entity)
            && self
                .components
                .bit(type_id)
                .is_some_and(|bit| self.masks.contains(bit, entity))
    }

    /// The world id mapped to a serializer-local id.
    #[must_use]
    pub fn local_entity(&self, local: Entity) -> Option<Entity> {
        self.local_entities.get(&local).copied()
    }

    /// The entities currently matching `query`.
    pub fn query_entities(&self, query: QueryId) -> Result<&[Entity]> {
        self.queries
            .get(query)
            .map(CompiledQuery::entities)
            .ok_or(WorldError::QueryNotFound {
                world: self.id,
                query,
            })
    }

    // -- Entity lifecycle --

    /// Hands out the next identifier according to the recycling mode.
    pub(crate) fn allocate(&mut self, reuse_threshold: f64) -> Result<Entity> {
        let exhausted = self.entity_cursor as usize >= self.size;
        let reuse = !self.recycled.is_empty()
            && (exhausted
                || self.manual_entity_recycling
                || self.recycled.len() > reuse_floor(self.size, reuse_threshold));

        let entity = if reuse {
            self.recycled.pop_front()
        } else if exhausted {
            None
        } else {
            let entity = Entity(self.entity_cursor);
            self.entity_cursor += 1;
            Some(entity)
        };

        let Some(entity) = entity else {
            warn!(world = %self.id, size = self.size, "max entities reached");
            return Err(WorldError::CapacityExhausted {
                world: self.id,
                size: self.size,
            });
        };

        debug_assert!(self.masks.is_entity_clear(entity));
        self.alive.insert(entity);
        self.entity_components.insert(entity, Vec::new());
        self.queries.on_spawn(&self.masks, entity);

        trace!(world = %self.id, entity = entity.id(), recycled = reuse, "entity added");
        Ok(entity)
    }

    /// Tears down `entity`. Returns `false` if it was not alive.
    pub(crate) fn despawn(&mut self, entity: Entity) -> bool {
        if !self.alive.contains(entity) {
            return false;
        }

        self.queries.evict_all(entity);

        if self.manual_entity_recycling {
            self.removed.push(entity);
        } else {
            self.recycled.push_back(entity);
        }

        self.alive.remove(entity);
        self.entity_components.remove(&entity);

        if let Some(local) = self.local_lookup.remove(&entity) {
            self.local_entities.remove(&local);
        }

        self.masks.clear_entity(entity);

        trace!(world = %self.id, entity = entity.id(), "entity removed");
        true
    }

    /// Makes every id waiting in the removed pool reusable, oldest first.
    pub(crate) fn flush_removed(&mut self) -> Result<usize> {
        if !self.manual_entity_recycling {
            return Err(WorldError::ManualRecyclingDisabled { world: self.id });
        }
        let flushed = self.removed.len();
        self.recycled.extend(self.removed.drain(..));
        debug!(world = %self.id, flushed, "flushed removed entities");
        Ok(flushed)
    }

    /// Grows the identifier space and every presence word to `size`.
    pub(crate) fn resize(&mut self, size: usize) {
        self.size = size;
        self.masks.resize(size);
    }

    /// Records that serializer-local id `local` refers to `entity`.
    pub(crate) fn set_local_entity(&mut self, local: Entity, entity: Entity) -> Result<()> {
        if !self.alive.contains(entity) {
            return Err(WorldError::EntityNotFound {
                world: self.id,
                entity,
            });
        }
        if let Some(previous) = self.local_lookup.insert(entity, local) {
            self.local_entities.remove(&previous);
        }
        if let Some(stale) = self.local_entities.insert(local, entity) {
            if stale != entity {
                self.local_lookup.remove(&stale);
            }
        }
        Ok(())
    }

    // -- Components --

    /// Returns the bit of `type_id`, growing the mask table if the type is
    /// the first one in a new word.
    fn register_component(&mut self, type_id: ComponentTypeId) -> ComponentBit {
        let (bit, added) = self.components.register(type_id);
        if added {
            self.masks.ensure_words(bit.word + 1);
            trace!(world = %self.id, component = %type_id, bit = bit.position(), "component registered");
        }
        bit
    }

    /// Attaches `type_id` to `entity`. Returns `false` if it was already
    /// attached.
    pub(crate) fn add_component(&mut self, type_id: ComponentTypeId, entity: Entity) -> Result<bool> {
        if !self.alive.contains(entity) {
            return Err(WorldError::EntityNotFound {
                world: self.id,
                entity,
            });
        }
        let bit = self.register_component(type_id);
        if self.masks.contains(bit, entity) {
            return Ok(false);
        }
        self.entity_components.entry(entity).or_default().push(type_id);

        self.masks.set(bit, entity);
        self.queries.on_change(&self.masks, bit, entity);
        Ok(true)
    }

    /// Detaches `type_id` from `entity`. Returns `false` if it was not
    /// attached.
    pub(crate) fn remove_component(&mut self, type_id: ComponentTypeId, entity: Entity) -> Result<bool> {
        if !self.alive.contains(entity) {
            return Err(WorldError::EntityNotFound {
                world: self.id,
                entity,
            });
        }
        let Some(bit) = self.components.bit(type_id) else {
            return Ok(false);
        };
        if !self.masks.contains(bit, entity) {
            return Ok(false);
        }
        if let Some(tags) = self.entity_components.get_mut(&entity) {
            tags.retain(|&t| t != type_id);
        }

        self.masks.clear(bit, entity);
        self.queries.on_change(&self.masks, bit, entity);
        Ok(true)
    }

    // -- Queries --

    /// Compiles and registers `descriptor`, or returns the id it already has.
    pub(crate) fn register_query(&mut self, descriptor: QueryDescriptor) -> QueryId {
        if let Some(id) = self.queries.find(&descriptor) {
            return id;
        }

        for type_id in descriptor.component_types() {
            self.register_component(type_id);
        }

        let mut query = CompiledQuery::compile(descriptor, &self.components);
        for entity in self.alive.iter() {
            query.seed(&self.masks, entity);
        }

        let id = self.queries.insert(query);
        debug!(
            world = %self.id,
            query = %id,
            matched = self.queries.get(id).map_or(0, |q| q.entities().len()),
            "query registered"
        );
        id
    }

    /// Unregisters `query`.
    pub(crate) fn remove_query(&mut self, query: QueryId) -> Result<()> {
        self.queries
            .remove(query)
            .map(|_| ())
            .ok_or(WorldError::QueryNotFound {
                world: self.id,
                query,
            })
    }

    pub(crate) fn query_mut(&mut self, query: QueryId) -> Result<&mut CompiledQuery> {
        let world = self.id;
        self.queries
            .get_mut(query)
            .ok_or(WorldError::QueryNotFound { world, query })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITION: ComponentTypeId = ComponentTypeId::from_name("Position");
    const VELOCITY: ComponentTypeId = ComponentTypeId::from_name("Velocity");

    fn world(size: usize) -> World {
        World::new(&WorldConfig::new(), size)
    }

    fn manual_world(size: usize) -> World {
        World::new(&WorldConfig::new().with_manual_entity_recycling(), size)
    }

    /// Presence bits and the tag set agree for every alive entity and type.
    fn assert_tags_mirror_bits(world: &World) {
        for &entity in world.entities() {
            let tags = world.entity_components(entity).unwrap();
            for &type_id in world.components().types() {
                let bit = world.components().bit(type_id).unwrap();
                assert_eq!(
                    world.masks().contains(bit, entity),
                    tags.contains(&type_id),
                    "{entity} disagrees on {type_id}"
                );
            }
        }
    }

    #[test]
    fn test_allocate_advances_cursor() {
        let mut w = world(10);
        assert_eq!(w.allocate(0.01).unwrap(), Entity(0));
        assert_eq!(w.allocate(0.01).unwrap(), Entity(1));
        assert_eq!(w.entity_cursor(), 2);
        assert_eq!(w.entity_count(), 2);
    }

    #[test]
    fn test_capacity_boundary() {
        let mut w = world(3);
        for expected in 0..3 {
            assert_eq!(w.allocate(0.01).unwrap(), Entity(expected));
        }
        let err = w.allocate(0.01).unwrap_err();
        assert!(matches!(err, WorldError::CapacityExhausted { size: 3, .. }));
        assert_eq!(w.entity_cursor(), 3);
        assert_eq!(w.entity_count(), 3);
    }

    #[test]
    fn test_automatic_reuse_waits_for_threshold() {
        // round(100 * 0.02) = 2 ids must be queued before reuse kicks in.
        let mut w = world(100);
        let ids: Vec<_> = (0..5).map(|_| w.allocate(0.02).unwrap()).collect();

        assert!(w.despawn(ids[0]));
        assert!(w.despawn(ids[1]));
        assert_eq!(w.allocate(0.02).unwrap(), Entity(5));

        assert!(w.despawn(ids[2]));
        // Three queued ids now exceed the floor: the oldest comes back.
        assert_eq!(w.allocate(0.02).unwrap(), ids[0]);
        assert_eq!(w.removed_entities(), vec![ids[1], ids[2]]);
    }

    #[test]
    fn test_exhausted_cursor_falls_back_to_recycled() {
        let mut w = world(2);
        let a = w.allocate(0.5).unwrap();
        w.allocate(0.5).unwrap();
        w.despawn(a);
        // Below the floor of round(2 * 0.5) = 1, but the cursor is spent.
        assert_eq!(w.allocate(0.5).unwrap(), a);
        assert!(w.allocate(0.5).is_err());
    }

    #[test]
    fn test_despawn_is_noop_for_dead_ids() {
        let mut w = world(4);
        let e = w.allocate(0.01).unwrap();
        assert!(w.despawn(e));
        assert!(!w.despawn(e));
        assert!(!w.despawn(Entity(3)));
        assert_eq!(w.removed_entities(), vec![e]);
    }

    #[test]
    fn test_manual_recycling_requires_flush() {
        let mut w = manual_world(10);
        let a = w.allocate(0.01).unwrap();
        let b = w.allocate(0.01).unwrap();
        w.despawn(a);
        w.despawn(b);

        assert_eq!(w.pending_removed(), &[a, b]);
        assert_eq!(w.allocate(0.01).unwrap(), Entity(2));

        assert_eq!(w.flush_removed().unwrap(), 2);
        assert!(w.pending_removed().is_empty());
        assert_eq!(w.allocate(0.01).unwrap(), a);
        assert_eq!(w.allocate(0.01).unwrap(), b);
        assert_eq!(w.allocate(0.01).unwrap(), Entity(3));
    }

    #[test]
    fn test_removed_entities_lists_recycled_then_pending() {
        let mut w = manual_world(10);
        let ids: Vec<_> = (0..3).map(|_| w.allocate(0.01).unwrap()).collect();
        w.despawn(ids[0]);
        w.flush_removed().unwrap();
        w.despawn(ids[2]);
        w.despawn(ids[1]);
        assert_eq!(w.removed_entities(), vec![ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn test_flush_on_automatic_world_fails() {
        let mut w = world(10);
        let err = w.flush_removed().unwrap_err();
        assert!(matches!(err, WorldError::ManualRecyclingDisabled { .. }));
        assert!(err.to_string().contains("manual_entity_recycling"));
    }

    #[test]
    fn test_add_and_remove_component() {
        let mut w = world(8);
        let e = w.allocate(0.01).unwrap();

        assert!(w.add_component(VELOCITY, e).unwrap());
        assert!(!w.add_component(VELOCITY, e).unwrap());
        assert!(w.add_component(POSITION, e).unwrap());
        assert!(w.has_component(POSITION, e));
        assert_tags_mirror_bits(&w);

        assert_eq!(w.entity_components(e).unwrap(), vec![VELOCITY, POSITION]);

        assert!(w.remove_component(VELOCITY, e).unwrap());
        assert!(!w.remove_component(VELOCITY, e).unwrap());
        assert!(!w.has_component(VELOCITY, e));
        assert_eq!(w.entity_components(e).unwrap(), vec![POSITION]);
        assert_tags_mirror_bits(&w);
    }

    #[test]
    fn test_entity_components_keep_attach_order() {
        const HEALTH: ComponentTypeId = ComponentTypeId::from_name("Health");
        let mut w = world(8);
        let e = w.allocate(0.01).unwrap();

        w.add_component(VELOCITY, e).unwrap();
        w.add_component(POSITION, e).unwrap();
        w.add_component(HEALTH, e).unwrap();
        assert_eq!(w.entity_components(e).unwrap(), vec![VELOCITY, POSITION, HEALTH]);

        w.remove_component(POSITION, e).unwrap();
        w.add_component(POSITION, e).unwrap();
        assert_eq!(w.entity_components(e).unwrap(), vec![VELOCITY, HEALTH, POSITION]);
    }

    #[test]
    fn test_component_ops_on_dead_entity_fail() {
        let mut w = world(8);
        let err = w.add_component(POSITION, Entity(4)).unwrap_err();
        assert!(matches!(err, WorldError::EntityNotFound { .. }));
        let err = w.remove_component(POSITION, Entity(4)).unwrap_err();
        assert!(matches!(err, WorldError::EntityNotFound { .. }));
        assert!(!w.has_component(POSITION, Entity(4)));
    }

    #[test]
    fn test_entity_components_errors() {
        let w = world(8);
        assert!(matches!(
            w.entity_components(Entity::INVALID),
            Err(WorldError::InvalidEntity)
        ));
        assert!(matches!(
            w.entity_components(Entity(0)),
            Err(WorldError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn test_despawn_clears_all_state() {
        let mut w = world(8);
        let e = w.allocate(0.01).unwrap();
        w.add_component(POSITION, e).unwrap();
        let q = w.register_query(QueryDescriptor::new().all(POSITION));
        assert_eq!(w.query_entities(q).unwrap(), &[e]);

        w.set_local_entity(Entity(42), e).unwrap();
        assert_eq!(w.local_entity(Entity(42)), Some(e));

        assert!(w.despawn(e));
        assert!(!w.contains(e));
        assert!(w.masks().is_entity_clear(e));
        assert!(w.query_entities(q).unwrap().is_empty());
        assert_eq!(w.local_entity(Entity(42)), None);
        assert!(w.entity_components(e).is_err());
        assert_eq!(w.removed_entities().iter().filter(|&&r| r == e).count(), 1);
    }

    #[test]
    fn test_recycled_id_has_no_residual_state() {
        let mut w = world(1);
        let e = w.allocate(0.0).unwrap();
        w.add_component(POSITION, e).unwrap();
        let q = w.register_query(QueryDescriptor::new().all(POSITION));
        w.despawn(e);

        let reused = w.allocate(0.0).unwrap();
        assert_eq!(reused, e);
        assert!(w.entity_components(reused).unwrap().is_empty());
        assert!(w.masks().is_entity_clear(reused));
        assert!(w.query_entities(q).unwrap().is_empty());
    }

    #[test]
    fn test_register_query_populates_from_alive_entities() {
        let mut w = world(8);
        let a = w.allocate(0.01).unwrap();
        let b = w.allocate(0.01).unwrap();
        w.add_component(POSITION, a).unwrap();

        let with_pos = w.register_query(QueryDescriptor::new().all(POSITION));
        let without_pos = w.register_query(QueryDescriptor::new().none(POSITION));

        assert_eq!(w.query_entities(with_pos).unwrap(), &[a]);
        assert_eq!(w.query_entities(without_pos).unwrap(), &[b]);
        // Seeding is not a transition.
        assert!(w.query_mut(with_pos).unwrap().drain_entered().is_empty());
    }

    #[test]
    fn test_register_query_dedupes() {
        let mut w = world(8);
        let q1 = w.register_query(QueryDescriptor::new().all(POSITION).all(VELOCITY));
        let q2 = w.register_query(QueryDescriptor::new().all(VELOCITY).all(POSITION));
        assert_eq!(q1, q2);
        assert_eq!(w.queries().len(), 1);
    }

    #[test]
    fn test_remove_query() {
        let mut w = world(8);
        let q = w.register_query(QueryDescriptor::new().all(POSITION));
        w.remove_query(q).unwrap();
        assert!(matches!(
            w.query_entities(q),
            Err(WorldError::QueryNotFound { .. })
        ));
        assert!(w.remove_query(q).is_err());
    }

    #[test]
    fn test_exclusion_query_matches_on_spawn() {
        let mut w = world(8);
        let q = w.register_query(QueryDescriptor::new().none(POSITION));
        let e = w.allocate(0.01).unwrap();
        assert_eq!(w.query_entities(q).unwrap(), &[e]);
        assert_eq!(w.query_mut(q).unwrap().drain_entered(), vec![e]);

        w.add_component(POSITION, e).unwrap();
        assert!(w.query_entities(q).unwrap().is_empty());
        assert_eq!(w.query_mut(q).unwrap().drain_exited(), vec![e]);
    }

    #[test]
    fn test_many_components_span_words() {
        let mut w = world(4);
        let e = w.allocate(0.01).unwrap();
        for id in 0..130u64 {
            w.add_component(ComponentTypeId(id), e).unwrap();
        }
        assert_eq!(w.masks().word_count(), 3);
        assert_eq!(w.entity_components(e).unwrap().len(), 130);
        assert_tags_mirror_bits(&w);

        let q = w.register_query(QueryDescriptor::new().all(ComponentTypeId(0)).all(ComponentTypeId(129)));
        assert_eq!(w.query_entities(q).unwrap(), &[e]);

        w.remove_component(ComponentTypeId(129), e).unwrap();
        assert!(w.query_entities(q).unwrap().is_empty());
    }

    #[test]
    fn test_resize_keeps_bits() {
        let mut w = world(2);
        let e = w.allocate(0.01).unwrap();
        w.add_component(POSITION, e).unwrap();
        w.resize(10);
        assert_eq!(w.size(), 10);
        assert_eq!(w.masks().capacity(), 10);
        assert!(w.has_component(POSITION, e));

        for _ in 0..9 {
            w.allocate(0.01).unwrap();
        }
        assert!(w.allocate(0.01).is_err());
    }

    #[test]
    fn test_set_local_entity_replaces_previous_mapping() {
        let mut w = world(8);
        let a = w.allocate(0.01).unwrap();
        let b = w.allocate(0.01).unwrap();

        w.set_local_entity(Entity(100), a).unwrap();
        w.set_local_entity(Entity(101), a).unwrap();
        assert_eq!(w.local_entity(Entity(100)), None);
        assert_eq!(w.local_entity(Entity(101)), Some(a));

        w.set_local_entity(Entity(101), b).unwrap();
        assert_eq!(w.local_entity(Entity(101)), Some(b));
        w.despawn(a);
        assert_eq!(w.local_entity(Entity(101)), Some(b));

        assert!(w.set_local_entity(Entity(5), a).is_err());
    }
}
