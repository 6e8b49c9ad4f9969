//! The universe — process-wide entity registry.
//!
//! A [`Universe`] owns every [`World`] together with the state that spans
//! worlds: the sizing policy, the current global size, the identifier→world
//! map, the resize listeners of the component stores and the
//! serialization-resized flag. Pass it by reference wherever worlds are
//! touched; [`Universe::reset_globals`] restores the sizing state between
//! tests.

use std::collections::HashMap;

use dashmap::DashMap;
use engine_component::{ComponentTypeId, Entity, QueryDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{SizingPolicy, WorldConfig, validate_size, validate_threshold};
use crate::error::{Result, WorldError};
use crate::query::QueryId;
use crate::world::{World, WorldId};

/// Receives global identifier-space resizes.
///
/// Component stores implement this to grow their columns. Listeners run after
/// every world's bitmask table has grown and before any later allocation can
/// hand out an id in the enlarged space.
pub trait ResizeListener: std::fmt::Debug + Send {
    /// Called with the new identifier-space size.
    fn on_resize(&mut self, new_size: usize);
}

/// Identifier-space state of one world, enough for a serializer to continue
/// issuing ids deterministically after a reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierSnapshot {
    /// The world the snapshot was taken from.
    pub world: WorldId,
    /// Identifier-space size.
    pub size: usize,
    /// Next never-issued id.
    pub entity_cursor: u32,
    /// Whether freed ids wait for a manual flush.
    pub manual_entity_recycling: bool,
    /// Alive ids in ascending order.
    pub alive: Vec<Entity>,
    /// Reusable ids, oldest first.
    pub recycled: Vec<Entity>,
    /// Freed ids waiting for a flush.
    pub removed: Vec<Entity>,
}

/// Owner of all worlds and of the process-wide entity state.
#[derive(Debug)]
pub struct Universe {
    /// Values restored by [`Universe::reset_globals`].
    defaults: SizingPolicy,
    global_size: usize,
    removed_reuse_threshold: f64,
    worlds: HashMap<WorldId, World>,
    /// Most recent owner of each alive identifier.
    entity_worlds: DashMap<Entity, WorldId>,
    resize_listeners: Vec<Box<dyn ResizeListener>>,
    serialization_resized: bool,
}

impl Universe {
    /// Create a universe with the default sizing policy.
    #[must_use]
    pub fn new() -> Self {
        let defaults = SizingPolicy::default();
        Self {
            defaults,
            global_size: defaults.default_size,
            removed_reuse_threshold: defaults.removed_reuse_threshold,
            worlds: HashMap::new(),
            entity_worlds: DashMap::new(),
            resize_listeners: Vec::new(),
            serialization_resized: false,
        }
    }

    /// Create a universe from an explicit policy.
    pub fn with_policy(policy: SizingPolicy) -> Result<Self> {
        policy.validate()?;
        let mut universe = Self::new();
        universe.defaults = policy;
        universe.reset_globals();
        Ok(universe)
    }

    // -- Global sizing --

    /// Size given to new worlds without an explicit size.
    #[must_use]
    pub fn global_size(&self) -> usize {
        self.global_size
    }

    /// The size restored by [`Universe::reset_globals`].
    #[must_use]
    pub fn default_size(&self) -> usize {
        self.defaults.default_size
    }

    /// The current recycle threshold.
    #[must_use]
    pub fn removed_reuse_threshold(&self) -> f64 {
        self.removed_reuse_threshold
    }

    /// Restores the global size and recycle threshold to their defaults.
    pub fn reset_globals(&mut self) {
        self.global_size = self.defaults.default_size;
        self.removed_reuse_threshold = self.defaults.removed_reuse_threshold;
    }

    /// Sets the default maximum number of entities for worlds and component
    /// stores, and resizes everything to it.
    ///
    /// This also resets the recycle threshold to its default. Fails without
    /// touching anything if a world has already issued more than `size` ids.
    pub fn set_default_size(&mut self, size: usize) -> Result<()> {
        validate_size(size)?;
        if let Some(world) = self
            .worlds
            .values()
            .find(|w| w.entity_cursor() as usize > size)
        {
            return Err(WorldError::ShrinkBelowCursor {
                world: world.id(),
                cursor: world.entity_cursor(),
                size,
            });
        }

        let old_size = self.global_size;
        self.defaults.default_size = size;
        self.reset_globals();
        self.global_size = size;

        for world in self.worlds.values_mut() {
            world.resize(size);
        }
        for listener in &mut self.resize_listeners {
            listener.on_resize(size);
        }
        self.serialization_resized = true;

        info!(old_size, new_size = size, worlds = self.worlds.len(), "resized worlds");
        Ok(())
    }

    /// Sets the fraction (0..=1) of a world's size that must be queued as
    /// removed before automatic recycling reuses ids.
    pub fn set_removed_recycle_threshold(&mut self, threshold: f64) -> Result<()> {
        validate_threshold(threshold)?;
        self.removed_reuse_threshold = threshold;
        Ok(())
    }

    /// Registers a component store to be told about global resizes.
    pub fn add_resize_listener(&mut self, listener: Box<dyn ResizeListener>) {
        self.resize_listeners.push(listener);
    }

    /// Returns `true` if the identifier space changed since the serializer
    /// last cleared the flag.
    #[must_use]
    pub fn serialization_resized(&self) -> bool {
        self.serialization_resized
    }

    /// Sets or clears the serialization-resized flag.
    pub fn set_serialization_resized(&mut self, resized: bool) {
        self.serialization_resized = resized;
    }

    // -- Worlds --

    /// Creates a world and returns its id.
    pub fn create_world(&mut self, config: WorldConfig) -> Result<WorldId> {
        let size = config.size.unwrap_or(self.global_size);
        validate_size(size)?;

        let world = World::new(&config, size);
        let id = world.id();
        self.worlds.insert(id, world);

        info!(
            world = %id,
            size,
            manual_entity_recycling = config.manual_entity_recycling,
            "world created"
        );
        Ok(id)
    }

    /// Deletes a world and forgets the identifiers it owned.
    pub fn delete_world(&mut self, id: WorldId) -> Result<()> {
        let world = self.worlds.remove(&id).ok_or(WorldError::WorldNotFound(id))?;
        for &entity in world.entities() {
            self.entity_worlds.remove_if(&entity, |_, owner| *owner == id);
        }
        info!(world = %id, entities = world.entity_count(), "world deleted");
        Ok(())
    }

    /// Returns a world by id.
    pub fn world(&self, id: WorldId) -> Result<&World> {
        self.worlds.get(&id).ok_or(WorldError::WorldNotFound(id))
    }

    fn world_mut(&mut self, id: WorldId) -> Result<&mut World> {
        self.worlds.get_mut(&id).ok_or(WorldError::WorldNotFound(id))
    }

    /// Number of worlds.
    #[must_use]
    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// The world that most recently issued `entity`, if it is still alive
    /// there.
    #[must_use]
    pub fn entity_world(&self, entity: Entity) -> Option<WorldId> {
        self.entity_worlds.get(&entity).map(|owner| *owner)
    }

    // -- Entities --

    /// Adds a new entity to `world`.
    pub fn add_entity(&mut self, world: WorldId) -> Result<Entity> {
        let threshold = self.removed_reuse_threshold;
        let entity = self.world_mut(world)?.allocate(threshold)?;
        self.entity_worlds.insert(entity, world);
        Ok(entity)
    }

    /// Removes `entity` from `world`. Removing a dead id does nothing.
    pub fn remove_entity(&mut self, world: WorldId, entity: Entity) -> Result<()> {
        let w = self.worlds.get_mut(&world).ok_or(WorldError::WorldNotFound(world))?;
        if !w.contains(entity) {
            return Ok(());
        }
        self.entity_worlds.remove_if(&entity, |_, owner| *owner == world);
        w.despawn(entity);
        Ok(())
    }

    /// Returns `true` if `entity` is alive in `world`.
    #[must_use]
    pub fn entity_exists(&self, world: WorldId, entity: Entity) -> bool {
        self.worlds.get(&world).is_some_and(|w| w.contains(entity))
    }

    /// The component types attached to `entity`, in attach order.
    pub fn get_entity_components(&self, world: WorldId, entity: Entity) -> Result<Vec<ComponentTypeId>> {
        self.world(world)?.entity_components(entity)
    }

    /// The next never-issued identifier of `world`.
    pub fn get_entity_cursor(&self, world: WorldId) -> Result<u32> {
        Ok(self.world(world)?.entity_cursor())
    }

    /// Freed ids of `world`: the recycled pool, then ids awaiting a flush.
    pub fn get_removed_entities(&self, world: WorldId) -> Result<Vec<Entity>> {
        Ok(self.world(world)?.removed_entities())
    }

    /// Makes the removed ids of a manual-recycling world reusable.
    pub fn flush_removed_entities(&mut self, world: WorldId) -> Result<()> {
        self.world_mut(world)?.flush_removed().map(|_| ())
    }

    /// Records that serializer-local id `local` refers to `entity`.
    pub fn set_local_entity(&mut self, world: WorldId, local: Entity, entity: Entity) -> Result<()> {
        self.world_mut(world)?.set_local_entity(local, entity)
    }

    /// The entity a serializer-local id refers to.
    pub fn local_entity(&self, world: WorldId, local: Entity) -> Result<Option<Entity>> {
        Ok(self.world(world)?.local_entity(local))
    }

    /// Captures the identifier-space state of `world`.
    pub fn identifier_snapshot(&self, world: WorldId) -> Result<IdentifierSnapshot> {
        let w = self.world(world)?;
        let mut alive = w.entities().to_vec();
        alive.sort_unstable();
        Ok(IdentifierSnapshot {
            world,
            size: w.size(),
            entity_cursor: w.entity_cursor(),
            manual_entity_recycling: w.manual_entity_recycling(),
            alive,
            recycled: w.recycled().collect(),
            removed: w.pending_removed().to_vec(),
        })
    }

    // -- Components --

    /// Attaches `type_id` to `entity`. Attaching twice does nothing.
    pub fn add_component(&mut self, world: WorldId, type_id: ComponentTypeId, entity: Entity) -> Result<()> {
        self.world_mut(world)?.add_component(type_id, entity).map(|_| ())
    }

    /// Detaches `type_id` from `entity`. Detaching an absent type does
    /// nothing.
    pub fn remove_component(&mut self, world: WorldId, type_id: ComponentTypeId, entity: Entity) -> Result<()> {
        self.world_mut(world)?
            .remove_component(type_id, entity)
            .map(|_| ())
    }

    /// Returns `true` if `entity` is alive in `world` with `type_id` attached.
    #[must_use]
    pub fn has_component(&self, world: WorldId, type_id: ComponentTypeId, entity: Entity) -> bool {
        self.worlds
            .get(&world)
            .is_some_and(|w| w.has_component(type_id, entity))
    }

    // -- Queries --

    /// Registers a query in `world`. Equal descriptors share one id.
    ///
    /// Callers holding the same id also share its enter and exit queues:
    /// draining them through [`Universe::entered_query`] or
    /// [`Universe::exited_query`] empties them for every holder.
    pub fn register_query(&mut self, world: WorldId, descriptor: QueryDescriptor) -> Result<QueryId> {
        Ok(self.world_mut(world)?.register_query(descriptor))
    }

    /// Unregisters a query.
    pub fn remove_query(&mut self, world: WorldId, query: QueryId) -> Result<()> {
        self.world_mut(world)?.remove_query(query)
    }

    /// Entities currently matching `query`.
    pub fn query_entities(&self, world: WorldId, query: QueryId) -> Result<&[Entity]> {
        self.world(world)?.query_entities(query)
    }

    /// Entities that started matching `query` since the last call.
    pub fn entered_query(&mut self, world: WorldId, query: QueryId) -> Result<Vec<Entity>> {
        let world = self.world_mut(world)?;
        let entered = world.query_mut(query)?.drain_entered();
        debug!(world = %world.id(), query = %query, entered = entered.len(), "drained entered");
        Ok(entered)
    }

    /// Entities that stopped matching `query` since the last call.
    pub fn exited_query(&mut self, world: WorldId, query: QueryId) -> Result<Vec<Entity>> {
        let world = self.world_mut(world)?;
        let exited = world.query_mut(query)?.drain_exited();
        debug!(world = %world.id(), query = %query, exited = exited.len(), "drained exited");
        Ok(exited)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}
