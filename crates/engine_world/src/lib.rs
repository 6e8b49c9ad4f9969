//! # engine_world
//!
//! Entity management and query matching for the bitmask ECS core.
//!
//! A [`Universe`] owns every [`World`]. Each world hands out `u32` entity ids
//! from a cursor and recycling pools, records which component types every
//! entity has in a per-word presence bitmask, and keeps a live result set for
//! every registered query so that iterating a query never scans the whole
//! world.
//!
//! ## Usage
//!
//! ```rust
//! use engine_component::{ComponentTypeId, QueryDescriptor};
//! use engine_world::{Universe, WorldConfig};
//!
//! let position = ComponentTypeId::from_name("Position");
//! let velocity = ComponentTypeId::from_name("Velocity");
//!
//! let mut universe = Universe::new();
//! let world = universe.create_world(WorldConfig::new().with_size(1024))?;
//! let moving = universe.register_query(world, QueryDescriptor::new().all(position).all(velocity))?;
//!
//! let e = universe.add_entity(world)?;
//! universe.add_component(world, position, e)?;
//! universe.add_component(world, velocity, e)?;
//! assert_eq!(universe.query_entities(world, moving)?, &[e]);
//!
//! universe.remove_entity(world, e)?;
//! assert!(universe.query_entities(world, moving)?.is_empty());
//! # Ok::<(), engine_world::WorldError>(())
//! ```

pub mod bitmask;
pub mod config;
pub mod error;
pub mod query;
pub mod universe;
pub mod world;

pub use bitmask::{ComponentRegistry, EntityMaskTable};
pub use config::{DEFAULT_REMOVED_REUSE_THRESHOLD, DEFAULT_SIZE, SizingPolicy, WorldConfig};
pub use error::{Result, WorldError};
pub use query::{CompiledQuery, QueryId, QueryIndex};
pub use universe::{IdentifierSnapshot, ResizeListener, Universe};
pub use world::{World, WorldId};
