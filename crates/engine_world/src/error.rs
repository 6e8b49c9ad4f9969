//! World-layer error types.

use engine_component::Entity;

use crate::query::QueryId;
use crate::world::WorldId;

/// Errors that can occur while operating on worlds and entities.
///
/// Every variant is detected before any state is mutated, so a failed call
/// leaves the world exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No id can be handed out without the cursor passing the world size.
    #[error("max entities reached in world {world}: identifier space of {size} is exhausted")]
    CapacityExhausted {
        /// The world that ran out of identifiers.
        world: WorldId,
        /// The world's identifier-space size.
        size: usize,
    },

    /// A manual-recycling operation was called on an automatic world.
    #[error(
        "cannot flush removed entities of world {world}: enable the `manual_entity_recycling` flag in its WorldConfig"
    )]
    ManualRecyclingDisabled {
        /// The automatic-recycling world.
        world: WorldId,
    },

    /// The entity is not alive in the world.
    #[error("{entity} does not exist in world {world}")]
    EntityNotFound {
        /// The world that was searched.
        world: WorldId,
        /// The missing entity.
        entity: Entity,
    },

    /// The [`Entity::INVALID`] sentinel was passed where a real id is needed.
    #[error("entity is undefined")]
    InvalidEntity,

    /// No world with this id is registered.
    #[error("world {0} not found")]
    WorldNotFound(WorldId),

    /// The query is not registered in the world.
    #[error("query {query} not found in world {world}")]
    QueryNotFound {
        /// The world that was searched.
        world: WorldId,
        /// The missing query.
        query: QueryId,
    },

    /// A recycle threshold outside `0.0..=1.0`.
    #[error("removed recycle threshold must be a fraction in 0..=1, got {0}")]
    InvalidThreshold(f64),

    /// A world size that cannot be addressed by `u32` entity ids.
    #[error("world size {0} exceeds the addressable identifier space")]
    InvalidSize(usize),

    /// A global resize would cut off identifiers a world already issued.
    #[error("cannot resize world {world} to {size}: {cursor} identifiers already issued")]
    ShrinkBelowCursor {
        /// The world whose cursor is past the requested size.
        world: WorldId,
        /// The world's entity cursor.
        cursor: u32,
        /// The requested size.
        size: usize,
    },

    /// Failed to parse a configuration document.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WorldError>;
