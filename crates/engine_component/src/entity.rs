//! Entity identifier type.
//!
//! An [`Entity`] is a lightweight `u32` identifier with no inherent data. It
//! doubles as the row index into every per-entity column of its world
//! (presence bitmasks, tag sets, external component stores).

use serde::{Deserialize, Serialize};

/// A world-scoped entity identifier.
///
/// Entities are pure identifiers. Identifiers are only unique within the
/// world that issued them: two worlds both hand out `Entity(0)` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u32);

impl Entity {
    /// The null / invalid entity sentinel. Never produced by allocation.
    pub const INVALID: Entity = Entity(u32::MAX);

    /// Create an entity from a raw `u32` identifier.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw `u32` identifier.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the identifier as a column index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` unless this is [`Entity::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}
