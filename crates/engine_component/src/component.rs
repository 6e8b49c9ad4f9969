//! Component type identity and presence-bit addressing.
//!
//! This core never sees component data. A component type matters only as a
//! [`ComponentTypeId`], which each world maps to a [`ComponentBit`]: a bit
//! position inside one of the world's 64-bit presence words.
//!
//! ## Type identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm, so the same name always yields the same
//! id regardless of which process or world registers it.

use serde::{Deserialize, Serialize};

/// Number of component bits held by one presence word.
pub const WORD_BITS: usize = u64::BITS as usize;

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

impl std::fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Component({:#018x})", self.0)
    }
}

/// Marker trait for Rust types used as components.
///
/// Only the name matters here; field storage belongs to the component store
/// that sits next to this core.
///
/// ```rust
/// use engine_component::{Component, ComponentTypeId};
///
/// struct Health;
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
///
/// assert_eq!(Health::component_type_id(), ComponentTypeId::from_name("Health"));
/// ```
pub trait Component: Send + Sync + 'static {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// The location of one component type inside a world's presence bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentBit {
    /// Index of the presence word.
    pub word: usize,
    /// Single-bit mask within that word.
    pub mask: u64,
}

impl ComponentBit {
    /// Bit address of the `position`-th registered component type.
    #[must_use]
    pub const fn from_position(position: usize) -> Self {
        Self {
            word: position / WORD_BITS,
            mask: 1u64 << (position % WORD_BITS),
        }
    }

    /// Inverse of [`ComponentBit::from_position`].
    #[must_use]
    pub const fn position(self) -> usize {
        self.word * WORD_BITS + self.mask.trailing_zeros() as usize
    }
}
