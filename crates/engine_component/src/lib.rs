//! # engine_component
//!
//! Leaf primitives shared by every world: what an entity id is, how a
//! component type is identified and addressed in a presence bitmask, and how
//! a query predicate is described.
//!
//! This crate provides:
//!
//! - [`Entity`] — lightweight `u32` entity identifiers.
//! - [`Component`] / [`ComponentTypeId`] — FNV-1a derived component identity.
//! - [`ComponentBit`] — word/bit address of a component in a presence mask.
//! - [`SparseSet`] — O(1) id membership with dense iteration.
//! - [`QueryDescriptor`] — all/any/none component-presence predicates.

pub mod component;
pub mod entity;
pub mod query;
pub mod sparse_set;

pub use component::{Component, ComponentBit, ComponentTypeId, WORD_BITS};
pub use entity::Entity;
pub use query::QueryDescriptor;
pub use sparse_set::SparseSet;
