//! Query descriptors: component-presence predicates.
//!
//! A [`QueryDescriptor`] states which component types an entity must have
//! (`all`), may have at least one of (`any`), and must not have (`none`).
//! Worlds compile descriptors into per-word bitmasks and keep a live result
//! set for each one.

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

/// A component-presence predicate.
///
/// Term lists are kept sorted and deduplicated, so two descriptors built
/// from the same terms in a different order compare (and hash) equal. This
/// holds for deserialized descriptors too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "DescriptorTerms")]
pub struct QueryDescriptor {
    all: Vec<ComponentTypeId>,
    any: Vec<ComponentTypeId>,
    none: Vec<ComponentTypeId>,
}

/// Wire form of a descriptor, normalized on the way in.
#[derive(Default, Deserialize)]
#[serde(default)]
struct DescriptorTerms {
    all: Vec<ComponentTypeId>,
    any: Vec<ComponentTypeId>,
    none: Vec<ComponentTypeId>,
}

impl From<DescriptorTerms> for QueryDescriptor {
    fn from(terms: DescriptorTerms) -> Self {
        Self {
            all: normalized(terms.all),
            any: normalized(terms.any),
            none: normalized(terms.none),
        }
    }
}

impl QueryDescriptor {
    /// Create a new empty descriptor. An empty descriptor matches every
    /// alive entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a component type.
    #[must_use]
    pub fn all(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.all, type_id);
        self
    }

    /// Accept entities that have at least one of the `any` types.
    #[must_use]
    pub fn any(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.any, type_id);
        self
    }

    /// Exclude entities that have a component type.
    #[must_use]
    pub fn none(mut self, type_id: ComponentTypeId) -> Self {
        insert_sorted(&mut self.none, type_id);
        self
    }

    /// Typed form of [`QueryDescriptor::all`].
    #[must_use]
    pub fn with<T: Component>(self) -> Self {
        self.all(T::component_type_id())
    }

    /// Typed form of [`QueryDescriptor::none`].
    #[must_use]
    pub fn without<T: Component>(self) -> Self {
        self.none(T::component_type_id())
    }

    /// Types that must all be present, ascending.
    #[must_use]
    pub fn required(&self) -> &[ComponentTypeId] {
        &self.all
    }

    /// Types of which at least one must be present, ascending. Empty means
    /// no `any` constraint.
    #[must_use]
    pub fn any_of(&self) -> &[ComponentTypeId] {
        &self.any
    }

    /// Types that must be absent, ascending.
    #[must_use]
    pub fn excluded(&self) -> &[ComponentTypeId] {
        &self.none
    }

    /// Returns `true` if the descriptor has no `all` or `any` terms, meaning
    /// an entity with zero components can already satisfy it.
    #[must_use]
    pub fn is_exclusion_only(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Every component type the descriptor mentions, in `all`, `any`, `none`
    /// order.
    pub fn component_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.all
            .iter()
            .chain(self.any.iter())
            .chain(self.none.iter())
            .copied()
    }
}

fn normalized(mut terms: Vec<ComponentTypeId>) -> Vec<ComponentTypeId> {
    terms.sort_unstable();
    terms.dedup();
    terms
}

fn insert_sorted(terms: &mut Vec<ComponentTypeId>, type_id: ComponentTypeId) {
    if let Err(pos) = terms.binary_search(&type_id) {
        terms.insert(pos, type_id);
    }
}
