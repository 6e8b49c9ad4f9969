//! Component-presence bitmask table.
//!
//! Each world keeps one flat `Vec<u64>` per presence word, indexed by entity
//! id. Bit `n % 64` of word `n / 64` at index `e` is set iff entity `e` has
//! the `n`-th component type registered in the world. This table is the
//! source of truth every compiled query is evaluated against.

use std::collections::HashMap;

use engine_component::{ComponentBit, ComponentTypeId, Entity};

/// Presence bits for every entity slot of a world, stored `[word][entity]`.
#[derive(Debug, Clone, Default)]
pub struct EntityMaskTable {
    words: Vec<Vec<u64>>,
    capacity: usize,
}

impl EntityMaskTable {
    /// Create a table with room for `capacity` entities and no words yet.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: Vec::new(),
            capacity,
        }
    }

    /// Number of entity slots per word.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of presence words.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Adds zeroed words until there are at least `count`.
    pub fn ensure_words(&mut self, count: usize) {
        while self.words.len() < count {
            self.words.push(vec![0; self.capacity]);
        }
    }

    /// Grows every word to `capacity` slots. New slots are zero; existing
    /// bits are untouched. Never shrinks.
    pub fn resize(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        for word in &mut self.words {
            word.resize(capacity, 0);
        }
        self.capacity = capacity;
    }

    /// Sets `bit` for `entity`. The bit's word must exist and the entity must
    /// be within capacity.
    pub fn set(&mut self, bit: ComponentBit, entity: Entity) {
        self.words[bit.word][entity.index()] |= bit.mask;
    }

    /// Clears `bit` for `entity`. Missing words or slots are already clear.
    pub fn clear(&mut self, bit: ComponentBit, entity: Entity) {
        if let Some(slot) = self
            .words
            .get_mut(bit.word)
            .and_then(|word| word.get_mut(entity.index()))
        {
            *slot &= !bit.mask;
        }
    }

    /// Returns `true` if `bit` is set for `entity`.
    #[must_use]
    pub fn contains(&self, bit: ComponentBit, entity: Entity) -> bool {
        self.word(bit.word, entity) & bit.mask != 0
    }

    /// The presence word `word` of `entity`; zero when out of range.
    #[must_use]
    pub fn word(&self, word: usize, entity: Entity) -> u64 {
        self.words
            .get(word)
            .and_then(|w| w.get(entity.index()))
            .copied()
            .unwrap_or(0)
    }

    /// Zeroes every word of `entity`.
    pub fn clear_entity(&mut self, entity: Entity) {
        for word in &mut self.words {
            if let Some(slot) = word.get_mut(entity.index()) {
                *slot = 0;
            }
        }
    }

    /// Returns `true` if no bit is set for `entity`.
    #[must_use]
    pub fn is_entity_clear(&self, entity: Entity) -> bool {
        (0..self.words.len()).all(|w| self.word(w, entity) == 0)
    }
}

/// Assigns presence bits to component types in registration order.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    bits: HashMap<ComponentTypeId, ComponentBit>,
    order: Vec<ComponentTypeId>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bit of `type_id`, assigning the next free one if the type
    /// is new. The flag is `true` when a bit was assigned by this call.
    pub fn register(&mut self, type_id: ComponentTypeId) -> (ComponentBit, bool) {
        if let Some(&bit) = self.bits.get(&type_id) {
            return (bit, false);
        }
        let bit = ComponentBit::from_position(self.order.len());
        self.bits.insert(type_id, bit);
        self.order.push(type_id);
        (bit, true)
    }

    /// The bit of an already registered type.
    #[must_use]
    pub fn bit(&self, type_id: ComponentTypeId) -> Option<ComponentBit> {
        self.bits.get(&type_id).copied()
    }

    /// Number of presence words needed to hold every registered type.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.order.len().div_ceil(engine_component::WORD_BITS)
    }

    /// Registered types in bit order.
    #[must_use]
    pub fn types(&self) -> &[ComponentTypeId] {
        &self.order
    }
}
