//! Sparse-set of entity identifiers.
//!
//! Used both as a world's alive-entity index and as the match set of every
//! compiled query.
//!
//! - `sparse[entity]` → position in `dense` (or [`ABSENT`] if not a member)
//! - `dense`          → packed member list, iterated directly

use crate::entity::Entity;

/// Sentinel stored in the sparse array for non-members.
const ABSENT: u32 = u32::MAX;

/// A set of [`Entity`] ids with O(1) insert, remove and membership test, and
/// dense iteration in a stable order between mutations.
#[derive(Debug, Clone, Default)]
pub struct SparseSet {
    sparse: Vec<u32>,
    dense: Vec<Entity>,
}

impl SparseSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
        }
    }

    /// Returns `true` if `entity` is a member.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.sparse
            .get(entity.index())
            .is_some_and(|&pos| pos != ABSENT)
    }

    /// Adds `entity`. Returns `false` if it was already a member.
    pub fn insert(&mut self, entity: Entity) -> bool {
        let idx = entity.index();
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, ABSENT);
        }
        if self.sparse[idx] != ABSENT {
            return false;
        }
        self.sparse[idx] = self.dense.len() as u32;
        self.dense.push(entity);
        true
    }

    /// Removes `entity` with a swap-remove. Returns `false` if it was not a
    /// member.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(&pos) = self.sparse.get(entity.index()) else {
            return false;
        };
        if pos == ABSENT {
            return false;
        }

        self.dense.swap_remove(pos as usize);
        // The former last element now sits at `pos`.
        if let Some(&moved) = self.dense.get(pos as usize) {
            self.sparse[moved.index()] = pos;
        }
        self.sparse[entity.index()] = ABSENT;
        true
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Members in dense order.
    #[must_use]
    pub fn as_slice(&self) -> &[Entity] {
        &self.dense
    }

    /// Iterates members in dense order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.dense.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut set = SparseSet::new();
        assert!(set.insert(Entity(5)));
        assert!(set.contains(Entity(5)));
        assert!(!set.contains(Entity(4)));
        assert!(!set.contains(Entity(1000)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut set = SparseSet::new();
        assert!(set.insert(Entity(1)));
        assert!(!set.insert(Entity(1)));
        assert_eq!(set.as_slice(), &[Entity(1)]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut set = SparseSet::new();
        set.insert(Entity(3));
        assert!(set.remove(Entity(3)));
        assert!(!set.remove(Entity(3)));
        assert!(!set.remove(Entity(99)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut set = SparseSet::new();
        for id in 0..5 {
            set.insert(Entity(id));
        }

        // Removing from the middle moves the last member into the hole.
        assert!(set.remove(Entity(1)));
        assert_eq!(set.as_slice(), &[Entity(0), Entity(4), Entity(2), Entity(3)]);

        for id in [0, 2, 3, 4] {
            assert!(set.contains(Entity(id)));
        }
        assert!(!set.contains(Entity(1)));

        // The moved member can still be removed correctly.
        assert!(set.remove(Entity(4)));
        assert_eq!(set.as_slice(), &[Entity(0), Entity(3), Entity(2)]);
    }

    #[test]
    fn test_remove_last_member() {
        let mut set = SparseSet::new();
        set.insert(Entity(0));
        set.insert(Entity(1));
        assert!(set.remove(Entity(1)));
        assert_eq!(set.as_slice(), &[Entity(0)]);
        assert!(set.contains(Entity(0)));
    }

    #[test]
    fn test_iter_matches_slice() {
        let mut set = SparseSet::new();
        set.insert(Entity(9));
        set.insert(Entity(2));
        let collected: Vec<Entity> = set.iter().collect();
        assert_eq!(collected, set.as_slice());
    }
}
