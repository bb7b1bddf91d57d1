use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Stable handle into an [`Arena`]. The generation prevents a recycled slot
/// from being reached through a handle issued before the slot was freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub const NULL: EntityId = EntityId {
        index: u32::MAX,
        generation: 0,
    };

    pub fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    pub fn from_index(index: u32) -> Self {
        Self {
            index,
            generation: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_null(&self) -> bool {
        self.index == u32::MAX
    }

    /// Orders two ids so that a pair key is independent of argument order.
    pub fn ordered_pair(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Generational arena with index-based free list.
///
/// Removal never moves other entries, so ids stay valid until their own
/// entry is removed. Freed slots are reused in FIFO order to push stale ids
/// as far away from reuse as possible.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> EntityId {
        self.insert_with(|_| item)
    }

    /// Inserts the value produced by `make`, which receives the id the entry
    /// will be stored under. Useful for values that record their own id.
    pub fn insert_with(&mut self, make: impl FnOnce(EntityId) -> T) -> EntityId {
        self.live += 1;
        if let Some(index) = self.free_list.pop_front() {
            let id = EntityId::new(index, self.generations[index]);
            self.items[index] = Some(make(id));
            return id;
        }

        let index = self.items.len();
        let id = EntityId::new(index, 0);
        self.items.push(Some(make(id)));
        self.generations.push(0);
        id
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        if self.is_current(id) {
            self.items.get(id.index()).and_then(Option::as_ref)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        if self.is_current(id) {
            self.items.get_mut(id.index()).and_then(Option::as_mut)
        } else {
            None
        }
    }

    /// Mutable access to two distinct entries at once.
    pub fn get2_mut(&mut self, id_a: EntityId, id_b: EntityId) -> Option<(&mut T, &mut T)> {
        if id_a.index() == id_b.index() || !self.is_current(id_a) || !self.is_current(id_b) {
            return None;
        }

        let (low, high, flipped) = if id_a.index() < id_b.index() {
            (id_a.index(), id_b.index(), false)
        } else {
            (id_b.index(), id_a.index(), true)
        };

        let (left, right) = self.items.split_at_mut(high);
        let first = left.get_mut(low).and_then(Option::as_mut)?;
        let second = right.get_mut(0).and_then(Option::as_mut)?;

        if flipped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    /// Removes an entry. Stale or unknown ids are ignored and return `None`.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        if !self.is_current(id) {
            return None;
        }
        let slot = self.items.get_mut(id.index())?;
        let value = slot.take()?;
        self.generations[id.index()] = self.generations[id.index()].wrapping_add(1);
        self.free_list.push_back(id.index());
        self.live -= 1;
        Some(value)
    }

    pub fn clear(&mut self) {
        let ids: Vec<EntityId> = self.ids().collect();
        for id in ids {
            self.remove(id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.as_ref()
                    .map(|item| (EntityId::new(index, self.generations[index]), item))
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        let generations = &self.generations;
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.as_mut()
                    .map(|item| (EntityId::new(index, generations[index]), item))
            })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter().filter_map(Option::as_ref)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.items.iter_mut().filter_map(Option::as_mut)
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn is_current(&self, id: EntityId) -> bool {
        self.generations
            .get(id.index())
            .is_some_and(|&generation| generation == id.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_ids_are_rejected_after_reuse() {
        let mut arena = Arena::new();
        let first = arena.insert("a");
        assert_eq!(arena.remove(first), Some("a"));
        let second = arena.insert("b");

        assert_eq!(first.index(), second.index());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&"b"));
        assert_eq!(arena.remove(first), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn get2_mut_returns_entries_in_argument_order() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);

        let (eb, ea) = arena.get2_mut(b, a).expect("distinct ids");
        assert_eq!((*ea, *eb), (1, 2));
        *ea = 10;
        assert_eq!(arena.get(a), Some(&10));
        assert!(arena.get2_mut(a, a).is_none());
    }

    #[test]
    fn insert_with_sees_final_id() {
        let mut arena = Arena::new();
        let id = arena.insert_with(|id| id);
        assert_eq!(arena.get(id), Some(&id));
    }
}
