#![warn(missing_docs)]

//! Generation-tagged slot arena.
//!
//! Values live in a flat vector of slots. Every slot carries a generation
//! counter that is bumped each time its value is removed, so an [`Index`]
//! handed out before a removal can never address the value that later
//! reuses the same slot.
//!
//! # Example
//!
//! ```
//! use impulse_arena::Arena;
//!
//! let mut arena = Arena::new();
//! let a = arena.insert("a");
//! arena.remove(a);
//! let b = arena.insert("b");
//!
//! assert!(arena.get(a).is_none());
//! assert_eq!(arena.get(b), Some(&"b"));
//! ```

use serde::{Deserialize, Serialize};

/// Handle addressing one slot of an [`Arena`] at one generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Index {
    index: u32,
    generation: u32,
}

impl Index {
    /// Builds an index from its slot and generation parts.
    pub fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Splits the index into its slot and generation parts.
    pub fn into_raw_parts(self) -> (u32, u32) {
        (self.index, self.generation)
    }

    /// An index that no arena ever hands out.
    pub fn invalid() -> Self {
        Self::from_raw_parts(u32::MAX, u32::MAX)
    }
}

#[derive(Clone, Debug)]
enum Entry<T> {
    Free { next_free: Option<u32> },
    Occupied(T),
    /// Generation counter exhausted; the slot is never handed out again.
    Retired,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    entry: Entry<T>,
}

/// Slot arena with generation-checked access.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value, reusing the most recently freed slot if any.
    ///
    /// # Panics
    ///
    /// Panics when the 32-bit index space is exhausted. There is no
    /// meaningful way to continue a simulation past that point.
    pub fn insert(&mut self, value: T) -> Index {
        if let Some(free) = self.free_head {
            let slot = &mut self.slots[free as usize];
            let next_free = match slot.entry {
                Entry::Free { next_free } => next_free,
                _ => unreachable!("free list points at a non-free slot"),
            };
            slot.entry = Entry::Occupied(value);
            self.free_head = next_free;
            self.len += 1;
            return Index::from_raw_parts(free, slot.generation);
        }

        // u32::MAX is reserved for `Index::invalid`.
        if self.slots.len() >= u32::MAX as usize {
            panic!("arena index space exhausted ({} slots)", self.slots.len());
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Entry::Occupied(value),
        });
        self.len += 1;
        Index::from_raw_parts(index, 0)
    }

    /// Removes the value at `index`, invalidating every copy of `index`.
    pub fn remove(&mut self, index: Index) -> Option<T> {
        let slot = self.slots.get_mut(index.index as usize)?;
        if slot.generation != index.generation || !matches!(slot.entry, Entry::Occupied(_)) {
            return None;
        }

        let retired = slot.generation == u32::MAX;
        let replacement = if retired {
            Entry::Retired
        } else {
            slot.generation += 1;
            Entry::Free {
                next_free: self.free_head,
            }
        };

        let old = std::mem::replace(&mut slot.entry, replacement);
        if !retired {
            self.free_head = Some(index.index);
        }
        self.len -= 1;

        match old {
            Entry::Occupied(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true if `index` addresses a live value.
    pub fn contains(&self, index: Index) -> bool {
        self.get(index).is_some()
    }

    /// Shared access to the value at `index`.
    pub fn get(&self, index: Index) -> Option<&T> {
        match self.slots.get(index.index as usize) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(value),
            }) if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Exclusive access to the value at `index`.
    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        match self.slots.get_mut(index.index as usize) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(value),
            }) if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Exclusive access to two values at once.
    ///
    /// If both indices address the same slot only the first is returned.
    pub fn get2_mut(&mut self, a: Index, b: Index) -> (Option<&mut T>, Option<&mut T>) {
        if a.index == b.index {
            return (self.get_mut(a), None);
        }

        let (ia, ib) = (a.index as usize, b.index as usize);
        if ia >= self.slots.len() {
            return (None, self.get_mut(b));
        }
        if ib >= self.slots.len() {
            return (self.get_mut(a), None);
        }

        let (first, second) = if ia < ib {
            let (left, right) = self.slots.split_at_mut(ib);
            (left.get_mut(ia), right.first_mut())
        } else {
            let (left, right) = self.slots.split_at_mut(ia);
            (right.first_mut(), left.get_mut(ib))
        };

        (occupied_mut(first, a), occupied_mut(second, b))
    }

    /// Iterates live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match &slot.entry {
                Entry::Occupied(value) => {
                    Some((Index::from_raw_parts(i as u32, slot.generation), value))
                }
                _ => None,
            })
    }

    /// Iterates live values mutably in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Index, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| match &mut slot.entry {
                Entry::Occupied(value) => {
                    Some((Index::from_raw_parts(i as u32, slot.generation), value))
                }
                _ => None,
            })
    }

    /// Iterates the indices of live values in slot order.
    pub fn indices(&self) -> impl Iterator<Item = Index> + '_ {
        self.iter().map(|(index, _)| index)
    }

    /// Removes every value. Outstanding indices all become stale.
    pub fn clear(&mut self) {
        let live: Vec<Index> = self.indices().collect();
        for index in live {
            self.remove(index);
        }
    }
}

fn occupied_mut<T>(slot: Option<&mut Slot<T>>, index: Index) -> Option<&mut T> {
    match slot {
        Some(Slot {
            generation,
            entry: Entry::Occupied(value),
        }) if *generation == index.generation => Some(value),
        _ => None,
    }
}
