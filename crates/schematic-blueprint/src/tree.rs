//! Ordered list of entity keys with an id overlay.
//!
//! [`EntityTree`] is the list behind a collection and behind every group:
//! ordinal positions map to arena keys, and user ids map to ordinal
//! positions. The two views are kept bijective through every insert,
//! remove and replace.

use schematic_core::id::EntityKey;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    key: EntityKey,
    id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTree {
    slots: Vec<Slot>,
    key_to_idx: HashMap<String, usize>,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<EntityKey> {
        self.slots.get(index).map(|s| s.key)
    }

    pub fn id_at(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|s| s.id.as_deref())
    }

    pub fn index_of_id(&self, id: &str) -> Option<usize> {
        self.key_to_idx.get(id).copied()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.key_to_idx.contains_key(id)
    }

    pub fn key_of_id(&self, id: &str) -> Option<EntityKey> {
        self.index_of_id(id).and_then(|i| self.get(i))
    }

    pub fn position_of(&self, key: EntityKey) -> Option<usize> {
        self.slots.iter().position(|s| s.key == key)
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = EntityKey> + '_ {
        self.slots.iter().map(|s| s.key)
    }

    /// Number of entries that carry an id.
    pub fn id_count(&self) -> usize {
        self.key_to_idx.len()
    }

    /// Insert at `index`, shifting later entries. The caller guarantees
    /// `index <= len` and that `id` is not taken.
    pub(crate) fn insert(&mut self, index: usize, key: EntityKey, id: Option<String>) {
        for idx in self.key_to_idx.values_mut() {
            if *idx >= index {
                *idx += 1;
            }
        }
        if let Some(id) = &id {
            self.key_to_idx.insert(id.clone(), index);
        }
        self.slots.insert(index, Slot { key, id });
    }

    /// Remove the entry at `index`, shifting later entries back.
    pub(crate) fn remove(&mut self, index: usize) -> Option<EntityKey> {
        if index >= self.slots.len() {
            return None;
        }
        let slot = self.slots.remove(index);
        if let Some(id) = &slot.id {
            self.key_to_idx.remove(id);
        }
        for idx in self.key_to_idx.values_mut() {
            if *idx > index {
                *idx -= 1;
            }
        }
        Some(slot.key)
    }

    /// Swap the entry at `index` for a new one, rekeying if the id changed.
    pub(crate) fn replace(
        &mut self,
        index: usize,
        key: EntityKey,
        id: Option<String>,
    ) -> Option<EntityKey> {
        let slot = self.slots.get_mut(index)?;
        if let Some(old) = &slot.id {
            self.key_to_idx.remove(old);
        }
        if let Some(new) = &id {
            self.key_to_idx.insert(new.clone(), index);
        }
        let old_key = slot.key;
        *slot = Slot { key, id };
        Some(old_key)
    }

    /// Whether the id map and the ordered slots agree.
    pub fn is_consistent(&self) -> bool {
        let with_id = self.slots.iter().filter(|s| s.id.is_some()).count();
        with_id == self.key_to_idx.len()
            && self
                .key_to_idx
                .iter()
                .all(|(id, &i)| self.slots.get(i).and_then(|s| s.id.as_deref()) == Some(id))
    }
}
