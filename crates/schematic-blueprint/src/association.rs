//! Non-owning references between entities.
//!
//! An [`Association`] names its target by arena key, never by pointer. Keys
//! are minted once per process, so a stale association reports "gone"
//! instead of dangling, and one handed to a different collection resolves
//! to nothing.
//!
//! Associations are `Copy`. Cloning a collection clones its arena with the
//! same keys, so associations inside the clone resolve to the clone's own
//! nodes.

use crate::collection::EntityCollection;
use crate::entity::EntityNode;
use schematic_core::id::EntityKey;

/// Weak handle to an entity in an [`EntityCollection`]. Equality is target
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Association(EntityKey);

impl Association {
    pub fn new(key: EntityKey) -> Self {
        Self(key)
    }

    pub fn key(self) -> EntityKey {
        self.0
    }

    /// The live target, or `None` once it has been removed.
    pub fn resolve(self, collection: &EntityCollection) -> Option<&EntityNode> {
        collection.get(self.0)
    }

    pub fn is_live(self, collection: &EntityCollection) -> bool {
        collection.contains(self.0)
    }
}

impl From<EntityKey> for Association {
    fn from(key: EntityKey) -> Self {
        Self(key)
    }
}
