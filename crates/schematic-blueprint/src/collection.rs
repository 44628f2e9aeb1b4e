//! The ordered, id-indexable container of placed entities.
//!
//! All nodes, including members nested inside groups, live in one sparse
//! arena owned by the collection, keyed by process-unique keys. The
//! top-level order is an [`EntityTree`]; each attached group carries its
//! own tree of member keys.
//! Leaves are indexed in a [`SpatialIndex`]; groups never are.
//!
//! # Mutation protocol
//!
//! Every mutating call runs in two phases:
//!
//! 1. **Validate** -- ids, index bounds, overlap resolution and the extent
//!    limit are checked against the current state. Nothing is written.
//! 2. **Commit** -- arena, spatial index, id map and bounding box are
//!    updated together, and collected warnings are recorded.
//!
//! A call that returns `Err` has therefore changed nothing.

use crate::association::Association;
use crate::config::{CollectionConfig, MAX_EXTENT};
use crate::entity::{Attachment, EntityNode, EntitySpec, Members};
use crate::error::{CollectionError, EntityError};
use crate::tree::EntityTree;
use schematic_core::catalog::Catalog;
use schematic_core::direction::Direction;
use schematic_core::geometry::{Aabb, EPSILON, Vector};
use schematic_core::id::{EntityKey, mint};
use schematic_core::warning::{Diagnostics, Warning};
use schematic_spatial::{OverlapPolicy, OverlapResolution, Placement, SpatialIndex, SpatialSource};
use slotmap::SparseSecondaryMap;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

/// Node storage. Keys come from [`mint`], so no two collections share one.
pub(crate) type Arena = SparseSecondaryMap<EntityKey, EntityNode>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of an insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placed<K = EntityKey> {
    /// A new item was added under this key.
    Inserted(K),
    /// The incoming item was folded into this existing one.
    Merged(K),
}

impl<K: Copy> Placed<K> {
    pub fn key(self) -> K {
        match self {
            Placed::Inserted(k) | Placed::Merged(k) => k,
        }
    }

    pub fn was_merged(self) -> bool {
        matches!(self, Placed::Merged(_))
    }
}

/// Ways to name an entity in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Key(EntityKey),
    /// Top-level ordinal position.
    Index(usize),
    /// Top-level id.
    Id(String),
    /// Ids from the top level down through nested groups.
    Path(Vec<String>),
}

impl EntityRef {
    pub fn path<S: AsRef<str>>(ids: &[S]) -> Self {
        EntityRef::Path(ids.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

impl From<EntityKey> for EntityRef {
    fn from(key: EntityKey) -> Self {
        EntityRef::Key(key)
    }
}

impl From<Association> for EntityRef {
    fn from(assoc: Association) -> Self {
        EntityRef::Key(assoc.key())
    }
}

impl From<usize> for EntityRef {
    fn from(index: usize) -> Self {
        EntityRef::Index(index)
    }
}

impl From<&str> for EntityRef {
    fn from(id: &str) -> Self {
        EntityRef::Id(id.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(id: String) -> Self {
        EntityRef::Id(id)
    }
}

/// Where [`EntityCollection::find_filtered`] looks.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Region {
    #[default]
    Everywhere,
    Point(Vector),
    Area(Aabb),
    Radius { center: Vector, radius: f64 },
}

/// Attribute filter over leaf entities. `invert` complements the attribute
/// test, never the region.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub region: Region,
    pub names: Option<HashSet<String>>,
    pub types: Option<HashSet<String>>,
    pub directions: Option<HashSet<Direction>>,
    pub limit: Option<usize>,
    pub invert: bool,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn names<I: IntoIterator<Item = S>, S: Into<String>>(mut self, names: I) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn types<I: IntoIterator<Item = S>, S: Into<String>>(mut self, types: I) -> Self {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn directions<I: IntoIterator<Item = Direction>>(mut self, directions: I) -> Self {
        self.directions = Some(directions.into_iter().collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn invert(mut self) -> Self {
        self.invert = true;
        self
    }

    fn matches(&self, node: &EntityNode) -> bool {
        let hit = self.names.as_ref().is_none_or(|s| s.contains(node.kind()))
            && self.types.as_ref().is_none_or(|s| s.contains(node.type_name()))
            && self
                .directions
                .as_ref()
                .is_none_or(|s| s.contains(&node.direction()));
        hit != self.invert
    }
}

// ---------------------------------------------------------------------------
// Arena helpers
// ---------------------------------------------------------------------------

fn world_position_in(arena: &Arena, key: EntityKey) -> Option<Vector> {
    let mut node = arena.get(key)?;
    let mut world = node.position();
    while let Some(parent) = node.parent() {
        node = arena.get(parent)?;
        world += node.position();
    }
    Some(world)
}

fn leaf_placement(node: &EntityNode, world: Vector) -> Placement {
    Placement::new(
        world,
        node.footprint().translated(world),
        node.prototype().collision_mask.clone(),
    )
}

/// Leaves of a detached node with their world placements.
fn detached_leaves<'a>(node: &'a EntityNode, origin: Vector, out: &mut Vec<(&'a EntityNode, Placement)>) {
    let world = origin + node.position();
    match node.members() {
        Some(members) => {
            for m in members {
                detached_leaves(m, world, out);
            }
        }
        None => out.push((node, leaf_placement(node, world))),
    }
}

/// Ids must be unique within each member list of a detached group.
fn check_member_ids(node: &EntityNode) -> Result<(), CollectionError> {
    if let Some(members) = node.members() {
        let mut seen = HashSet::new();
        for m in members {
            if let Some(id) = m.id()
                && !seen.insert(id)
            {
                return Err(CollectionError::DuplicateId(id.to_string()));
            }
            check_member_ids(m)?;
        }
    }
    Ok(())
}

fn check_extent(bounds: Option<Aabb>) -> Result<(), CollectionError> {
    if let Some(b) = bounds {
        let (width, height) = b.tile_dimensions();
        if width > MAX_EXTENT || height > MAX_EXTENT {
            return Err(CollectionError::SizeLimit { width, height });
        }
    }
    Ok(())
}

/// Read-only view of the arena for recursive indexing.
struct ArenaView<'a>(&'a Arena);

impl SpatialSource<EntityKey> for ArenaView<'_> {
    fn children(&self, key: EntityKey) -> Option<Vec<EntityKey>> {
        self.0.get(key)?.member_tree().map(|t| t.keys().collect())
    }

    fn placement(&self, key: EntityKey) -> Option<Placement> {
        let node = self.0.get(key)?;
        let world = world_position_in(self.0, key)?;
        Some(leaf_placement(node, world))
    }
}

/// Overlap rules for one incoming leaf.
struct InsertPolicy<'a> {
    arena: &'a Arena,
    candidate: &'a EntityNode,
    anchor: Vector,
    /// Occupants that are about to be replaced.
    ignore: &'a HashSet<EntityKey>,
}

impl InsertPolicy<'_> {
    fn same_spot(&self, occupant: EntityKey, node: &EntityNode) -> bool {
        node.kind() == self.candidate.kind()
            && node.direction() == self.candidate.direction()
            && world_position_in(self.arena, occupant)
                .is_some_and(|p| p.distance(self.anchor) < EPSILON)
    }
}

impl OverlapPolicy<EntityKey> for InsertPolicy<'_> {
    fn mergeable(&self, occupant: EntityKey) -> bool {
        if self.ignore.contains(&occupant) {
            return false;
        }
        self.arena.get(occupant).is_some_and(|node| {
            !node.is_group()
                && node.orientation() == self.candidate.orientation()
                && self.same_spot(occupant, node)
        })
    }

    fn exempt(&self, occupant: EntityKey) -> bool {
        if self.ignore.contains(&occupant) {
            return true;
        }
        // Rails may cross and run in parallel; only exact duplicates clash.
        self.arena.get(occupant).is_some_and(|node| {
            node.category().is_rail()
                && self.candidate.category().is_rail()
                && !self.same_spot(occupant, node)
        })
    }
}

// ---------------------------------------------------------------------------
// EntityCollection
// ---------------------------------------------------------------------------

/// Ordered container of placed entities with spatial and id lookup.
#[derive(Debug, Clone)]
pub struct EntityCollection {
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) config: CollectionConfig,
    pub(crate) arena: Arena,
    pub(crate) root: EntityTree,
    pub(crate) spatial: SpatialIndex<EntityKey>,
    pub(crate) bounds: Option<Aabb>,
    pub(crate) diagnostics: Diagnostics,
}

impl EntityCollection {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            config: CollectionConfig::default(),
            arena: Arena::new(),
            root: EntityTree::new(),
            spatial: SpatialIndex::new(),
            bounds: None,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_config(
        catalog: Arc<dyn Catalog>,
        config: CollectionConfig,
    ) -> Result<Self, CollectionError> {
        Ok(Self {
            config,
            spatial: SpatialIndex::with_cell_size(config.cell_size)?,
            ..Self::new(catalog)
        })
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> CollectionConfig {
        self.config
    }

    // -- Lookup --

    /// Number of top-level nodes.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of indexed leaf entities, including group members.
    pub fn leaf_count(&self) -> usize {
        self.spatial.len()
    }

    pub fn root(&self) -> &EntityTree {
        &self.root
    }

    pub fn spatial(&self) -> &SpatialIndex<EntityKey> {
        &self.spatial
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.arena.contains_key(key)
    }

    pub fn get(&self, key: EntityKey) -> Option<&EntityNode> {
        self.arena.get(key)
    }

    /// Mutable access for field edits. Placement setters still refuse
    /// while the node is attached.
    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut EntityNode> {
        self.arena.get_mut(key)
    }

    pub fn at(&self, index: usize) -> Option<&EntityNode> {
        self.root.get(index).and_then(|k| self.arena.get(k))
    }

    pub fn by_id(&self, id: &str) -> Option<&EntityNode> {
        self.root.key_of_id(id).and_then(|k| self.arena.get(k))
    }

    /// Top-level nodes in order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityNode> + '_ {
        self.root.keys().filter_map(|k| self.arena.get(k))
    }

    /// Set a field on an attached node and record any warning.
    pub fn set_field(
        &mut self,
        target: impl Into<EntityRef>,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), CollectionError> {
        let key = self.resolve(target)?;
        let node = self
            .arena
            .get_mut(key)
            .ok_or(CollectionError::NotInCollection)?;
        if let Some(w) = node.set_field(name, value)? {
            self.diagnostics.warn(w);
        }
        Ok(())
    }

    /// Resolve any [`EntityRef`] to a live key in this collection.
    pub fn resolve(&self, r: impl Into<EntityRef>) -> Result<EntityKey, CollectionError> {
        match r.into() {
            EntityRef::Key(key) => {
                if self.arena.contains_key(key) {
                    Ok(key)
                } else {
                    Err(CollectionError::NotInCollection)
                }
            }
            EntityRef::Index(index) => {
                self.root
                    .get(index)
                    .ok_or(CollectionError::IndexOutOfRange {
                        index,
                        len: self.root.len(),
                    })
            }
            EntityRef::Id(id) => self
                .root
                .key_of_id(&id)
                .ok_or(CollectionError::IdNotFound(id)),
            EntityRef::Path(path) => {
                let mut tree = &self.root;
                let mut found = None;
                for id in &path {
                    if found.is_some() {
                        let node = found.and_then(|k| self.arena.get(k));
                        tree = match node.and_then(EntityNode::member_tree) {
                            Some(t) => t,
                            None => {
                                let kind = node.map(|n| n.kind().to_string()).unwrap_or_default();
                                return Err(CollectionError::NotAGroup(kind));
                            }
                        };
                    }
                    found = Some(
                        tree.key_of_id(id)
                            .ok_or_else(|| CollectionError::IdNotFound(id.clone()))?,
                    );
                }
                found.ok_or(CollectionError::NotInCollection)
            }
        }
    }

    /// World-space position, summing group offsets.
    pub fn world_position(&self, key: EntityKey) -> Option<Vector> {
        world_position_in(&self.arena, key)
    }

    /// World-space placement of a leaf.
    pub fn placement(&self, key: EntityKey) -> Option<&Placement> {
        self.spatial.get(key)
    }

    /// Member keys of an attached group, in order.
    pub fn members(&self, key: EntityKey) -> Option<Vec<EntityKey>> {
        ArenaView(&self.arena).children(key)
    }

    /// Depth-first sequence of leaf entities. Groups contribute their
    /// members, never themselves.
    pub fn flatten(&self) -> Vec<EntityKey> {
        let mut out = Vec::with_capacity(self.arena.len());
        for key in self.root.keys() {
            self.flatten_into(key, &mut out);
        }
        out
    }

    fn flatten_into(&self, key: EntityKey, out: &mut Vec<EntityKey>) {
        match self.members(key) {
            Some(members) => {
                for m in members {
                    self.flatten_into(m, out);
                }
            }
            None => out.push(key),
        }
    }

    /// Union of all leaf footprints, or `None` when empty.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Width and height in tiles covered by [`Self::bounds`].
    pub fn tile_extent(&self) -> (u32, u32) {
        self.bounds.map(|b| b.tile_dimensions()).unwrap_or((0, 0))
    }

    // -- Warnings --

    pub fn warnings(&self) -> &[Warning] {
        self.diagnostics.warnings()
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.diagnostics.take()
    }

    // -- Construction --

    /// Build a detached node against this collection's catalog and mode.
    pub fn create(&mut self, spec: EntitySpec) -> Result<EntityNode, CollectionError> {
        Ok(spec.build(
            self.catalog.as_ref(),
            self.config.mode,
            &mut self.diagnostics,
        )?)
    }

    // -- Insertion --

    pub fn insert(&mut self, index: usize, node: EntityNode) -> Result<Placed, CollectionError> {
        self.insert_with(index, node, false)
    }

    pub fn append(&mut self, node: EntityNode) -> Result<Placed, CollectionError> {
        self.insert_with(self.len(), node, false)
    }

    /// Append, folding into a compatible occupant if one exists.
    pub fn append_merge(&mut self, node: EntityNode) -> Result<Placed, CollectionError> {
        self.insert_with(self.len(), node, true)
    }

    pub fn insert_spec(
        &mut self,
        index: usize,
        spec: EntitySpec,
        merge: bool,
    ) -> Result<Placed, CollectionError> {
        let mut staged = Diagnostics::new();
        let node = spec.build(self.catalog.as_ref(), self.config.mode, &mut staged)?;
        let placed = self.insert_with(index, node, merge)?;
        self.diagnostics.extend(staged.take());
        Ok(placed)
    }

    pub fn append_spec(&mut self, spec: EntitySpec) -> Result<Placed, CollectionError> {
        self.insert_spec(self.len(), spec, false)
    }

    /// Insert `node` at top-level position `index`.
    ///
    /// With `merge` set, a leaf landing exactly on a compatible occupant
    /// (same kind, position, direction and orientation) is folded into it
    /// and nothing is added.
    pub fn insert_with(
        &mut self,
        index: usize,
        node: EntityNode,
        merge: bool,
    ) -> Result<Placed, CollectionError> {
        if node.is_attached() {
            return Err(EntityError::AttachedImmutable.into());
        }
        if index > self.root.len() {
            return Err(CollectionError::IndexOutOfRange {
                index,
                len: self.root.len(),
            });
        }
        if let Some(id) = node.id()
            && self.root.contains_id(id)
        {
            return Err(CollectionError::DuplicateId(id.to_string()));
        }
        check_member_ids(&node)?;

        let no_ignore = HashSet::new();
        let (new_bounds, warnings) = {
            let mut leaves = Vec::new();
            detached_leaves(&node, Vector::ZERO, &mut leaves);
            let merge = merge && !node.is_group();
            let mut warnings = Vec::new();
            for (leaf, placement) in &leaves {
                let policy = InsertPolicy {
                    arena: &self.arena,
                    candidate: leaf,
                    anchor: placement.anchor,
                    ignore: &no_ignore,
                };
                match self.spatial.resolve_overlap(placement, merge, &policy) {
                    OverlapResolution::Merge(target) => {
                        if let Some(occupant) = self.arena.get_mut(target) {
                            occupant.merge_fields_from(&node);
                        }
                        log::debug!("merged {} into existing entity", node.kind());
                        return Ok(Placed::Merged(target));
                    }
                    OverlapResolution::Place { conflicts } => {
                        warnings.extend(self.overlap_warnings(leaf, placement, &conflicts));
                    }
                }
            }
            let new_bounds = leaves
                .iter()
                .fold(self.bounds, |acc, (_, p)| Aabb::merge(acc, Some(p.bounds)));
            (new_bounds, warnings)
        };
        check_extent(new_bounds)?;

        let id = node.id().map(str::to_string);
        let kind = node.kind().to_string();
        let key = self.attach(node, None)?;
        self.root.insert(index, key, id);
        self.bounds = new_bounds;
        self.diagnostics.extend(warnings);
        log::debug!("inserted {kind} at index {index}");
        Ok(Placed::Inserted(key))
    }

    fn overlap_warnings(
        &self,
        leaf: &EntityNode,
        placement: &Placement,
        conflicts: &[EntityKey],
    ) -> Vec<Warning> {
        conflicts
            .iter()
            .filter_map(|k| self.arena.get(*k))
            .map(|other| Warning::Overlap {
                entity: leaf.kind().to_string(),
                other: other.kind().to_string(),
                position: placement.anchor,
            })
            .collect()
    }

    /// Move a detached node (and its members) into the arena and index it.
    fn attach(
        &mut self,
        node: EntityNode,
        parent: Option<EntityKey>,
    ) -> Result<EntityKey, CollectionError> {
        let key = self.attach_arena(node, parent);
        self.spatial.recursive_insert(&ArenaView(&self.arena), key)?;
        Ok(key)
    }

    fn attach_arena(&mut self, mut node: EntityNode, parent: Option<EntityKey>) -> EntityKey {
        let members = node.members.take();
        let key: EntityKey = mint();
        node.attachment = Some(Attachment { key, parent });
        self.arena.insert(key, node);
        let members = match members {
            Some(Members::Detached(list)) => {
                let mut tree = EntityTree::new();
                for (i, member) in list.into_iter().enumerate() {
                    let id = member.id().map(str::to_string);
                    let child = self.attach_arena(member, Some(key));
                    tree.insert(i, child, id);
                }
                Some(Members::Attached(tree))
            }
            other => other,
        };
        if let Some(n) = self.arena.get_mut(key) {
            n.members = members;
        }
        key
    }

    /// Pull a node (and its members) out of the index and the arena.
    ///
    /// Its own wire endpoints are dropped; associations held by other
    /// nodes are left in place and stop resolving.
    fn detach(&mut self, key: EntityKey) -> Option<EntityNode> {
        self.spatial.recursive_remove(&ArenaView(&self.arena), key);
        self.detach_arena(key)
    }

    fn detach_arena(&mut self, key: EntityKey) -> Option<EntityNode> {
        let mut node = self.arena.remove(key)?;
        node.members = match node.members.take() {
            Some(Members::Attached(tree)) => {
                let keys: Vec<EntityKey> = tree.keys().collect();
                let members = keys
                    .into_iter()
                    .filter_map(|k| self.detach_arena(k))
                    .collect();
                Some(Members::Detached(members))
            }
            other => other,
        };
        node.clear_links();
        node.attachment = None;
        Some(node)
    }

    fn recompute_bounds(&mut self) {
        self.bounds = self
            .spatial
            .keys()
            .filter_map(|k| self.spatial.get(k))
            .map(|p| p.bounds)
            .reduce(|a, b| a.union(&b));
    }

    // -- Replacement --

    /// Swap the node at `index` for `node`, returning the old one detached.
    /// No merging is attempted.
    pub fn replace(&mut self, index: usize, node: EntityNode) -> Result<EntityNode, CollectionError> {
        if node.is_attached() {
            return Err(EntityError::AttachedImmutable.into());
        }
        let old_key = self.root.get(index).ok_or(CollectionError::IndexOutOfRange {
            index,
            len: self.root.len(),
        })?;
        if let Some(id) = node.id()
            && self.root.index_of_id(id).is_some_and(|i| i != index)
        {
            return Err(CollectionError::DuplicateId(id.to_string()));
        }
        check_member_ids(&node)?;

        let mut old_leaves = Vec::new();
        self.flatten_into(old_key, &mut old_leaves);
        let ignore: HashSet<EntityKey> = old_leaves.into_iter().collect();

        let mut leaves = Vec::new();
        detached_leaves(&node, Vector::ZERO, &mut leaves);
        let mut warnings = Vec::new();
        for (leaf, placement) in &leaves {
            let policy = InsertPolicy {
                arena: &self.arena,
                candidate: leaf,
                anchor: placement.anchor,
                ignore: &ignore,
            };
            if let OverlapResolution::Place { conflicts } =
                self.spatial.resolve_overlap(placement, false, &policy)
            {
                warnings.extend(self.overlap_warnings(leaf, placement, &conflicts));
            }
        }
        let kept = self
            .spatial
            .keys()
            .filter(|k| !ignore.contains(k))
            .filter_map(|k| self.spatial.get(k))
            .map(|p| p.bounds)
            .reduce(|a, b| a.union(&b));
        let new_bounds = leaves
            .iter()
            .fold(kept, |acc, (_, p)| Aabb::merge(acc, Some(p.bounds)));
        check_extent(new_bounds)?;

        let id = node.id().map(str::to_string);
        let old = self.detach(old_key).ok_or(CollectionError::NotInCollection)?;
        let key = self.attach(node, None)?;
        self.root.replace(index, key, id);
        self.bounds = new_bounds;
        self.diagnostics.extend(warnings);
        log::debug!("replaced {} at index {index}", old.kind());
        Ok(old)
    }

    // -- Removal --

    /// Remove the top-level node at `index` and return it detached.
    pub fn remove(&mut self, index: usize) -> Result<EntityNode, CollectionError> {
        let key = self.root.get(index).ok_or(CollectionError::IndexOutOfRange {
            index,
            len: self.root.len(),
        })?;
        self.root.remove(index);
        let node = self.detach(key).ok_or(CollectionError::NotInCollection)?;
        self.recompute_bounds();
        log::debug!("removed {} from index {index}", node.kind());
        Ok(node)
    }

    pub fn remove_by_id(&mut self, id: &str) -> Result<EntityNode, CollectionError> {
        let index = self
            .root
            .index_of_id(id)
            .ok_or_else(|| CollectionError::IdNotFound(id.to_string()))?;
        self.remove(index)
    }

    /// Remove a contiguous run of top-level nodes.
    pub fn remove_range(&mut self, range: Range<usize>) -> Result<Vec<EntityNode>, CollectionError> {
        let len = self.root.len();
        let bad = if range.start > range.end {
            Some(range.start)
        } else if range.end > len {
            Some(range.end)
        } else {
            None
        };
        if let Some(index) = bad {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        let mut removed = Vec::with_capacity(range.len());
        for _ in range.clone() {
            if let Some(key) = self.root.remove(range.start)
                && let Some(node) = self.detach(key)
            {
                removed.push(node);
            }
        }
        self.recompute_bounds();
        log::debug!("removed {} entities", removed.len());
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = EntityTree::new();
        self.spatial.clear();
        self.bounds = None;
    }

    /// A detached deep copy of an attached node, without wire endpoints.
    pub fn detached_copy(&self, key: EntityKey) -> Option<EntityNode> {
        let mut node = self.arena.get(key)?.clone();
        node.attachment = None;
        node.clear_links();
        if let Some(members) = self.members(key) {
            let copies = members
                .into_iter()
                .filter_map(|k| self.detached_copy(k))
                .collect();
            node.members = Some(Members::Detached(copies));
        }
        Some(node)
    }

    // -- Queries --

    /// Leaves of kind `kind` whose footprint contains `point`.
    pub fn find_at(&self, kind: &str, point: Vector) -> Vec<EntityKey> {
        self.spatial
            .query_point(point, None)
            .into_iter()
            .filter(|k| self.arena.get(*k).is_some_and(|n| n.kind() == kind))
            .collect()
    }

    pub fn find_first_at(&self, point: Vector) -> Option<EntityKey> {
        self.spatial.query_point(point, Some(1)).first().copied()
    }

    pub fn find_in_area(&self, area: &Aabb) -> Vec<EntityKey> {
        self.spatial.query_area(area, None)
    }

    pub fn find_filtered(&self, filter: &EntityFilter) -> Vec<EntityKey> {
        let candidates = match &filter.region {
            Region::Everywhere => self.flatten(),
            Region::Point(p) => self.spatial.query_point(*p, None),
            Region::Area(a) => self.spatial.query_area(a, None),
            Region::Radius { center, radius } => {
                self.spatial.query_radius(*center, *radius, None)
            }
        };
        candidates
            .into_iter()
            .filter(|k| self.arena.get(*k).is_some_and(|n| filter.matches(n)))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schematic_core::catalog::vanilla;
    use schematic_core::test_utils::toy_catalog;
    use serde_json::json;

    fn toy() -> EntityCollection {
        EntityCollection::new(toy_catalog())
    }

    fn spec(kind: &str, x: f64, y: f64) -> EntitySpec {
        EntitySpec::new(kind).position(x, y)
    }

    // -----------------------------------------------------------------------
    // Insert
    // -----------------------------------------------------------------------

    #[test]
    fn insert_updates_every_view() {
        let mut c = toy();
        let a = c.append_spec(spec("box", 0.5, 0.5).id("a")).unwrap().key();
        let b = c.insert_spec(0, spec("box", 3.5, 0.5).id("b"), false).unwrap().key();
        assert_eq!(c.len(), 2);
        assert_eq!(c.root().get(0), Some(b));
        assert_eq!(c.root().index_of_id("a"), Some(1));
        assert_eq!(c.find_first_at(Vector::new(0.5, 0.5)), Some(a));
        assert_eq!(c.get(a).unwrap().key(), Some(a));
        let bounds = c.bounds().unwrap();
        assert!((bounds.top_left.x - 0.15).abs() < 1e-9);
        assert!((bounds.bottom_right.x - 3.85).abs() < 1e-9);
        assert!(c.root().is_consistent());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5).id("a")).unwrap();
        let err = c.append_spec(spec("box", 5.5, 0.5).id("a")).unwrap_err();
        assert_eq!(err, CollectionError::DuplicateId("a".into()));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn index_past_end_rejected() {
        let mut c = toy();
        let node = c.create(EntitySpec::new("box")).unwrap();
        assert!(matches!(
            c.insert(2, node),
            Err(CollectionError::IndexOutOfRange { index: 2, len: 0 })
        ));
    }

    #[test]
    fn overlap_warns_but_inserts() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5)).unwrap();
        c.append_spec(spec("box", 0.7, 0.5)).unwrap();
        assert_eq!(c.len(), 2);
        let warnings = c.take_warnings();
        assert!(matches!(warnings.as_slice(), [Warning::Overlap { .. }]));
    }

    #[test]
    fn merge_folds_fields() {
        let mut c = toy();
        let first = c
            .append_spec(spec("box", 0.5, 0.5).field("bar", json!(2)))
            .unwrap()
            .key();
        let node = c.create(spec("box", 0.5, 0.5).field("bar", json!(5))).unwrap();
        let placed = c.append_merge(node).unwrap();
        assert_eq!(placed, Placed::Merged(first));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(first).unwrap().field("bar"), Some(&json!(5)));
        assert!(c.warnings().is_empty());
    }

    #[test]
    fn merge_requires_same_kind() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5)).unwrap();
        let node = c.create(spec("pole", 0.5, 0.5)).unwrap();
        assert!(!c.append_merge(node).unwrap().was_merged());
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn size_limit_leaves_state_untouched() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5)).unwrap();
        let before = (c.len(), c.leaf_count(), c.bounds());
        let err = c.append_spec(spec("box", 10_001.5, 0.5)).unwrap_err();
        assert!(matches!(err, CollectionError::SizeLimit { width: 10_002, .. }));
        assert_eq!((c.len(), c.leaf_count(), c.bounds()), before);
    }

    #[test]
    fn strict_mode_rejects_unknown_kind() {
        let mut c = toy();
        assert!(matches!(
            c.append_spec(EntitySpec::new("mystery")),
            Err(CollectionError::Entity(EntityError::UnknownKind(_)))
        ));
        let mut p =
            EntityCollection::with_config(toy_catalog(), CollectionConfig::permissive()).unwrap();
        p.append_spec(EntitySpec::new("mystery")).unwrap();
        assert_eq!(p.len(), 1);
        assert!(matches!(p.warnings(), [Warning::UnknownKind { .. }]));
    }

    #[test]
    fn attached_nodes_refuse_repositioning() {
        let mut c = toy();
        let key = c.append_spec(spec("box", 0.5, 0.5)).unwrap().key();
        let node = c.get_mut(key).unwrap();
        assert_eq!(
            node.set_position(Vector::new(9.0, 9.0)),
            Err(EntityError::AttachedImmutable)
        );
        assert!(node.set_field("bar", json!(1)).is_ok());
    }

    #[test]
    fn rails_only_clash_when_identical() {
        let mut c = EntityCollection::new(vanilla());
        c.append_spec(spec("straight-rail", 1.0, 1.0)).unwrap();
        c.append_spec(spec("straight-rail", 1.0, 1.0).direction(Direction::East))
            .unwrap();
        assert!(c.take_warnings().is_empty());
        c.append_spec(spec("straight-rail", 1.0, 1.0)).unwrap();
        assert_eq!(c.take_warnings().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Remove / replace
    // -----------------------------------------------------------------------

    #[test]
    fn remove_shifts_and_shrinks_bounds() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5).id("a")).unwrap();
        c.append_spec(spec("box", 20.5, 0.5).id("b")).unwrap();
        c.append_spec(spec("box", 2.5, 0.5).id("c")).unwrap();
        let removed = c.remove_by_id("b").unwrap();
        assert_eq!(removed.id(), Some("b"));
        assert!(!removed.is_attached());
        assert_eq!(c.root().index_of_id("c"), Some(1));
        assert!(c.bounds().unwrap().bottom_right.x < 3.0);
        assert!(c.find_at("box", Vector::new(20.5, 0.5)).is_empty());
        assert!(c.root().is_consistent());
    }

    #[test]
    fn remove_range_takes_slice() {
        let mut c = toy();
        for i in 0..5 {
            c.append_spec(spec("box", i as f64 * 2.0 + 0.5, 0.5).id(&format!("e{i}")))
                .unwrap();
        }
        let removed = c.remove_range(1..4).unwrap();
        let ids: Vec<_> = removed.iter().filter_map(|n| n.id()).collect();
        assert_eq!(ids, ["e1", "e2", "e3"]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.root().index_of_id("e4"), Some(1));
        assert!(c.remove_range(1..3).is_err());
        assert!(c.root().is_consistent());
    }

    #[test]
    fn remove_range_reports_the_offending_bound() {
        let mut c = toy();
        for i in 0..5 {
            c.append_spec(spec("box", i as f64 * 2.0 + 0.5, 0.5)).unwrap();
        }
        assert_eq!(
            c.remove_range(Range { start: 3, end: 1 }).unwrap_err(),
            CollectionError::IndexOutOfRange { index: 3, len: 5 }
        );
        assert_eq!(
            c.remove_range(2..7).unwrap_err(),
            CollectionError::IndexOutOfRange { index: 7, len: 5 }
        );
        assert_eq!(c.len(), 5);
        assert!(c.remove_range(5..5).unwrap().is_empty());
    }

    #[test]
    fn replace_rekeys_and_reindexes() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5).id("old")).unwrap();
        let new = c.create(spec("big-box", 0.5, 0.5).id("new")).unwrap();
        let old = c.replace(0, new).unwrap();
        assert_eq!(old.kind(), "box");
        assert!(c.by_id("old").is_none());
        assert_eq!(c.by_id("new").map(|n| n.kind()), Some("big-box"));
        // The replaced node does not count as an overlap.
        assert!(c.warnings().is_empty());
        assert_eq!(c.leaf_count(), 1);
    }

    #[test]
    fn replace_rejects_taken_id() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5).id("a")).unwrap();
        c.append_spec(spec("box", 4.5, 0.5).id("b")).unwrap();
        let node = c.create(spec("box", 0.5, 0.5).id("b")).unwrap();
        assert!(matches!(c.replace(0, node), Err(CollectionError::DuplicateId(_))));
        assert_eq!(c.by_id("a").map(|n| n.kind()), Some("box"));
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    fn nested_group(c: &mut EntityCollection) -> EntityNode {
        let leaf = |c: &mut EntityCollection, x: f64, id: &str| {
            c.create(spec("box", x, 0.5).id(id)).unwrap()
        };
        let inner = EntityNode::group(
            Some("inner"),
            Vector::new(0.0, 2.0),
            vec![leaf(c, 0.5, "c"), leaf(c, 1.5, "d")],
        );
        EntityNode::group(
            Some("outer"),
            Vector::new(10.0, 0.0),
            vec![leaf(c, 0.5, "a"), inner, leaf(c, 2.5, "b")],
        )
    }

    #[test]
    fn groups_index_leaves_in_world_space() {
        let mut c = toy();
        let group = nested_group(&mut c);
        let key = c.append(group).unwrap().key();
        assert_eq!(c.len(), 1);
        assert_eq!(c.leaf_count(), 4);
        assert!(c.placement(key).is_none());

        let d = c.resolve(EntityRef::path(&["outer", "inner", "d"])).unwrap();
        assert_eq!(c.world_position(d), Some(Vector::new(11.5, 2.5)));
        assert_eq!(c.find_first_at(Vector::new(11.5, 2.5)), Some(d));
    }

    #[test]
    fn flatten_is_depth_first_leaves() {
        let mut c = toy();
        c.append_spec(spec("pole", 0.5, 5.5).id("first")).unwrap();
        let group = nested_group(&mut c);
        c.append(group).unwrap();
        let ids: Vec<_> = c
            .flatten()
            .into_iter()
            .filter_map(|k| c.get(k).and_then(|n| n.id()))
            .collect();
        assert_eq!(ids, ["first", "a", "c", "d", "b"]);
    }

    #[test]
    fn removing_group_detaches_members() {
        let mut c = toy();
        let group = nested_group(&mut c);
        c.append(group).unwrap();
        let removed = c.remove(0).unwrap();
        assert_eq!(removed.members().map(<[_]>::len), Some(3));
        assert_eq!(c.leaf_count(), 0);
        assert_eq!(c.bounds(), None);
        // Reinsert the detached group.
        c.append(removed).unwrap();
        assert_eq!(c.leaf_count(), 4);
    }

    #[test]
    fn duplicate_member_ids_rejected() {
        let mut c = toy();
        let a = c.create(spec("box", 0.5, 0.5).id("x")).unwrap();
        let b = c.create(spec("box", 2.5, 0.5).id("x")).unwrap();
        let group = EntityNode::group(None, Vector::ZERO, vec![a, b]);
        assert_eq!(
            c.append(group).unwrap_err(),
            CollectionError::DuplicateId("x".into())
        );
        assert!(c.is_empty());
    }

    #[test]
    fn path_through_leaf_fails() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5).id("a")).unwrap();
        assert!(matches!(
            c.resolve(EntityRef::path(&["a", "b"])),
            Err(CollectionError::NotAGroup(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn filtered_queries() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5)).unwrap();
        c.append_spec(spec("pole", 2.5, 0.5)).unwrap();
        c.append_spec(spec("long-box", 4.5, 1.0).direction(Direction::East))
            .unwrap();
        c.append_spec(spec("box", 30.5, 0.5)).unwrap();

        let boxes = c.find_filtered(&EntityFilter::new().names(["box"]));
        assert_eq!(boxes.len(), 2);

        let near_boxes = c.find_filtered(
            &EntityFilter::new()
                .names(["box"])
                .region(Region::Area(Aabb::from_coords(0.0, 0.0, 10.0, 2.0))),
        );
        assert_eq!(near_boxes.len(), 1);

        let not_boxes = c.find_filtered(&EntityFilter::new().names(["box"]).invert());
        assert_eq!(not_boxes.len(), 2);

        let east = c.find_filtered(&EntityFilter::new().directions([Direction::East]));
        assert_eq!(east.len(), 1);

        let containers = c.find_filtered(&EntityFilter::new().types(["container"]).limit(1));
        assert_eq!(containers.len(), 1);

        let radius = c.find_filtered(&EntityFilter::new().region(Region::Radius {
            center: Vector::new(0.5, 0.5),
            radius: 2.5,
        }));
        assert_eq!(radius.len(), 2);
    }

    #[test]
    fn world_sized_queries_over_one_entity() {
        let mut c = toy();
        let key = c.append_spec(spec("box", 0.5, 0.5)).unwrap().key();
        let world = Aabb::from_coords(-1.0e9, -1.0e9, 1.0e9, 1.0e9);
        assert_eq!(c.find_in_area(&world), vec![key]);
        let around = c.find_filtered(&EntityFilter::new().region(Region::Radius {
            center: Vector::new(0.0, 0.0),
            radius: 1.0e9,
        }));
        assert_eq!(around, vec![key]);
    }

    #[test]
    fn find_at_checks_kind() {
        let mut c = toy();
        c.append_spec(spec("box", 0.5, 0.5)).unwrap();
        assert_eq!(c.find_at("box", Vector::new(0.5, 0.5)).len(), 1);
        assert!(c.find_at("pole", Vector::new(0.5, 0.5)).is_empty());
        assert!(c.find_first_at(Vector::new(5.0, 5.0)).is_none());
        assert_eq!(
            c.find_in_area(&Aabb::from_coords(-1.0, -1.0, 1.0, 1.0)).len(),
            1
        );
    }

    #[test]
    fn detached_copy_is_insertable() {
        let mut c = toy();
        let group = nested_group(&mut c);
        let key = c.append(group).unwrap().key();
        let copy = c.detached_copy(key).unwrap();
        assert!(!copy.is_attached());
        let mut other = toy();
        other.append(copy).unwrap();
        assert_eq!(other.leaf_count(), 4);
    }
}
