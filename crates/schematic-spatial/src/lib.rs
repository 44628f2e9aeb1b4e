//! Hash-grid spatial index for placed objects.
//!
//! Space is cut into square cells of `cell_size` world units. Each indexed
//! item is recorded in every cell its bounding box touches; queries gather
//! candidates from the touched cells (broad phase) and then test the real
//! footprint (narrow phase).
//!
//! The index is generic over any slotmap key, so entity collections and
//! tile collections share one implementation. Items that own nested
//! children are indexed through [`SpatialSource`], which lets the index
//! recurse into containers and store only leaves.

use schematic_core::geometry::{Aabb, CollisionMask, CollisionSet, Vector};
use serde::{Deserialize, Serialize};
use slotmap::{Key, SparseSecondaryMap};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Cell edge length used when none is configured.
pub const DEFAULT_CELL_SIZE: f64 = 8.0;

/// Subtracted from the high edge of a box so one that ends exactly on a
/// cell boundary does not spill into the next cell.
const CELL_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Integer coordinate of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// World-space footprint of one indexed item.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Reference point used by radius queries.
    pub anchor: Vector,
    pub collision: CollisionSet,
    pub mask: CollisionMask,
    pub bounds: Aabb,
}

impl Placement {
    /// `collision` must already be in world space.
    pub fn new(anchor: Vector, collision: CollisionSet, mask: CollisionMask) -> Self {
        let bounds = collision
            .bounding_box()
            .unwrap_or_else(|| Aabb::point(anchor));
        Self {
            anchor,
            collision,
            mask,
            bounds,
        }
    }

    pub fn contains_point(&self, p: Vector) -> bool {
        if self.collision.is_empty() {
            self.bounds.contains_point(p)
        } else {
            self.collision.contains_point(p)
        }
    }

    pub fn overlaps_area(&self, area: &Aabb) -> bool {
        if self.collision.is_empty() {
            area.contains_point(self.anchor)
        } else {
            self.collision.overlaps_aabb(area)
        }
    }

    /// Narrow-phase collision: shapes overlap and masks share a layer.
    pub fn collides_with(&self, other: &Placement) -> bool {
        self.mask.intersects(&other.mask)
            && self.bounds.overlaps(&other.bounds)
            && self.collision.overlaps(&other.collision)
    }
}

/// Errors from spatial operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("item is already indexed")]
    AlreadyIndexed,
    #[error("cell size must be positive and finite")]
    InvalidCellSize,
}

/// Access to nested items for recursive indexing.
pub trait SpatialSource<K> {
    /// `Some` for containers (possibly empty); `None` for leaves.
    fn children(&self, key: K) -> Option<Vec<K>>;
    /// World-space placement of a leaf.
    fn placement(&self, key: K) -> Option<Placement>;
}

/// Decides how an incoming item treats the occupants it touches.
pub trait OverlapPolicy<K> {
    /// Whether the incoming item may be folded into `occupant`.
    fn mergeable(&self, occupant: K) -> bool;

    /// Whether an overlap with `occupant` should go unreported.
    fn exempt(&self, _occupant: K) -> bool {
        false
    }
}

/// Outcome of [`SpatialIndex::resolve_overlap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlapResolution<K> {
    /// Fold the incoming item into this occupant; insert nothing.
    Merge(K),
    /// Insert the incoming item. `conflicts` lists occupants it collides with.
    Place { conflicts: Vec<K> },
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// A hash grid mapping cells to the keys whose bounds touch them.
///
/// Maintains two views that are kept in step:
/// - `cells`: cell -> keys touching that cell
/// - `placements`: key -> world-space footprint
#[derive(Debug, Clone)]
pub struct SpatialIndex<K: Key> {
    cell_size: f64,
    cells: HashMap<CellCoord, SmallVec<[K; 4]>>,
    placements: SparseSecondaryMap<K, Placement>,
}

impl<K: Key> Default for SpatialIndex<K> {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            cells: HashMap::new(),
            placements: SparseSecondaryMap::new(),
        }
    }
}

impl<K: Key> SpatialIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell_size(cell_size: f64) -> Result<Self, SpatialError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SpatialError::InvalidCellSize);
        }
        Ok(Self {
            cell_size,
            ..Self::default()
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    // -- Cells --

    fn cell_of(&self, v: f64) -> i32 {
        (v / self.cell_size).floor() as i32
    }

    /// Inclusive corner cells of a box.
    fn cell_range(&self, bounds: &Aabb) -> (CellCoord, CellCoord) {
        let x0 = self.cell_of(bounds.top_left.x);
        let y0 = self.cell_of(bounds.top_left.y);
        let x1 = self.cell_of(bounds.bottom_right.x - CELL_EPSILON).max(x0);
        let y1 = self.cell_of(bounds.bottom_right.y - CELL_EPSILON).max(y0);
        (CellCoord::new(x0, y0), CellCoord::new(x1, y1))
    }

    /// Every cell a box touches, row-major.
    pub fn cells_for(&self, bounds: &Aabb) -> impl Iterator<Item = CellCoord> + '_ {
        let (lo, hi) = self.cell_range(bounds);
        (lo.y..=hi.y).flat_map(move |y| (lo.x..=hi.x).map(move |x| CellCoord::new(x, y)))
    }

    /// The occupied cells a box touches, row-major.
    ///
    /// Walks whichever is smaller: the box's cell range or the occupied
    /// cells, so the cost never exceeds the size of the index.
    fn occupied_cells_for(&self, bounds: &Aabb) -> Vec<CellCoord> {
        let (lo, hi) = self.cell_range(bounds);
        let width = (i64::from(hi.x) - i64::from(lo.x) + 1) as u64;
        let height = (i64::from(hi.y) - i64::from(lo.y) + 1) as u64;
        if width.saturating_mul(height) <= self.cells.len() as u64 {
            return self
                .cells_for(bounds)
                .filter(|c| self.cells.contains_key(c))
                .collect();
        }
        let mut hits: Vec<CellCoord> = self
            .cells
            .keys()
            .copied()
            .filter(|c| (lo.x..=hi.x).contains(&c.x) && (lo.y..=hi.y).contains(&c.y))
            .collect();
        hits.sort_unstable_by_key(|c| (c.y, c.x));
        hits
    }

    // -- Insertion / removal --

    /// Index one item.
    pub fn insert(&mut self, key: K, placement: Placement) -> Result<(), SpatialError> {
        if self.placements.contains_key(key) {
            return Err(SpatialError::AlreadyIndexed);
        }
        let cells: Vec<CellCoord> = self.cells_for(&placement.bounds).collect();
        for cell in cells {
            self.cells.entry(cell).or_default().push(key);
        }
        log::trace!("indexed {key:?} at {:?}", placement.anchor);
        self.placements.insert(key, placement);
        Ok(())
    }

    /// Drop an item from the index. Absent keys are a no-op.
    pub fn remove(&mut self, key: K) -> Option<Placement> {
        let placement = self.placements.remove(key)?;
        let cells: Vec<CellCoord> = self.cells_for(&placement.bounds).collect();
        for cell in cells {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                bucket.retain(|k| *k != key);
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        log::trace!("unindexed {key:?}");
        Some(placement)
    }

    /// Index `key`, or its leaves if it is a container. All-or-nothing.
    pub fn recursive_insert<S>(&mut self, source: &S, key: K) -> Result<usize, SpatialError>
    where
        S: SpatialSource<K> + ?Sized,
    {
        let mut leaves = Vec::new();
        collect_leaves(source, key, &mut leaves);
        if leaves.iter().any(|(k, _)| self.placements.contains_key(*k)) {
            return Err(SpatialError::AlreadyIndexed);
        }
        let count = leaves.len();
        for (leaf, placement) in leaves {
            self.insert(leaf, placement)?;
        }
        Ok(count)
    }

    /// Remove `key`, or its leaves if it is a container.
    pub fn recursive_remove<S>(&mut self, source: &S, key: K) -> usize
    where
        S: SpatialSource<K> + ?Sized,
    {
        let mut leaves = Vec::new();
        collect_leaves(source, key, &mut leaves);
        leaves
            .into_iter()
            .filter(|(leaf, _)| self.remove(*leaf).is_some())
            .count()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.placements.clear();
    }

    // -- Lookup --

    pub fn get(&self, key: K) -> Option<&Placement> {
        self.placements.get(key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.placements.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn keys_in_cell(&self, cell: CellCoord) -> &[K] {
        self.cells.get(&cell).map(|b| b.as_slice()).unwrap_or(&[])
    }

    /// Indexed keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.placements.keys()
    }

    // -- Queries --

    /// Distinct keys from the cells a box touches, in discovery order.
    fn candidates(&self, bounds: &Aabb) -> Vec<K> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for cell in self.occupied_cells_for(bounds) {
            for &key in self.keys_in_cell(cell) {
                if seen.insert(key) {
                    out.push(key);
                }
            }
        }
        out
    }

    fn filtered<F>(&self, bounds: &Aabb, limit: Option<usize>, mut keep: F) -> Vec<K>
    where
        F: FnMut(&Placement) -> bool,
    {
        let limit = limit.unwrap_or(usize::MAX);
        self.candidates(bounds)
            .into_iter()
            .filter(|&k| self.placements.get(k).is_some_and(&mut keep))
            .take(limit)
            .collect()
    }

    /// Items whose footprint contains `p`.
    pub fn query_point(&self, p: Vector, limit: Option<usize>) -> Vec<K> {
        let window = Aabb::from_coords(
            p.x - CELL_EPSILON,
            p.y - CELL_EPSILON,
            p.x + CELL_EPSILON,
            p.y + CELL_EPSILON,
        );
        self.filtered(&window, limit, |pl| pl.contains_point(p))
    }

    /// Items whose footprint overlaps `area`.
    pub fn query_area(&self, area: &Aabb, limit: Option<usize>) -> Vec<K> {
        self.filtered(area, limit, |pl| pl.overlaps_area(area))
    }

    /// Items whose anchor lies within `radius` of `center`.
    pub fn query_radius(&self, center: Vector, radius: f64, limit: Option<usize>) -> Vec<K> {
        let square = Aabb::from_coords(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        );
        self.filtered(&square, limit, |pl| pl.anchor.distance(center) <= radius)
    }

    /// Indexed items that collide with `placement`.
    pub fn overlapping(&self, placement: &Placement) -> Vec<K> {
        self.filtered(&placement.bounds, None, |pl| pl.collides_with(placement))
    }

    /// Decide whether an incoming item merges into an occupant or is placed.
    ///
    /// With `merge` set, the first broad-phase occupant the policy accepts
    /// wins. Otherwise every colliding, non-exempt occupant is reported.
    pub fn resolve_overlap<P>(
        &self,
        candidate: &Placement,
        merge: bool,
        policy: &P,
    ) -> OverlapResolution<K>
    where
        P: OverlapPolicy<K> + ?Sized,
    {
        let mut conflicts = Vec::new();
        for occupant in self.candidates(&candidate.bounds) {
            if merge && policy.mergeable(occupant) {
                return OverlapResolution::Merge(occupant);
            }
            if policy.exempt(occupant) {
                continue;
            }
            if self
                .placements
                .get(occupant)
                .is_some_and(|pl| pl.collides_with(candidate))
            {
                conflicts.push(occupant);
            }
        }
        OverlapResolution::Place { conflicts }
    }
}

fn collect_leaves<K, S>(source: &S, key: K, out: &mut Vec<(K, Placement)>)
where
    K: Key,
    S: SpatialSource<K> + ?Sized,
{
    match source.children(key) {
        Some(children) => {
            for child in children {
                collect_leaves(source, child, out);
            }
        }
        None => {
            if let Some(placement) = source.placement(key) {
                out.push((key, placement));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use schematic_core::id::EntityKey;
    use slotmap::SlotMap;

    fn make_keys(count: usize) -> (SlotMap<EntityKey, ()>, Vec<EntityKey>) {
        let mut sm = SlotMap::with_key();
        let keys = (0..count).map(|_| sm.insert(())).collect();
        (sm, keys)
    }

    fn square(cx: f64, cy: f64, half: f64) -> Placement {
        Placement::new(
            Vector::new(cx, cy),
            CollisionSet::from_aabb(Aabb::from_coords(
                cx - half,
                cy - half,
                cx + half,
                cy + half,
            )),
            CollisionMask::object(),
        )
    }

    // -----------------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------------

    #[test]
    fn box_on_boundary_stays_in_one_cell() {
        let index: SpatialIndex<EntityKey> = SpatialIndex::new();
        let cells: Vec<_> = index
            .cells_for(&Aabb::from_coords(0.0, 0.0, 8.0, 8.0))
            .collect();
        assert_eq!(cells, vec![CellCoord::new(0, 0)]);
    }

    #[test]
    fn box_straddling_cells() {
        let index: SpatialIndex<EntityKey> = SpatialIndex::new();
        let cells: Vec<_> = index
            .cells_for(&Aabb::from_coords(-1.0, 7.0, 1.0, 9.0))
            .collect();
        assert_eq!(
            cells,
            vec![
                CellCoord::new(-1, 0),
                CellCoord::new(0, 0),
                CellCoord::new(-1, 1),
                CellCoord::new(0, 1),
            ]
        );
    }

    #[test]
    fn invalid_cell_size() {
        assert_eq!(
            SpatialIndex::<EntityKey>::with_cell_size(0.0).unwrap_err(),
            SpatialError::InvalidCellSize
        );
        assert!(SpatialIndex::<EntityKey>::with_cell_size(f64::NAN).is_err());
        assert_eq!(
            SpatialIndex::<EntityKey>::with_cell_size(2.0)
                .unwrap()
                .cell_size(),
            2.0
        );
    }

    // -----------------------------------------------------------------------
    // Insert / remove
    // -----------------------------------------------------------------------

    #[test]
    fn insert_and_remove() {
        let (_sm, keys) = make_keys(2);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(0.5, 0.5, 0.4)).unwrap();
        index.insert(keys[1], square(20.5, 0.5, 0.4)).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.cell_count(), 2);

        assert!(index.remove(keys[0]).is_some());
        assert_eq!(index.len(), 1);
        assert_eq!(index.cell_count(), 1);
        assert!(index.query_point(Vector::new(0.5, 0.5), None).is_empty());
    }

    #[test]
    fn double_insert_fails() {
        let (_sm, keys) = make_keys(1);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(0.0, 0.0, 0.4)).unwrap();
        assert_eq!(
            index.insert(keys[0], square(3.0, 0.0, 0.4)),
            Err(SpatialError::AlreadyIndexed)
        );
    }

    #[test]
    fn remove_absent_is_noop() {
        let (_sm, keys) = make_keys(1);
        let mut index: SpatialIndex<EntityKey> = SpatialIndex::new();
        assert!(index.remove(keys[0]).is_none());
        assert!(index.is_empty());
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn point_query_uses_narrow_phase() {
        let (_sm, keys) = make_keys(1);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(4.0, 4.0, 0.5)).unwrap();
        // Same cell, outside the footprint.
        assert!(index.query_point(Vector::new(1.0, 1.0), None).is_empty());
        assert_eq!(index.query_point(Vector::new(4.2, 3.9), None), vec![keys[0]]);
    }

    #[test]
    fn point_on_cell_boundary_finds_item() {
        let (_sm, keys) = make_keys(1);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(4.0, 4.0, 4.0)).unwrap();
        assert_eq!(index.query_point(Vector::new(8.0, 8.0), None), vec![keys[0]]);
    }

    #[test]
    fn area_query_dedups_multi_cell_items() {
        let (_sm, keys) = make_keys(2);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(8.0, 8.0, 3.0)).unwrap();
        index.insert(keys[1], square(30.0, 30.0, 0.5)).unwrap();
        let found = index.query_area(&Aabb::from_coords(0.0, 0.0, 16.0, 16.0), None);
        assert_eq!(found, vec![keys[0]]);
    }

    #[test]
    fn radius_query_tests_anchor() {
        let (_sm, keys) = make_keys(3);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(0.0, 0.0, 0.5)).unwrap();
        index.insert(keys[1], square(3.0, 4.0, 0.5)).unwrap();
        index.insert(keys[2], square(4.0, 4.0, 0.5)).unwrap();
        let mut found = index.query_radius(Vector::ZERO, 5.0, None);
        found.sort();
        let mut expected = vec![keys[0], keys[1]];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn limit_applies_after_filter() {
        let (_sm, keys) = make_keys(4);
        let mut index = SpatialIndex::new();
        for (i, k) in keys.iter().enumerate() {
            index.insert(*k, square(i as f64, 0.0, 0.4)).unwrap();
        }
        let all = index.query_area(&Aabb::from_coords(-1.0, -1.0, 10.0, 1.0), None);
        assert_eq!(all.len(), 4);
        let two = index.query_area(&Aabb::from_coords(-1.0, -1.0, 10.0, 1.0), Some(2));
        assert_eq!(two, all[..2].to_vec());
    }

    #[test]
    fn huge_query_over_sparse_index() {
        let (_sm, keys) = make_keys(1);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(2.5, 2.5, 0.5)).unwrap();
        let everywhere = Aabb::from_coords(-1.0e9, -1.0e9, 1.0e9, 1.0e9);
        assert_eq!(index.query_area(&everywhere, None), vec![keys[0]]);
        assert_eq!(index.query_radius(Vector::ZERO, 1.0e9, None), vec![keys[0]]);
        let elsewhere = Aabb::from_coords(5.0e8, 5.0e8, 1.0e9, 1.0e9);
        assert!(index.query_area(&elsewhere, None).is_empty());
        assert!(index.query_radius(Vector::new(1.0e9, 0.0), 5.0e8, None).is_empty());
    }

    #[test]
    fn sparse_scan_keeps_row_major_order() {
        let (_sm, keys) = make_keys(3);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(100.0, 50.0, 0.5)).unwrap();
        index.insert(keys[1], square(4.0, 50.0, 0.5)).unwrap();
        index.insert(keys[2], square(4.0, 4.0, 0.5)).unwrap();
        let everywhere = Aabb::from_coords(-1.0e7, -1.0e7, 1.0e7, 1.0e7);
        assert_eq!(
            index.query_area(&everywhere, None),
            vec![keys[2], keys[1], keys[0]]
        );
        assert_eq!(index.query_area(&everywhere, Some(1)), vec![keys[2]]);
    }

    // -----------------------------------------------------------------------
    // Recursive indexing
    // -----------------------------------------------------------------------

    struct Tree {
        parent: EntityKey,
        leaves: Vec<(EntityKey, Placement)>,
    }

    impl SpatialSource<EntityKey> for Tree {
        fn children(&self, key: EntityKey) -> Option<Vec<EntityKey>> {
            (key == self.parent).then(|| self.leaves.iter().map(|(k, _)| *k).collect())
        }

        fn placement(&self, key: EntityKey) -> Option<Placement> {
            self.leaves
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, p)| p.clone())
        }
    }

    #[test]
    fn recursive_insert_indexes_leaves_only() {
        let (_sm, keys) = make_keys(3);
        let tree = Tree {
            parent: keys[0],
            leaves: vec![
                (keys[1], square(0.0, 0.0, 0.4)),
                (keys[2], square(2.0, 0.0, 0.4)),
            ],
        };
        let mut index = SpatialIndex::new();
        assert_eq!(index.recursive_insert(&tree, keys[0]).unwrap(), 2);
        assert!(!index.contains(keys[0]));
        assert!(index.contains(keys[1]) && index.contains(keys[2]));

        assert_eq!(index.recursive_remove(&tree, keys[0]), 2);
        assert!(index.is_empty());
    }

    #[test]
    fn recursive_insert_is_all_or_nothing() {
        let (_sm, keys) = make_keys(3);
        let tree = Tree {
            parent: keys[0],
            leaves: vec![
                (keys[1], square(0.0, 0.0, 0.4)),
                (keys[2], square(2.0, 0.0, 0.4)),
            ],
        };
        let mut index = SpatialIndex::new();
        index.insert(keys[2], square(2.0, 0.0, 0.4)).unwrap();
        assert!(index.recursive_insert(&tree, keys[0]).is_err());
        assert!(!index.contains(keys[1]));
        assert_eq!(index.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Overlap resolution
    // -----------------------------------------------------------------------

    struct MergeInto(Option<EntityKey>);

    impl OverlapPolicy<EntityKey> for MergeInto {
        fn mergeable(&self, occupant: EntityKey) -> bool {
            self.0 == Some(occupant)
        }
    }

    #[test]
    fn conflicts_reported_without_merge() {
        let (_sm, keys) = make_keys(2);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(0.0, 0.0, 0.4)).unwrap();
        index.insert(keys[1], square(5.0, 0.0, 0.4)).unwrap();
        let res = index.resolve_overlap(&square(0.2, 0.0, 0.4), false, &MergeInto(Some(keys[0])));
        assert_eq!(
            res,
            OverlapResolution::Place {
                conflicts: vec![keys[0]]
            }
        );
    }

    #[test]
    fn merge_when_policy_accepts() {
        let (_sm, keys) = make_keys(1);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(0.0, 0.0, 0.4)).unwrap();
        let res = index.resolve_overlap(&square(0.0, 0.0, 0.4), true, &MergeInto(Some(keys[0])));
        assert_eq!(res, OverlapResolution::Merge(keys[0]));
        let res = index.resolve_overlap(&square(0.0, 0.0, 0.4), true, &MergeInto(None));
        assert!(matches!(res, OverlapResolution::Place { conflicts } if conflicts.len() == 1));
    }

    #[test]
    fn disjoint_masks_do_not_conflict() {
        let (_sm, keys) = make_keys(1);
        let mut index = SpatialIndex::new();
        index.insert(keys[0], square(0.0, 0.0, 0.4)).unwrap();
        let mut ghost = square(0.0, 0.0, 0.4);
        ghost.mask = CollisionMask::new(["train-layer"]);
        let res = index.resolve_overlap(&ghost, false, &MergeInto(None));
        assert_eq!(res, OverlapResolution::Place { conflicts: vec![] });
    }

    // -----------------------------------------------------------------------
    // Property: grid queries agree with brute force
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn queries_match_brute_force(
            items in prop::collection::vec((-40.0f64..40.0, -40.0f64..40.0, 0.1f64..3.0), 1..40),
            removed in prop::collection::vec(any::<bool>(), 40),
            point in (-40.0f64..40.0, -40.0f64..40.0),
            radius in 0.0f64..12.0,
        ) {
            let (_sm, keys) = make_keys(items.len());
            let mut index = SpatialIndex::with_cell_size(4.0).unwrap();
            let mut live = Vec::new();
            for (i, (x, y, half)) in items.iter().enumerate() {
                let placement = square(*x, *y, *half);
                index.insert(keys[i], placement.clone()).unwrap();
                live.push((keys[i], placement));
            }
            for (i, gone) in removed.iter().take(items.len()).enumerate() {
                if *gone {
                    index.remove(keys[i]);
                    live.retain(|(k, _)| *k != keys[i]);
                }
            }

            let p = Vector::new(point.0, point.1);
            let mut got = index.query_point(p, None);
            let mut want: Vec<_> = live.iter().filter(|(_, pl)| pl.contains_point(p)).map(|(k, _)| *k).collect();
            got.sort();
            want.sort();
            prop_assert_eq!(got, want);

            let area = Aabb::from_coords(p.x - radius, p.y - radius, p.x + radius, p.y + radius);
            let mut got = index.query_area(&area, None);
            let mut want: Vec<_> = live.iter().filter(|(_, pl)| pl.overlaps_area(&area)).map(|(k, _)| *k).collect();
            got.sort();
            want.sort();
            prop_assert_eq!(got, want);

            let mut got = index.query_radius(p, radius, None);
            let mut want: Vec<_> = live.iter().filter(|(_, pl)| pl.anchor.distance(p) <= radius).map(|(k, _)| *k).collect();
            got.sort();
            want.sort();
            prop_assert_eq!(got, want);
        }
    }
}
