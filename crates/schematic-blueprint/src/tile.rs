//! Ground tiles.
//!
//! Tiles are 1x1, immovable and carry no wires, so [`TileCollection`] is a
//! flat ordered list over a sparse map with the same spatial index and extent
//! limit as the entity collection.

use crate::collection::Placed;
use crate::config::{CollectionConfig, MAX_EXTENT, ValidationMode};
use crate::error::CollectionError;
use schematic_core::catalog::Catalog;
use schematic_core::geometry::{Aabb, CollisionMask, CollisionSet, TilePosition, Vector};
use schematic_core::id::{TileKey, mint};
use schematic_core::warning::{Diagnostics, Warning};
use schematic_spatial::{Placement, SpatialIndex};
use slotmap::SparseSecondaryMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tile {
    pub kind: String,
    pub position: TilePosition,
}

impl Tile {
    pub fn new(kind: &str, x: i32, y: i32) -> Self {
        Self {
            kind: kind.to_string(),
            position: TilePosition::new(x, y),
        }
    }

    /// The unit square covered by the tile.
    pub fn footprint(&self) -> Aabb {
        let x = self.position.x as f64;
        let y = self.position.y as f64;
        Aabb::from_coords(x, y, x + 1.0, y + 1.0)
    }

    pub fn center(&self) -> Vector {
        Vector::from(self.position) + Vector::new(0.5, 0.5)
    }

    fn placement(&self) -> Placement {
        Placement::new(
            self.center(),
            CollisionSet::from_aabb(self.footprint()),
            CollisionMask::new(["ground-tile"]),
        )
    }
}

/// Ordered tiles with at most one tile per grid position.
#[derive(Debug, Clone)]
pub struct TileCollection {
    catalog: Arc<dyn Catalog>,
    config: CollectionConfig,
    tiles: SparseSecondaryMap<TileKey, Tile>,
    order: Vec<TileKey>,
    by_position: HashMap<TilePosition, TileKey>,
    spatial: SpatialIndex<TileKey>,
    bounds: Option<Aabb>,
    diagnostics: Diagnostics,
}

impl TileCollection {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            config: CollectionConfig::default(),
            tiles: SparseSecondaryMap::new(),
            order: Vec::new(),
            by_position: HashMap::new(),
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

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, key: TileKey) -> Option<&Tile> {
        self.tiles.get(key)
    }

    pub fn at(&self, index: usize) -> Option<&Tile> {
        self.order.get(index).and_then(|k| self.tiles.get(*k))
    }

    pub fn key_at(&self, index: usize) -> Option<TileKey> {
        self.order.get(index).copied()
    }

    /// The tile occupying `position`, if any.
    pub fn tile_at(&self, position: TilePosition) -> Option<&Tile> {
        self.by_position.get(&position).and_then(|k| self.tiles.get(*k))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.order.iter().filter_map(|k| self.tiles.get(*k))
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn warnings(&self) -> &[Warning] {
        self.diagnostics.warnings()
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.diagnostics.take()
    }

    fn check_kind(&self, kind: &str) -> Result<Option<Warning>, CollectionError> {
        if self.catalog.has_tile(kind) {
            return Ok(None);
        }
        match self.config.mode {
            ValidationMode::Strict => Err(CollectionError::UnknownTile(kind.to_string())),
            ValidationMode::Permissive => Ok(Some(Warning::UnknownTile {
                kind: kind.to_string(),
            })),
        }
    }

    /// Insert `tile` at `index`. A tile already at the same grid position
    /// either takes the new kind (`merge`) or is reported as an overlap.
    pub fn insert(&mut self, index: usize, tile: Tile, merge: bool) -> Result<Placed<TileKey>, CollectionError> {
        if index > self.order.len() {
            return Err(CollectionError::IndexOutOfRange {
                index,
                len: self.order.len(),
            });
        }
        let unknown = self.check_kind(&tile.kind)?;
        let occupant = self.by_position.get(&tile.position).copied();

        if merge && let Some(existing) = occupant {
            if let Some(t) = self.tiles.get_mut(existing) {
                t.kind = tile.kind;
            }
            self.diagnostics.extend(unknown);
            return Ok(Placed::Merged(existing));
        }

        let placement = tile.placement();
        let new_bounds = Aabb::merge(self.bounds, Some(placement.bounds));
        if let Some(b) = new_bounds {
            let (width, height) = b.tile_dimensions();
            if width > MAX_EXTENT || height > MAX_EXTENT {
                return Err(CollectionError::SizeLimit { width, height });
            }
        }

        let overlap = occupant.and_then(|k| self.tiles.get(k)).map(|other| Warning::Overlap {
            entity: tile.kind.clone(),
            other: other.kind.clone(),
            position: tile.center(),
        });
        let position = tile.position;
        let key: TileKey = mint();
        self.tiles.insert(key, tile);
        self.spatial.insert(key, placement)?;
        self.order.insert(index, key);
        // The newest tile at a position shadows older ones.
        self.by_position.insert(position, key);
        self.bounds = new_bounds;
        self.diagnostics.extend(unknown);
        self.diagnostics.extend(overlap);
        log::trace!("placed tile at ({}, {})", position.x, position.y);
        Ok(Placed::Inserted(key))
    }

    pub fn append(&mut self, tile: Tile) -> Result<Placed<TileKey>, CollectionError> {
        self.insert(self.order.len(), tile, false)
    }

    pub fn append_merge(&mut self, tile: Tile) -> Result<Placed<TileKey>, CollectionError> {
        self.insert(self.order.len(), tile, true)
    }

    pub fn remove(&mut self, index: usize) -> Result<Tile, CollectionError> {
        if index >= self.order.len() {
            return Err(CollectionError::IndexOutOfRange {
                index,
                len: self.order.len(),
            });
        }
        let key = self.order.remove(index);
        self.spatial.remove(key);
        let tile = self
            .tiles
            .remove(key)
            .ok_or(CollectionError::NotInCollection)?;
        if self.by_position.get(&tile.position) == Some(&key) {
            self.by_position.remove(&tile.position);
            // Uncover a shadowed tile at the same position, if any.
            let center = tile.center();
            if let Some(&below) = self.spatial.query_point(center, None).last() {
                self.by_position.insert(tile.position, below);
            }
        }
        self.bounds = self
            .spatial
            .keys()
            .filter_map(|k| self.spatial.get(k))
            .map(|p| p.bounds)
            .reduce(|a, b| a.union(&b));
        Ok(tile)
    }

    /// Remove whichever tile is visible at `position`.
    pub fn remove_at(&mut self, position: TilePosition) -> Result<Tile, CollectionError> {
        let key = self
            .by_position
            .get(&position)
            .copied()
            .ok_or(CollectionError::NotInCollection)?;
        let index = self
            .order
            .iter()
            .position(|k| *k == key)
            .ok_or(CollectionError::NotInCollection)?;
        self.remove(index)
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.order.clear();
        self.by_position.clear();
        self.spatial.clear();
        self.bounds = None;
    }

    pub fn find_at(&self, point: Vector) -> Vec<TileKey> {
        self.spatial.query_point(point, None)
    }

    pub fn find_in_area(&self, area: &Aabb) -> Vec<TileKey> {
        self.spatial.query_area(area, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schematic_core::test_utils::toy_catalog;

    fn tiles() -> TileCollection {
        TileCollection::new(toy_catalog())
    }

    #[test]
    fn append_indexes_tile() {
        let mut t = tiles();
        let key = t.append(Tile::new("floor", 2, 3)).unwrap().key();
        assert_eq!(t.len(), 1);
        assert_eq!(t.find_at(Vector::new(2.5, 3.5)), vec![key]);
        assert!(t.find_at(Vector::new(1.5, 3.5)).is_empty());
        assert_eq!(t.bounds(), Some(Aabb::from_coords(2.0, 3.0, 3.0, 4.0)));
    }

    #[test]
    fn neighbours_do_not_overlap() {
        let mut t = tiles();
        for x in 0..4 {
            t.append(Tile::new("floor", x, 0)).unwrap();
        }
        assert!(t.warnings().is_empty());
        assert_eq!(t.find_in_area(&Aabb::from_coords(0.2, 0.2, 2.8, 0.8)).len(), 3);
    }

    #[test]
    fn same_position_merges_or_warns() {
        let mut t = tiles();
        let first = t.append(Tile::new("floor", 0, 0)).unwrap().key();
        assert_eq!(t.append_merge(Tile::new("floor", 0, 0)).unwrap(), Placed::Merged(first));
        assert_eq!(t.len(), 1);

        t.append(Tile::new("floor", 0, 0)).unwrap();
        assert_eq!(t.len(), 2);
        assert!(matches!(t.take_warnings().as_slice(), [Warning::Overlap { .. }]));
    }

    #[test]
    fn unknown_tile_policy() {
        let mut strict = tiles();
        assert_eq!(
            strict.append(Tile::new("lava", 0, 0)).unwrap_err(),
            CollectionError::UnknownTile("lava".into())
        );
        assert!(strict.is_empty());

        let mut permissive =
            TileCollection::with_config(toy_catalog(), CollectionConfig::permissive()).unwrap();
        permissive.append(Tile::new("lava", 0, 0)).unwrap();
        assert!(matches!(permissive.warnings(), [Warning::UnknownTile { .. }]));
    }

    #[test]
    fn size_limit_is_atomic() {
        let mut t = tiles();
        t.append(Tile::new("floor", 0, 0)).unwrap();
        let err = t.append(Tile::new("floor", 10_000, 0)).unwrap_err();
        assert_eq!(
            err,
            CollectionError::SizeLimit {
                width: 10_001,
                height: 1
            }
        );
        assert_eq!(t.len(), 1);
        assert_eq!(t.find_at(Vector::new(10_000.5, 0.5)), vec![]);
        // Exactly at the limit is fine.
        t.append(Tile::new("floor", 9_999, 0)).unwrap();
    }

    #[test]
    fn remove_recomputes_bounds() {
        let mut t = tiles();
        t.append(Tile::new("floor", 0, 0)).unwrap();
        t.append(Tile::new("floor", 9, 9)).unwrap();
        let removed = t.remove_at(TilePosition::new(9, 9)).unwrap();
        assert_eq!(removed.position, TilePosition::new(9, 9));
        assert_eq!(t.bounds(), Some(Aabb::from_coords(0.0, 0.0, 1.0, 1.0)));
        assert!(t.tile_at(TilePosition::new(9, 9)).is_none());
        assert!(matches!(t.remove(3), Err(CollectionError::IndexOutOfRange { .. })));
    }

    #[test]
    fn removing_top_tile_uncovers_shadowed_one() {
        let mut t = tiles();
        t.append(Tile::new("floor", 1, 1)).unwrap();
        t.append(Tile::new("floor", 1, 1)).unwrap();
        t.remove(1).unwrap();
        assert!(t.tile_at(TilePosition::new(1, 1)).is_some());
        t.remove_at(TilePosition::new(1, 1)).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn keys_do_not_cross_collections() {
        let mut a = tiles();
        let mut b = tiles();
        let mine = a.append(Tile::new("floor", 0, 0)).unwrap().key();
        let theirs = b.append(Tile::new("floor", 5, 5)).unwrap().key();
        assert_ne!(mine, theirs);
        assert!(a.get(theirs).is_none());
        assert!(b.get(mine).is_none());
        assert_eq!(b.get(theirs).unwrap().position, TilePosition::new(5, 5));
    }
}
