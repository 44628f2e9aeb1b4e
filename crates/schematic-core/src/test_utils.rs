//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::catalog::{Capabilities, Catalog, CatalogBuilder, EntityCatalog, Prototype};
use crate::geometry::Aabb;
use std::sync::Arc;

// ===========================================================================
// Catalogs
// ===========================================================================

/// A catalog that knows no kinds and no tiles.
#[derive(Debug, Default)]
pub struct EmptyCatalog;

impl Catalog for EmptyCatalog {
    fn entity(&self, _name: &str) -> Option<Arc<Prototype>> {
        None
    }

    fn has_tile(&self, _name: &str) -> bool {
        false
    }
}

/// A small catalog with one kind per footprint size, for tests that should
/// not depend on the bundled data.
pub fn toy_catalog() -> Arc<EntityCatalog> {
    let mut b = CatalogBuilder::new();
    let prototypes = [
        Prototype::new("pole", "electric-pole", Aabb::centered(0.3, 0.3))
            .with_capabilities(Capabilities::pole())
            .with_wire_reach(8.0),
        Prototype::new("box", "container", Aabb::centered(0.7, 0.7))
            .with_capabilities(Capabilities::circuit())
            .with_inventory(16),
        Prototype::new("big-box", "container", Aabb::centered(1.4, 1.4)),
        Prototype::new("long-box", "assembling-machine", Aabb::centered(0.7, 1.4))
            .with_capabilities(Capabilities::NONE.directional()),
    ];
    for p in prototypes {
        b.register(p).unwrap();
    }
    b.register_tile("floor").unwrap();
    Arc::new(b.build())
}

// ===========================================================================
// Float comparison
// ===========================================================================

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toy_catalog_contents() {
        let catalog = toy_catalog();
        assert_eq!(catalog.entity_count(), 4);
        let long = catalog.entity("long-box").unwrap();
        assert_eq!((long.tile_width, long.tile_height), (1, 2));
        assert!(EmptyCatalog.entity("pole").is_none());
    }
}
