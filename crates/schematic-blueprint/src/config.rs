//! Collection configuration.

use schematic_spatial::DEFAULT_CELL_SIZE;

/// Policy for kinds the catalog does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Unknown kinds are an error.
    #[default]
    Strict,
    /// Unknown kinds produce a warning and a 1x1 placeholder.
    Permissive,
}

/// Settings shared by entity and tile collections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionConfig {
    /// Edge length of a spatial-index cell, in tiles.
    pub cell_size: f64,
    pub mode: ValidationMode,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            mode: ValidationMode::Strict,
        }
    }
}

impl CollectionConfig {
    pub fn permissive() -> Self {
        Self {
            mode: ValidationMode::Permissive,
            ..Self::default()
        }
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = cell_size;
        self
    }
}

/// Largest extent a collection may cover, in tiles, along either axis.
pub const MAX_EXTENT: u32 = 10_000;
