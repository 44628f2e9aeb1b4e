//! Data-driven catalog loading from RON, TOML, or JSON.
//!
//! Feature-gated behind `data-loader`. The format of a file is detected from
//! its extension; in-memory text is loaded with an explicit [`Format`].
//! Loading produces a [`CatalogBuilder`] so callers can register further
//! prototypes (or mutate loaded ones) before freezing the catalog.

use crate::catalog::{
    Capabilities, CatalogBuilder, CatalogError, DEFAULT_CIRCUIT_WIRE_DISTANCE, Prototype,
};
use crate::geometry::{Aabb, CollisionMask};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    #[error("parse error in {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    #[error("prototype '{name}' has an empty collision box")]
    EmptyCollisionBox { name: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Data structures
// ===========================================================================

/// Top-level catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub entities: Vec<PrototypeData>,
    #[serde(default)]
    pub tiles: Vec<String>,
}

/// One entity kind as written in a data file.
#[derive(Debug, Deserialize)]
pub struct PrototypeData {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// `[[x1, y1], [x2, y2]]`, north-facing and centered on the origin.
    pub collision_box: [[f64; 2]; 2],
    #[serde(default)]
    pub collision_mask: Option<Vec<String>>,
    #[serde(default)]
    pub tile_width: Option<u32>,
    #[serde(default)]
    pub tile_height: Option<u32>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub circuit_wire_max_distance: Option<f64>,
    #[serde(default)]
    pub maximum_wire_distance: Option<f64>,
    #[serde(default)]
    pub inventory_size: Option<u32>,
    #[serde(default)]
    pub default_fields: Map<String, Value>,
}

impl PrototypeData {
    fn into_prototype(self) -> Result<Prototype, DataLoadError> {
        let [[x1, y1], [x2, y2]] = self.collision_box;
        let collision_box = Aabb::from_coords(x1, y1, x2, y2);
        if collision_box.width() <= 0.0 || collision_box.height() <= 0.0 {
            return Err(DataLoadError::EmptyCollisionBox { name: self.name });
        }

        let mut prototype = Prototype::new(&self.name, &self.type_name, collision_box)
            .with_capabilities(self.capabilities);
        if let Some(mask) = self.collision_mask {
            prototype = prototype.with_mask(CollisionMask::new(mask));
        }
        let width = self.tile_width.unwrap_or(prototype.tile_width);
        let height = self.tile_height.unwrap_or(prototype.tile_height);
        prototype = prototype.with_tile_size(width, height);
        if let Some(reach) = self.maximum_wire_distance {
            prototype = prototype.with_wire_reach(reach);
        }
        prototype.circuit_wire_max_distance = self
            .circuit_wire_max_distance
            .or(self.maximum_wire_distance)
            .unwrap_or(DEFAULT_CIRCUIT_WIRE_DISTANCE);
        prototype.inventory_size = self.inventory_size;
        prototype.default_fields.extend(self.default_fields);
        Ok(prototype)
    }
}

// ===========================================================================
// Loading functions
// ===========================================================================

/// Parse catalog text in the given format.
pub fn parse_catalog(text: &str, format: Format) -> Result<CatalogData, DataLoadError> {
    parse_named(text, format, "<memory>")
}

fn parse_named(text: &str, format: Format, source_name: &str) -> Result<CatalogData, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        source_name: source_name.to_string(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(text).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
    }
}

/// Load a catalog from text in the given format.
pub fn load_catalog_str(text: &str, format: Format) -> Result<CatalogBuilder, DataLoadError> {
    build_catalog(parse_catalog(text, format)?)
}

/// Load a catalog file, detecting its format from the extension.
pub fn load_catalog_file(path: &Path) -> Result<CatalogBuilder, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let data = parse_named(&content, format, &path.display().to_string())?;
    build_catalog(data)
}

/// Register parsed data onto an existing builder.
pub fn extend_catalog(builder: &mut CatalogBuilder, data: CatalogData) -> Result<(), DataLoadError> {
    for entity in data.entities {
        builder.register(entity.into_prototype()?)?;
    }
    for tile in &data.tiles {
        builder.register_tile(tile)?;
    }
    log::debug!("catalog now holds {} prototypes", builder.len());
    Ok(())
}

fn build_catalog(data: CatalogData) -> Result<CatalogBuilder, DataLoadError> {
    let mut builder = CatalogBuilder::new();
    extend_catalog(&mut builder, data)?;
    Ok(builder)
}
