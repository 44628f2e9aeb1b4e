//! Schematic Core -- shared vocabulary for factory blueprints.
//!
//! This crate holds the pieces every other schematic crate builds on:
//! planar geometry and collision footprints, directions, the prototype
//! catalog, arena keys, version stamps and non-fatal diagnostics.
//!
//! # Key Types
//!
//! - [`geometry::Vector`] / [`geometry::Aabb`] -- World-space points and boxes.
//! - [`geometry::CollisionSet`] -- Footprint made of boxes and rotated
//!   rectangles, with a separating-axis narrow phase.
//! - [`direction::Direction`] -- Sixteen-way facing; [`direction::Orientation`]
//!   for rolling stock.
//! - [`catalog::Catalog`] -- Read-only prototype lookup, with a bundled
//!   [`catalog::vanilla`] table and a data-file loader behind `data-loader`.
//! - [`id::EntityKey`] / [`id::TileKey`] -- Generational arena keys.
//! - [`warning::Diagnostics`] -- Warning sink mirrored to the `log` facade.

pub mod catalog;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod direction;
pub mod geometry;
pub mod id;
pub mod version;
pub mod warning;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use catalog::{Catalog, Prototype};
pub use direction::{Direction, Orientation};
pub use geometry::{Aabb, TilePosition, Vector};
pub use id::{EntityKey, TileKey, mint};
pub use warning::{Diagnostics, Warning};
