//! Schematic Blueprint -- entity collections, wiring and serialization.
//!
//! A [`blueprint::Blueprint`] owns one [`collection::EntityCollection`],
//! one [`tile::TileCollection`], metadata and train schedules. Entities
//! reference each other (wires, power links, schedule locomotives) through
//! [`association::Association`], a generational key that stops resolving
//! once its target is removed.
//!
//! # Mutation Protocol
//!
//! Every collection mutation validates first and commits second. An `Err`
//! means nothing changed; a [`schematic_core::Warning`] means the change
//! went through with something worth reporting.
//!
//! ```rust,ignore
//! let mut bp = Blueprint::new(vanilla());
//! let a = bp.entities.append_spec(EntitySpec::new("small-electric-pole"))?.key();
//! let b = bp.entities.append_spec(EntitySpec::new("small-electric-pole").tile_position(6, 0))?.key();
//! bp.entities.connect_power(a, b, 1)?;
//! let text = bp.to_blueprint_string()?;
//! ```
//!
//! # Key Types
//!
//! - [`entity::EntityNode`] -- One placed entity or group.
//! - [`entity::EntitySpec`] -- Construction request resolved against a catalog.
//! - [`collection::EntityCollection`] -- Ordered, id-indexed, spatially
//!   indexed entities, plus wiring operations.
//! - [`tree::EntityTree`] -- Ordered key list with an id overlay.
//! - [`document::BlueprintDocument`] -- Plain interchange form.
//! - [`codec`] -- Blueprint string encoding.

pub mod association;
pub mod blueprint;
pub mod codec;
pub mod collection;
pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod schedule;
pub mod tile;
pub mod tree;
pub mod wiring;

pub use association::Association;
pub use blueprint::Blueprint;
pub use collection::{EntityCollection, EntityFilter, EntityRef, Placed, Region};
pub use config::{CollectionConfig, ValidationMode};
pub use entity::{EntityNode, EntitySpec, WireColor};
pub use error::{BlueprintError, CodecError, CollectionError, DocumentError, EntityError};
pub use tile::{Tile, TileCollection};
