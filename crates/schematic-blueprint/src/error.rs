//! Error types, one enum per concern.
//!
//! Every variant here is fatal: the operation that returns it has not
//! changed any state. Recoverable conditions are reported as
//! [`schematic_core::warning::Warning`] values instead.

use schematic_core::catalog::FieldError;
use schematic_core::direction::{InvalidDirection, InvalidOrientation};
use schematic_spatial::SpatialError;

/// Errors from constructing or mutating a single entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error("entity is attached to a collection; remove it before changing its placement")]
    AttachedImmutable,
    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),
    #[error("'{kind}' does not support {what}")]
    Unsupported { kind: String, what: &'static str },
    #[error("position ({x}, {y}) is not finite")]
    NonFinitePosition { x: f64, y: f64 },
    #[error(transparent)]
    Direction(#[from] InvalidDirection),
    #[error(transparent)]
    Orientation(#[from] InvalidOrientation),
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Errors from collection mutation and wiring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectionError {
    #[error("duplicate id '{0}'")]
    DuplicateId(String),
    #[error("index {index} out of range for collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no entity with id '{0}'")]
    IdNotFound(String),
    #[error("entity is not a member of this collection")]
    NotInCollection,
    #[error("'{0}' is not a group")]
    NotAGroup(String),
    #[error("invalid wire color '{0}': expected 'red' or 'green'")]
    InvalidWireColor(String),
    #[error("invalid connection side {0}: expected 1 or 2")]
    InvalidSide(u8),
    #[error("'{0}' cannot be connected with circuit wire")]
    NotCircuitConnectable(String),
    #[error("'{0}' cannot be connected with copper wire")]
    NotPowerConnectable(String),
    #[error("cannot connect '{a}' and '{b}' directly: both are power switches")]
    DualPowerConnection { a: String, b: String },
    #[error("cannot connect an entity to itself on the same side")]
    SelfConnection,
    #[error("collection would span {width}x{height} tiles (limit 10000x10000)")]
    SizeLimit { width: u32, height: u32 },
    #[error("unknown tile kind '{0}'")]
    UnknownTile(String),
    #[error("'{0}' is not a locomotive")]
    NotLocomotive(String),
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

/// Errors from converting to or from the document form.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DocumentError {
    #[error("{entity} references a removed entity in '{field}'")]
    DanglingReference { entity: String, field: &'static str },
    #[error("reference to unknown entity_number {0}")]
    UnknownEntityNumber(u64),
    #[error("entity_number {0} appears more than once")]
    DuplicateEntityNumber(u64),
    #[error("invalid icon: {0}")]
    InvalidIcon(String),
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Errors from the blueprint-string codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("blueprint string is empty")]
    Empty,
    #[error("unsupported blueprint string version '{0}'")]
    UnsupportedVersion(char),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("compression: {0}")]
    Compression(#[from] std::io::Error),
    #[error("utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Umbrella error for the public blueprint API.
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
