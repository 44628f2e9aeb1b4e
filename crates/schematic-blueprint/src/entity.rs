//! Placed entities.
//!
//! An [`EntityNode`] is one placed object: a shared [`Prototype`], a
//! position, an optional facing, free-form fields and its wire endpoints.
//! A group is an `EntityNode` whose prototype is the group prototype and
//! which carries member nodes. Members are positioned relative to their
//! group.
//!
//! A node is either detached (owned by the caller) or attached (owned by
//! the arena of an [`EntityCollection`](crate::collection::EntityCollection)).
//! Placement-affecting setters fail on attached nodes: moving an entity
//! means removing and reinserting it.

use crate::association::Association;
use crate::config::ValidationMode;
use crate::error::{CollectionError, EntityError};
use crate::tree::EntityTree;
use schematic_core::catalog::{Capabilities, Catalog, EntityCategory, Prototype};
use schematic_core::direction::{Direction, Orientation};
use schematic_core::geometry::{CollisionSet, TilePosition, Vector};
use schematic_core::id::EntityKey;
use schematic_core::warning::{Diagnostics, Warning};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// Wire endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireColor {
    Red,
    Green,
}

impl WireColor {
    pub fn as_str(self) -> &'static str {
        match self {
            WireColor::Red => "red",
            WireColor::Green => "green",
        }
    }
}

impl FromStr for WireColor {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(WireColor::Red),
            "green" => Ok(WireColor::Green),
            other => Err(CollectionError::InvalidWireColor(other.to_string())),
        }
    }
}

/// One end of a circuit wire, stored on the entity at `side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CircuitLink {
    pub color: WireColor,
    pub side: u8,
    pub target: Association,
    pub target_side: u8,
}

/// One end of a copper wire to or from a power switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopperLink {
    pub side: u8,
    pub target: Association,
    pub target_side: u8,
}

// ---------------------------------------------------------------------------
// EntityNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attachment {
    pub key: EntityKey,
    pub parent: Option<EntityKey>,
}

#[derive(Debug, Clone)]
pub(crate) enum Members {
    Detached(Vec<EntityNode>),
    Attached(EntityTree),
}

/// A placed object.
#[derive(Debug, Clone)]
pub struct EntityNode {
    id: Option<String>,
    prototype: Arc<Prototype>,
    /// Relative to the parent group, or world space at top level.
    position: Vector,
    direction: Direction,
    orientation: Option<Orientation>,
    fields: Map<String, Value>,
    pub(crate) circuit: Vec<CircuitLink>,
    pub(crate) neighbours: Vec<Association>,
    pub(crate) copper: Vec<CopperLink>,
    pub(crate) members: Option<Members>,
    pub(crate) attachment: Option<Attachment>,
}

fn group_prototype() -> Arc<Prototype> {
    static GROUP: OnceLock<Arc<Prototype>> = OnceLock::new();
    GROUP.get_or_init(|| Arc::new(Prototype::group())).clone()
}

impl EntityNode {
    /// A detached node whose top-left tile is the origin.
    pub fn new(prototype: Arc<Prototype>) -> Self {
        let (w, h) = prototype.tile_size(Direction::North);
        let orientation = prototype
            .capabilities
            .orientable
            .then(Orientation::default);
        Self {
            id: None,
            position: Vector::new(w as f64 / 2.0, h as f64 / 2.0),
            direction: Direction::North,
            orientation,
            fields: Map::new(),
            circuit: Vec::new(),
            neighbours: Vec::new(),
            copper: Vec::new(),
            members: None,
            attachment: None,
            prototype,
        }
    }

    /// Look `kind` up in `catalog`. Unknown kinds are an error.
    pub fn from_catalog(catalog: &dyn Catalog, kind: &str) -> Result<Self, EntityError> {
        catalog
            .entity(kind)
            .map(Self::new)
            .ok_or_else(|| EntityError::UnknownKind(kind.to_string()))
    }

    /// A group of `members`, whose positions are relative to `position`.
    pub fn group(id: Option<&str>, position: Vector, members: Vec<EntityNode>) -> Self {
        Self {
            id: id.map(str::to_string),
            position,
            members: Some(Members::Detached(members)),
            ..Self::new(group_prototype())
        }
    }

    // -- Identity --

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<&str>) -> Result<(), EntityError> {
        self.ensure_detached()?;
        self.id = id.map(str::to_string);
        Ok(())
    }

    pub fn with_id(mut self, id: &str) -> Self {
        if self.attachment.is_none() {
            self.id = Some(id.to_string());
        }
        self
    }

    pub fn kind(&self) -> &str {
        &self.prototype.name
    }

    pub fn type_name(&self) -> &str {
        &self.prototype.type_name
    }

    pub fn category(&self) -> EntityCategory {
        self.prototype.category
    }

    pub fn prototype(&self) -> &Arc<Prototype> {
        &self.prototype
    }

    pub fn capabilities(&self) -> Capabilities {
        self.prototype.capabilities
    }

    pub fn is_group(&self) -> bool {
        self.members.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Arena key, while attached.
    pub fn key(&self) -> Option<EntityKey> {
        self.attachment.map(|a| a.key)
    }

    /// Owning group, while attached to one.
    pub fn parent(&self) -> Option<EntityKey> {
        self.attachment.and_then(|a| a.parent)
    }

    fn ensure_detached(&self) -> Result<(), EntityError> {
        match self.attachment {
            Some(_) => Err(EntityError::AttachedImmutable),
            None => Ok(()),
        }
    }

    // -- Placement --

    pub fn position(&self) -> Vector {
        self.position
    }

    /// Tile size after applying the current direction.
    pub fn tile_size(&self) -> (u32, u32) {
        self.prototype.tile_size(self.direction)
    }

    fn half_size(&self) -> Vector {
        let (w, h) = self.tile_size();
        Vector::new(w as f64 / 2.0, h as f64 / 2.0)
    }

    /// `floor(position - size / 2)`.
    pub fn tile_position(&self) -> TilePosition {
        (self.position - self.half_size()).floor()
    }

    pub fn set_position(&mut self, position: Vector) -> Result<(), EntityError> {
        self.ensure_detached()?;
        if !position.is_finite() {
            return Err(EntityError::NonFinitePosition {
                x: position.x,
                y: position.y,
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn set_tile_position(&mut self, tile: TilePosition) -> Result<(), EntityError> {
        self.ensure_detached()?;
        self.position = Vector::from(tile) + self.half_size();
        Ok(())
    }

    pub fn at(mut self, x: f64, y: f64) -> Result<Self, EntityError> {
        self.set_position(Vector::new(x, y))?;
        Ok(self)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<(), EntityError> {
        self.ensure_detached()?;
        if direction != Direction::North && !self.prototype.capabilities.directional {
            return Err(EntityError::Unsupported {
                kind: self.kind().to_string(),
                what: "direction",
            });
        }
        self.direction = direction;
        Ok(())
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    pub fn set_orientation(&mut self, value: f64) -> Result<(), EntityError> {
        self.ensure_detached()?;
        if !self.prototype.capabilities.orientable {
            return Err(EntityError::Unsupported {
                kind: self.kind().to_string(),
                what: "orientation",
            });
        }
        self.orientation = Some(Orientation::new(value)?);
        Ok(())
    }

    /// Footprint in the node's own frame (centered on its position).
    pub fn footprint(&self) -> CollisionSet {
        self.prototype.footprint(self.direction, self.orientation)
    }

    // -- Fields --

    /// Explicitly set value, falling back to the kind's default.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .get(name)
            .or_else(|| self.prototype.default_field(name))
    }

    /// Explicitly set fields only.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Validate and set one field. Allowed while attached.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<Option<Warning>, EntityError> {
        let warning = self
            .prototype
            .category
            .validate_field(&self.prototype, name, &value)?;
        self.fields.insert(name.to_string(), value);
        Ok(warning)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Last write wins for every field `other` sets explicitly.
    pub(crate) fn merge_fields_from(&mut self, other: &EntityNode) {
        for (k, v) in &other.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    // -- Wiring --

    pub fn neighbours(&self) -> &[Association] {
        &self.neighbours
    }

    pub fn circuit_links(&self) -> &[CircuitLink] {
        &self.circuit
    }

    pub fn copper_links(&self) -> &[CopperLink] {
        &self.copper
    }

    pub(crate) fn clear_links(&mut self) {
        self.circuit.clear();
        self.neighbours.clear();
        self.copper.clear();
    }

    // -- Members --

    /// Members of a detached group.
    pub fn members(&self) -> Option<&[EntityNode]> {
        match &self.members {
            Some(Members::Detached(m)) => Some(m),
            _ => None,
        }
    }

    /// Member list of an attached group.
    pub fn member_tree(&self) -> Option<&EntityTree> {
        match &self.members {
            Some(Members::Attached(t)) => Some(t),
            _ => None,
        }
    }

    pub fn push_member(&mut self, member: EntityNode) -> Result<(), EntityError> {
        self.ensure_detached()?;
        match &mut self.members {
            Some(Members::Detached(m)) => {
                m.push(member);
                Ok(())
            }
            _ => Err(EntityError::Unsupported {
                kind: self.kind().to_string(),
                what: "members",
            }),
        }
    }

    /// Human-readable label used in warnings and errors.
    pub fn describe(&self) -> String {
        match &self.id {
            Some(id) => format!("{} '{}'", self.kind(), id),
            None => format!(
                "{} at ({}, {})",
                self.kind(),
                self.position.x,
                self.position.y
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// EntitySpec
// ---------------------------------------------------------------------------

/// Construction request for an entity, resolved against a catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySpec {
    pub kind: String,
    pub id: Option<String>,
    /// Wins over `tile_position` when both are set.
    pub position: Option<Vector>,
    pub tile_position: Option<TilePosition>,
    pub direction: Option<Direction>,
    pub orientation: Option<f64>,
    pub fields: Map<String, Value>,
}

impl EntitySpec {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Vector::new(x, y));
        self
    }

    pub fn tile_position(mut self, x: i32, y: i32) -> Self {
        self.tile_position = Some(TilePosition::new(x, y));
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn orientation(mut self, orientation: f64) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Build a detached node. Field warnings and, in permissive mode, the
    /// unknown-kind warning go to `diagnostics`.
    pub fn build(
        self,
        catalog: &dyn Catalog,
        mode: ValidationMode,
        diagnostics: &mut Diagnostics,
    ) -> Result<EntityNode, EntityError> {
        let prototype = match (catalog.entity(&self.kind), mode) {
            (Some(p), _) => p,
            (None, ValidationMode::Strict) => return Err(EntityError::UnknownKind(self.kind)),
            (None, ValidationMode::Permissive) => {
                diagnostics.warn(Warning::UnknownKind {
                    kind: self.kind.clone(),
                });
                Arc::new(Prototype::placeholder(&self.kind))
            }
        };

        let mut node = EntityNode::new(prototype);
        node.id = self.id;
        if let Some(direction) = self.direction {
            node.set_direction(direction)?;
        }
        if let Some(orientation) = self.orientation {
            node.set_orientation(orientation)?;
        }
        match (self.position, self.tile_position) {
            (Some(p), _) => node.set_position(p)?,
            (None, Some(t)) => node.set_tile_position(t)?,
            (None, None) => {}
        }
        let mut warnings = Vec::new();
        for (name, value) in self.fields {
            if let Some(w) = node.set_field(&name, value)? {
                warnings.push(w);
            }
        }
        diagnostics.extend(warnings);
        Ok(node)
    }
}
