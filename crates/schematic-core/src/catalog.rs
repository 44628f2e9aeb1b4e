//! Entity catalog: the read-only table of prototypes looked up by kind.
//!
//! A [`Prototype`] carries everything that is shared between all instances
//! of a kind: category, collision footprint and mask, tile size, wiring
//! capabilities and reach. Instances hold an `Arc<Prototype>` and never own
//! a footprint of their own.
//!
//! Catalogs follow a two-phase lifecycle: register prototypes on a
//! [`CatalogBuilder`], then freeze it into an [`EntityCatalog`]. Consumers
//! depend on the narrow [`Catalog`] trait so tests can supply fakes.

use crate::direction::{Direction, Orientation};
use crate::geometry::{Aabb, CollisionMask, CollisionSet};
use crate::warning::Warning;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Capability tags that gate wiring and orientation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub power_connectable: bool,
    /// Has two copper sides (power switch).
    pub dual_power_connectable: bool,
    pub circuit_connectable: bool,
    /// Has separate input and output circuit sides (combinators).
    pub dual_circuit_connectable: bool,
    pub directional: bool,
    /// Uses a continuous orientation instead of a direction.
    pub orientable: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        power_connectable: false,
        dual_power_connectable: false,
        circuit_connectable: false,
        dual_circuit_connectable: false,
        directional: false,
        orientable: false,
    };

    pub fn circuit() -> Self {
        Self {
            circuit_connectable: true,
            ..Self::NONE
        }
    }

    pub fn pole() -> Self {
        Self {
            power_connectable: true,
            circuit_connectable: true,
            ..Self::NONE
        }
    }

    pub fn directional(mut self) -> Self {
        self.directional = true;
        self
    }
}

// ---------------------------------------------------------------------------
// EntityCategory
// ---------------------------------------------------------------------------

/// Errors from per-kind field validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("'{0}' is a structural field and cannot be set directly")]
    Reserved(String),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

/// Fields every entity document may carry that are not per-kind.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "entity_number",
    "name",
    "position",
    "direction",
    "orientation",
    "neighbours",
    "connections",
];

/// Behavioral family of a kind, derived from its type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    ElectricPole,
    PowerSwitch,
    Container,
    ConstantCombinator,
    ArithmeticCombinator,
    DeciderCombinator,
    Inserter,
    TransportBelt,
    Furnace,
    AssemblingMachine,
    Lamp,
    StraightRail,
    CurvedRail,
    TrainStop,
    Locomotive,
    CargoWagon,
    Group,
    Other,
}

impl EntityCategory {
    pub fn from_type(type_name: &str) -> Self {
        match type_name {
            "electric-pole" => Self::ElectricPole,
            "power-switch" => Self::PowerSwitch,
            "container" | "logistic-container" => Self::Container,
            "constant-combinator" => Self::ConstantCombinator,
            "arithmetic-combinator" => Self::ArithmeticCombinator,
            "decider-combinator" => Self::DeciderCombinator,
            "inserter" => Self::Inserter,
            "transport-belt" => Self::TransportBelt,
            "furnace" => Self::Furnace,
            "assembling-machine" => Self::AssemblingMachine,
            "lamp" => Self::Lamp,
            "straight-rail" => Self::StraightRail,
            "curved-rail" => Self::CurvedRail,
            "train-stop" => Self::TrainStop,
            "locomotive" => Self::Locomotive,
            "cargo-wagon" => Self::CargoWagon,
            "group" => Self::Group,
            _ => Self::Other,
        }
    }

    pub fn is_rail(self) -> bool {
        matches!(self, Self::StraightRail | Self::CurvedRail)
    }

    pub fn is_rolling_stock(self) -> bool {
        matches!(self, Self::Locomotive | Self::CargoWagon)
    }

    /// Per-kind fields understood beyond [`RESERVED_FIELDS`].
    pub fn known_fields(self) -> &'static [&'static str] {
        match self {
            Self::ElectricPole | Self::StraightRail | Self::CurvedRail | Self::Group => &[],
            Self::PowerSwitch => &["switch_state", "control_behavior"],
            Self::Container => &["bar", "items"],
            Self::ConstantCombinator | Self::TransportBelt => &["control_behavior"],
            Self::ArithmeticCombinator | Self::DeciderCombinator => {
                &["control_behavior", "player_description"]
            }
            Self::Inserter => &[
                "control_behavior",
                "override_stack_size",
                "drop_position",
                "pickup_position",
                "filters",
                "filter_mode",
            ],
            Self::Furnace => &["items"],
            Self::AssemblingMachine => &["recipe", "items"],
            Self::Lamp => &["control_behavior", "color", "always_on"],
            Self::TrainStop => &["station", "color", "manual_trains_limit", "control_behavior"],
            Self::Locomotive => &["items", "color"],
            Self::CargoWagon => &["items", "inventory"],
            Self::Other => &[],
        }
    }

    /// Defaults applied when a field is not set explicitly.
    pub fn default_fields(self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            Self::PowerSwitch => {
                map.insert("switch_state".into(), Value::Bool(false));
            }
            Self::Lamp => {
                map.insert("always_on".into(), Value::Bool(false));
            }
            _ => {}
        }
        map
    }

    /// Validate one settable field. Returns a warning for values that are
    /// legal but questionable, or for fields this kind does not know.
    pub fn validate_field(
        self,
        prototype: &Prototype,
        field: &str,
        value: &Value,
    ) -> Result<Option<Warning>, FieldError> {
        if RESERVED_FIELDS.contains(&field) {
            return Err(FieldError::Reserved(field.to_string()));
        }
        match field {
            "tags" | "items" if !value.is_object() => {
                return Err(invalid(field, "expected an object"));
            }
            "bar" if self == Self::Container => {
                let bar = as_integer(field, value, u16::MAX as u64)?;
                if let Some(size) = prototype.inventory_size
                    && bar > size as u64
                {
                    return Ok(Some(Warning::IndexRange {
                        kind: prototype.name.clone(),
                        field: field.to_string(),
                        value: bar,
                        limit: size as u64,
                    }));
                }
            }
            "override_stack_size" if self == Self::Inserter => {
                as_integer(field, value, u8::MAX as u64)?;
            }
            "manual_trains_limit" if self == Self::TrainStop => {
                as_integer(field, value, u32::MAX as u64)?;
            }
            "recipe" | "station" | "player_description" if !value.is_string() => {
                return Err(invalid(field, "expected a string"));
            }
            "switch_state" | "always_on" if !value.is_boolean() => {
                return Err(invalid(field, "expected a boolean"));
            }
            "color" => {
                let ok = value.as_object().is_some_and(|c| {
                    ["r", "g", "b"]
                        .iter()
                        .all(|k| c.get(*k).is_none_or(Value::is_number))
                });
                if !ok {
                    return Err(invalid(field, "expected {r, g, b, a} numbers"));
                }
            }
            _ => {}
        }
        if field == "tags" || self.known_fields().contains(&field) {
            Ok(None)
        } else {
            Ok(Some(Warning::UnknownField {
                kind: prototype.name.clone(),
                field: field.to_string(),
            }))
        }
    }
}

fn invalid(field: &str, reason: &str) -> FieldError {
    FieldError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn as_integer(field: &str, value: &Value, max: u64) -> Result<u64, FieldError> {
    match value.as_u64() {
        Some(v) if v <= max => Ok(v),
        _ => Err(invalid(field, &format!("expected an integer in 0..={max}"))),
    }
}

// ---------------------------------------------------------------------------
// Prototype
// ---------------------------------------------------------------------------

/// Shared, read-only description of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    /// Type string, e.g. `"electric-pole"`.
    pub type_name: String,
    pub category: EntityCategory,
    /// Footprint facing north, centered on the entity position.
    pub collision: CollisionSet,
    pub collision_mask: CollisionMask,
    pub tile_width: u32,
    pub tile_height: u32,
    pub capabilities: Capabilities,
    pub circuit_wire_max_distance: f64,
    /// Copper wire reach; zero for kinds that are not power-connectable.
    pub maximum_wire_distance: f64,
    pub inventory_size: Option<u32>,
    pub default_fields: Map<String, Value>,
}

/// Circuit reach used when a prototype does not specify one.
pub const DEFAULT_CIRCUIT_WIRE_DISTANCE: f64 = 9.0;

impl Prototype {
    /// A prototype with a single collision box and derived tile size.
    pub fn new(name: &str, type_name: &str, collision_box: Aabb) -> Self {
        let (tile_width, tile_height) = tile_size_of(&collision_box);
        let category = EntityCategory::from_type(type_name);
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            category,
            collision: CollisionSet::from_aabb(collision_box),
            collision_mask: CollisionMask::object(),
            tile_width,
            tile_height,
            capabilities: Capabilities::NONE,
            circuit_wire_max_distance: DEFAULT_CIRCUIT_WIRE_DISTANCE,
            maximum_wire_distance: 0.0,
            inventory_size: None,
            default_fields: category.default_fields(),
        }
    }

    /// Stand-in for a kind the catalog does not know.
    pub fn placeholder(name: &str) -> Self {
        Self::new(name, "unknown", Aabb::centered(0.8, 0.8))
    }

    /// Prototype shared by all group nodes. Groups have no footprint of
    /// their own; their extent is the union of their members.
    pub fn group() -> Self {
        Self {
            collision: CollisionSet::default(),
            collision_mask: CollisionMask::default(),
            tile_width: 0,
            tile_height: 0,
            ..Self::new("group", "group", Aabb::point(crate::geometry::Vector::ZERO))
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_mask(mut self, mask: CollisionMask) -> Self {
        self.collision_mask = mask;
        self
    }

    /// Set both copper and circuit reach.
    pub fn with_wire_reach(mut self, distance: f64) -> Self {
        self.maximum_wire_distance = distance;
        self.circuit_wire_max_distance = distance;
        self
    }

    pub fn with_circuit_reach(mut self, distance: f64) -> Self {
        self.circuit_wire_max_distance = distance;
        self
    }

    pub fn with_inventory(mut self, slots: u32) -> Self {
        self.inventory_size = Some(slots);
        self
    }

    /// Tile size after rotation; east/west swap width and height.
    pub fn tile_size(&self, direction: Direction) -> (u32, u32) {
        match direction.quarter_turns() {
            Some(1) | Some(3) => (self.tile_height, self.tile_width),
            _ => (self.tile_width, self.tile_height),
        }
    }

    /// Local-space footprint for the given facing.
    pub fn footprint(&self, direction: Direction, orientation: Option<Orientation>) -> CollisionSet {
        let radians = match orientation {
            Some(o) if self.capabilities.orientable => o.radians(),
            _ if self.capabilities.directional => direction.radians(),
            _ => 0.0,
        };
        if radians == 0.0 {
            self.collision.clone()
        } else {
            self.collision.rotated(radians)
        }
    }

    /// Explicit prototype default, falling back to the category default.
    pub fn default_field(&self, field: &str) -> Option<&Value> {
        self.default_fields.get(field)
    }
}

fn tile_size_of(collision_box: &Aabb) -> (u32, u32) {
    (
        collision_box.width().ceil().max(1.0) as u32,
        collision_box.height().ceil().max(1.0) as u32,
    )
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Narrow lookup interface over a prototype table.
pub trait Catalog: std::fmt::Debug + Send + Sync {
    fn entity(&self, name: &str) -> Option<Arc<Prototype>>;
    fn has_tile(&self, name: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate prototype: {0}")]
    Duplicate(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Builder for an immutable [`EntityCatalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    prototypes: Vec<Prototype>,
    by_name: HashMap<String, usize>,
    tiles: BTreeSet<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity prototype. Names must be unique.
    pub fn register(&mut self, prototype: Prototype) -> Result<(), CatalogError> {
        if self.by_name.contains_key(&prototype.name) {
            return Err(CatalogError::Duplicate(prototype.name));
        }
        self.by_name
            .insert(prototype.name.clone(), self.prototypes.len());
        self.prototypes.push(prototype);
        Ok(())
    }

    pub fn register_tile(&mut self, name: &str) -> Result<(), CatalogError> {
        if !self.tiles.insert(name.to_string()) {
            return Err(CatalogError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    /// Modify an already registered prototype by name.
    pub fn mutate<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut Prototype),
    {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        f(&mut self.prototypes[idx]);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn build(self) -> EntityCatalog {
        EntityCatalog {
            prototypes: self.prototypes.into_iter().map(Arc::new).collect(),
            by_name: self.by_name,
            tiles: self.tiles,
        }
    }
}

/// Immutable prototype table. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct EntityCatalog {
    prototypes: Vec<Arc<Prototype>>,
    by_name: HashMap<String, usize>,
    tiles: BTreeSet<String>,
}

impl EntityCatalog {
    pub fn get(&self, name: &str) -> Option<&Arc<Prototype>> {
        self.by_name.get(name).map(|&i| &self.prototypes[i])
    }

    pub fn entity_count(&self) -> usize {
        self.prototypes.len()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.prototypes.iter().map(|p| p.name.as_str())
    }
}

impl Catalog for EntityCatalog {
    fn entity(&self, name: &str) -> Option<Arc<Prototype>> {
        self.get(name).cloned()
    }

    fn has_tile(&self, name: &str) -> bool {
        self.tiles.contains(name)
    }
}

// ---------------------------------------------------------------------------
// Bundled catalog
// ---------------------------------------------------------------------------

static VANILLA: OnceLock<Arc<EntityCatalog>> = OnceLock::new();

/// The bundled catalog of common base-game kinds, built once on first use.
pub fn vanilla() -> Arc<EntityCatalog> {
    VANILLA.get_or_init(|| Arc::new(build_vanilla())).clone()
}

fn rail_mask() -> CollisionMask {
    CollisionMask::new(["item-layer", "floor-layer", "rail-layer"])
}

fn train_mask() -> CollisionMask {
    CollisionMask::new(["train-layer"])
}

fn build_vanilla() -> EntityCatalog {
    let square = |half: f64| Aabb::from_coords(-half, -half, half, half);
    let orientable = Capabilities {
        orientable: true,
        ..Capabilities::NONE
    };
    let dual_combinator = Capabilities {
        dual_circuit_connectable: true,
        ..Capabilities::circuit().directional()
    };
    let switch = Capabilities {
        dual_power_connectable: true,
        ..Capabilities::pole()
    };

    let prototypes = vec![
        Prototype::new("small-electric-pole", "electric-pole", square(0.15))
            .with_capabilities(Capabilities::pole())
            .with_wire_reach(7.5),
        Prototype::new("medium-electric-pole", "electric-pole", square(0.15))
            .with_capabilities(Capabilities::pole())
            .with_wire_reach(9.0),
        Prototype::new("big-electric-pole", "electric-pole", square(0.65))
            .with_capabilities(Capabilities::pole())
            .with_wire_reach(30.0),
        Prototype::new("substation", "electric-pole", square(0.7))
            .with_capabilities(Capabilities::pole())
            .with_wire_reach(18.0),
        Prototype::new("power-switch", "power-switch", square(0.7))
            .with_capabilities(switch)
            .with_wire_reach(10.0),
        Prototype::new("wooden-chest", "container", square(0.35))
            .with_capabilities(Capabilities::circuit())
            .with_inventory(16),
        Prototype::new("iron-chest", "container", square(0.35))
            .with_capabilities(Capabilities::circuit())
            .with_inventory(32),
        Prototype::new("steel-chest", "container", square(0.35))
            .with_capabilities(Capabilities::circuit())
            .with_inventory(48),
        Prototype::new("constant-combinator", "constant-combinator", square(0.35))
            .with_capabilities(Capabilities::circuit().directional()),
        Prototype::new(
            "arithmetic-combinator",
            "arithmetic-combinator",
            Aabb::from_coords(-0.35, -0.65, 0.35, 0.65),
        )
        .with_capabilities(dual_combinator),
        Prototype::new(
            "decider-combinator",
            "decider-combinator",
            Aabb::from_coords(-0.35, -0.65, 0.35, 0.65),
        )
        .with_capabilities(dual_combinator),
        Prototype::new("inserter", "inserter", square(0.15))
            .with_capabilities(Capabilities::circuit().directional()),
        Prototype::new("fast-inserter", "inserter", square(0.15))
            .with_capabilities(Capabilities::circuit().directional()),
        Prototype::new("transport-belt", "transport-belt", square(0.4))
            .with_capabilities(Capabilities::circuit().directional()),
        Prototype::new("stone-furnace", "furnace", square(0.7)),
        Prototype::new("assembling-machine-1", "assembling-machine", square(1.2))
            .with_capabilities(Capabilities::NONE.directional()),
        Prototype::new("small-lamp", "lamp", square(0.15))
            .with_capabilities(Capabilities::circuit()),
        Prototype::new(
            "straight-rail",
            "straight-rail",
            Aabb::from_coords(-0.7, -0.99, 0.7, 0.99),
        )
        .with_tile_size(2, 2)
        .with_capabilities(Capabilities::NONE.directional())
        .with_mask(rail_mask()),
        Prototype::new("train-stop", "train-stop", square(0.9))
            .with_capabilities(Capabilities::circuit().directional()),
        Prototype::new(
            "locomotive",
            "locomotive",
            Aabb::from_coords(-0.6, -2.6, 0.6, 2.6),
        )
        .with_capabilities(orientable)
        .with_mask(train_mask()),
        Prototype::new(
            "cargo-wagon",
            "cargo-wagon",
            Aabb::from_coords(-0.6, -2.4, 0.6, 2.4),
        )
        .with_capabilities(orientable)
        .with_mask(train_mask())
        .with_inventory(40),
    ];

    let mut builder = CatalogBuilder::new();
    for prototype in prototypes {
        // Names above are distinct.
        let _ = builder.register(prototype);
    }
    for tile in [
        "stone-path",
        "concrete",
        "refined-concrete",
        "hazard-concrete-left",
        "hazard-concrete-right",
        "landfill",
    ] {
        let _ = builder.register_tile(tile);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vanilla_lookup() {
        let catalog = vanilla();
        let pole = catalog.entity("small-electric-pole").unwrap();
        assert_eq!(pole.category, EntityCategory::ElectricPole);
        assert_eq!((pole.tile_width, pole.tile_height), (1, 1));
        assert!(pole.capabilities.power_connectable);
        assert!(catalog.entity("no-such-thing").is_none());
        assert!(catalog.has_tile("concrete"));
        assert!(!catalog.has_tile("lava"));
    }

    #[test]
    fn vanilla_is_shared() {
        let a = vanilla();
        let b = vanilla();
        assert!(Arc::ptr_eq(&a, &b));
        let p1 = a.entity("iron-chest").unwrap();
        let p2 = b.entity("iron-chest").unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
    }

    #[test]
    fn tile_size_derived_from_collision_box() {
        let catalog = vanilla();
        let furnace = catalog.entity("stone-furnace").unwrap();
        assert_eq!((furnace.tile_width, furnace.tile_height), (2, 2));
        let assembler = catalog.entity("assembling-machine-1").unwrap();
        assert_eq!((assembler.tile_width, assembler.tile_height), (3, 3));
        let loco = catalog.entity("locomotive").unwrap();
        assert_eq!((loco.tile_width, loco.tile_height), (2, 6));
    }

    #[test]
    fn rotated_tile_size_swaps() {
        let catalog = vanilla();
        let combinator = catalog.entity("arithmetic-combinator").unwrap();
        assert_eq!(combinator.tile_size(Direction::North), (1, 2));
        assert_eq!(combinator.tile_size(Direction::East), (2, 1));
    }

    #[test]
    fn footprint_rotates_for_directional_kinds() {
        let catalog = vanilla();
        let combinator = catalog.entity("arithmetic-combinator").unwrap();
        let east = combinator.footprint(Direction::East, None);
        let bb = east.bounding_box().unwrap();
        assert!((bb.width() - 1.3).abs() < 1e-9);
        assert!((bb.height() - 0.7).abs() < 1e-9);

        // Non-directional kinds ignore the direction.
        let chest = catalog.entity("iron-chest").unwrap();
        assert_eq!(chest.footprint(Direction::East, None), chest.collision);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut b = CatalogBuilder::new();
        b.register(Prototype::placeholder("thing")).unwrap();
        let err = b.register(Prototype::placeholder("thing")).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(name) if name == "thing"));
    }

    #[test]
    fn mutate_registered_prototype() {
        let mut b = CatalogBuilder::new();
        b.register(Prototype::placeholder("thing")).unwrap();
        b.mutate("thing", |p| p.inventory_size = Some(8)).unwrap();
        assert!(b.mutate("missing", |_| {}).is_err());
        let catalog = b.build();
        assert_eq!(catalog.get("thing").unwrap().inventory_size, Some(8));
    }

    // -----------------------------------------------------------------------
    // Field validation
    // -----------------------------------------------------------------------

    #[test]
    fn reserved_fields_rejected() {
        let chest = vanilla().entity("iron-chest").unwrap();
        let err = chest
            .category
            .validate_field(&chest, "position", &json!({"x": 0, "y": 0}))
            .unwrap_err();
        assert_eq!(err, FieldError::Reserved("position".into()));
    }

    #[test]
    fn bar_beyond_inventory_warns() {
        let chest = vanilla().entity("iron-chest").unwrap();
        assert_eq!(
            chest.category.validate_field(&chest, "bar", &json!(10)),
            Ok(None)
        );
        let warning = chest
            .category
            .validate_field(&chest, "bar", &json!(40))
            .unwrap();
        assert!(matches!(
            warning,
            Some(Warning::IndexRange { value: 40, limit: 32, .. })
        ));
        assert!(
            chest
                .category
                .validate_field(&chest, "bar", &json!(70000))
                .is_err()
        );
        assert!(
            chest
                .category
                .validate_field(&chest, "bar", &json!("ten"))
                .is_err()
        );
    }

    #[test]
    fn unknown_fields_warn_but_pass() {
        let pole = vanilla().entity("small-electric-pole").unwrap();
        let result = pole
            .category
            .validate_field(&pole, "modded_setting", &json!(3));
        assert!(matches!(
            result,
            Ok(Some(Warning::UnknownField { ref field, .. })) if field == "modded_setting"
        ));
        assert_eq!(
            pole.category.validate_field(&pole, "tags", &json!({"a": 1})),
            Ok(None)
        );
    }

    #[test]
    fn category_defaults() {
        let switch = vanilla().entity("power-switch").unwrap();
        assert_eq!(switch.default_field("switch_state"), Some(&json!(false)));
        let chest = vanilla().entity("iron-chest").unwrap();
        assert_eq!(chest.default_field("bar"), None);
    }
}
