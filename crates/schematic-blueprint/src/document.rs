//! The plain document form of a blueprint.
//!
//! These types mirror the JSON interchange schema one to one. Cross
//! references are integer `entity_number`s here; [`crate::blueprint`]
//! converts between them and associations.

use crate::error::DocumentError;
use crate::schedule::ScheduleStop;
use schematic_core::direction::Direction;
use schematic_core::geometry::{TilePosition, Vector};
use schematic_core::version::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Most icons a blueprint may carry.
pub const MAX_ICONS: usize = 4;

fn default_item() -> String {
    "blueprint".to_string()
}

fn default_alpha() -> f64 {
    1.0
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Top-level wrapper used by the text codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintEnvelope {
    pub blueprint: BlueprintDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintDocument {
    #[serde(default = "default_item")]
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icons: Vec<IconDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Version,
    #[serde(rename = "snap-to-grid", default, skip_serializing_if = "Option::is_none")]
    pub snap_to_grid: Option<TilePosition>,
    #[serde(rename = "absolute-snapping", default, skip_serializing_if = "is_false")]
    pub absolute_snapping: bool,
    #[serde(
        rename = "position-relative-to-grid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub position_relative_to_grid: Option<TilePosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiles: Vec<TileDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedules: Vec<ScheduleDocument>,
}

impl Default for BlueprintDocument {
    fn default() -> Self {
        Self {
            item: default_item(),
            label: None,
            label_color: None,
            icons: Vec::new(),
            description: None,
            version: Version::default(),
            snap_to_grid: None,
            absolute_snapping: false,
            position_relative_to_grid: None,
            entities: Vec::new(),
            tiles: Vec::new(),
            schedules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "default_alpha")]
    pub a: f64,
}

impl Color {
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Components must be finite and non-negative.
    pub fn validate(&self) -> Result<(), DocumentError> {
        for (name, v) in [("r", self.r), ("g", self.g), ("b", self.b), ("a", self.a)] {
            if !v.is_finite() || v < 0.0 {
                return Err(DocumentError::InvalidColor(format!("{name} = {v}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalId {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconDocument {
    pub signal: SignalId,
    /// 1-based slot.
    pub index: u8,
}

impl IconDocument {
    pub fn item(name: &str, index: u8) -> Self {
        Self {
            signal: SignalId {
                name: name.to_string(),
                kind: "item".to_string(),
            },
            index,
        }
    }
}

/// At most [`MAX_ICONS`] icons, each in slot 1..=4, no slot used twice.
pub fn validate_icons(icons: &[IconDocument]) -> Result<(), DocumentError> {
    if icons.len() > MAX_ICONS {
        return Err(DocumentError::InvalidIcon(format!(
            "{} icons given, at most {MAX_ICONS} allowed",
            icons.len()
        )));
    }
    let mut used = [false; MAX_ICONS];
    for icon in icons {
        let slot = usize::from(icon.index);
        if !(1..=MAX_ICONS).contains(&slot) {
            return Err(DocumentError::InvalidIcon(format!(
                "index {} outside 1..={MAX_ICONS}",
                icon.index
            )));
        }
        if std::mem::replace(&mut used[slot - 1], true) {
            return Err(DocumentError::InvalidIcon(format!(
                "index {} used twice",
                icon.index
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub entity_number: u64,
    pub name: String,
    pub position: Vector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbours: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectionsDocument>,
    /// Per-kind fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityDocument {
    pub fn new(entity_number: u64, name: &str, position: Vector) -> Self {
        Self {
            entity_number,
            name: name.to_string(),
            position,
            id: None,
            direction: None,
            orientation: None,
            neighbours: Vec::new(),
            connections: None,
            extra: Map::new(),
        }
    }
}

/// Wires held by one entity, keyed by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionsDocument {
    #[serde(rename = "1", default, skip_serializing_if = "Option::is_none")]
    pub side_1: Option<CircuitSideDocument>,
    #[serde(rename = "2", default, skip_serializing_if = "Option::is_none")]
    pub side_2: Option<CircuitSideDocument>,
    #[serde(rename = "Cu0", default, skip_serializing_if = "Vec::is_empty")]
    pub cu0: Vec<CopperDocument>,
    #[serde(rename = "Cu1", default, skip_serializing_if = "Vec::is_empty")]
    pub cu1: Vec<CopperDocument>,
}

impl ConnectionsDocument {
    pub fn is_empty(&self) -> bool {
        self.side_1.is_none() && self.side_2.is_none() && self.cu0.is_empty() && self.cu1.is_empty()
    }

    pub fn side(&self, side: u8) -> Option<&CircuitSideDocument> {
        match side {
            1 => self.side_1.as_ref(),
            2 => self.side_2.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn side_mut(&mut self, side: u8) -> &mut CircuitSideDocument {
        let slot = if side == 2 {
            &mut self.side_2
        } else {
            &mut self.side_1
        };
        slot.get_or_insert_with(CircuitSideDocument::default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitSideDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red: Vec<CircuitTargetDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub green: Vec<CircuitTargetDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitTargetDocument {
    pub entity_id: u64,
    /// Target side, present only for two-sided targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_id: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopperDocument {
    pub entity_id: u64,
    /// Zero-based terminal on the target.
    pub wire_id: u8,
}

// ---------------------------------------------------------------------------
// Tiles and schedules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDocument {
    pub name: String,
    pub position: TilePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub schedule: Vec<ScheduleStop>,
    #[serde(default)]
    pub locomotives: Vec<u64>,
}
