//! Blueprints and the two-pass document conversion.
//!
//! Export flattens the entity tree depth-first, numbers the leaves from 1
//! in that order, then rewrites every association into the target's
//! number. Import builds the entities in document order first, then
//! rewrites numbers back into associations.

use crate::association::Association;
use crate::codec;
use crate::collection::EntityCollection;
use crate::config::CollectionConfig;
use crate::document::{
    BlueprintDocument, CircuitTargetDocument, Color, ConnectionsDocument, CopperDocument,
    EntityDocument, IconDocument, ScheduleDocument, TileDocument, validate_icons,
};
use crate::entity::{CircuitLink, CopperLink, EntityNode, EntitySpec, WireColor};
use crate::error::{BlueprintError, CollectionError, DocumentError};
use crate::schedule::Schedule;
use crate::tile::{Tile, TileCollection};
use schematic_core::catalog::Catalog;
use schematic_core::direction::Direction;
use schematic_core::geometry::{TilePosition, Vector};
use schematic_core::id::EntityKey;
use schematic_core::version::Version;
use schematic_core::warning::Warning;
use std::collections::HashMap;
use std::sync::Arc;

/// A complete blueprint: metadata, entities, tiles and schedules.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub label: Option<String>,
    label_color: Option<Color>,
    icons: Vec<IconDocument>,
    pub description: Option<String>,
    pub version: Version,
    pub snap_to_grid: Option<TilePosition>,
    pub absolute_snapping: bool,
    pub position_relative_to_grid: Option<TilePosition>,
    /// Subtracted from every position on export. Internal positions are
    /// never changed.
    pub export_offset: Option<Vector>,
    pub entities: EntityCollection,
    pub tiles: TileCollection,
    pub schedules: Vec<Schedule>,
}

impl Blueprint {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            label: None,
            label_color: None,
            icons: Vec::new(),
            description: None,
            version: Version::default(),
            snap_to_grid: None,
            absolute_snapping: false,
            position_relative_to_grid: None,
            export_offset: None,
            entities: EntityCollection::new(Arc::clone(&catalog)),
            tiles: TileCollection::new(catalog),
            schedules: Vec::new(),
        }
    }

    pub fn with_config(
        catalog: Arc<dyn Catalog>,
        config: CollectionConfig,
    ) -> Result<Self, BlueprintError> {
        Ok(Self {
            entities: EntityCollection::with_config(Arc::clone(&catalog), config)?,
            tiles: TileCollection::with_config(Arc::clone(&catalog), config)?,
            ..Self::new(catalog)
        })
    }

    pub fn label_color(&self) -> Option<Color> {
        self.label_color
    }

    pub fn set_label_color(&mut self, color: Option<Color>) -> Result<(), DocumentError> {
        if let Some(c) = &color {
            c.validate()?;
        }
        self.label_color = color;
        Ok(())
    }

    pub fn icons(&self) -> &[IconDocument] {
        &self.icons
    }

    pub fn set_icons(&mut self, icons: Vec<IconDocument>) -> Result<(), DocumentError> {
        validate_icons(&icons)?;
        self.icons = icons;
        Ok(())
    }

    /// Pending warnings from entities and tiles.
    pub fn warnings(&self) -> Vec<Warning> {
        let mut all = self.entities.warnings().to_vec();
        all.extend_from_slice(self.tiles.warnings());
        all
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        let mut all = self.entities.take_warnings();
        all.extend(self.tiles.take_warnings());
        all
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// Convert to the document form.
    ///
    /// Fails with [`DocumentError::DanglingReference`] if any wire or
    /// schedule still points at a removed entity.
    pub fn to_document(&self) -> Result<BlueprintDocument, DocumentError> {
        let order = self.entities.flatten();
        let numbers: HashMap<EntityKey, u64> = order
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, i as u64 + 1))
            .collect();
        let offset = self.export_offset.unwrap_or(Vector::ZERO);

        let entities = order
            .iter()
            .map(|&key| self.entity_document(key, &numbers, offset))
            .collect::<Result<Vec<_>, _>>()?;

        let tile_offset = offset.floor();
        let tiles = self
            .tiles
            .iter()
            .map(|t| TileDocument {
                name: t.kind.clone(),
                position: TilePosition::new(
                    t.position.x - tile_offset.x,
                    t.position.y - tile_offset.y,
                ),
            })
            .collect();

        let schedules = self
            .schedules
            .iter()
            .map(|s| -> Result<ScheduleDocument, DocumentError> {
                let locomotives = s
                    .locomotives()
                    .iter()
                    .map(|l| {
                        numbers
                            .get(&l.key())
                            .copied()
                            .ok_or_else(|| DocumentError::DanglingReference {
                                entity: "schedule".to_string(),
                                field: "locomotives",
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ScheduleDocument {
                    schedule: s.stops().to_vec(),
                    locomotives,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("exported {} entities", entities.len());
        Ok(BlueprintDocument {
            label: self.label.clone(),
            label_color: self.label_color,
            icons: self.icons.clone(),
            description: self.description.clone(),
            version: self.version,
            snap_to_grid: self.snap_to_grid,
            absolute_snapping: self.absolute_snapping,
            position_relative_to_grid: self.position_relative_to_grid,
            entities,
            tiles,
            schedules,
            ..BlueprintDocument::default()
        })
    }

    /// Member ids are qualified with the ids of their enclosing groups.
    fn qualified_id(&self, key: EntityKey) -> Option<String> {
        let node = self.entities.get(key)?;
        let mut parts = vec![node.id()?];
        let mut parent = node.parent();
        while let Some(p) = parent.and_then(|k| self.entities.get(k)) {
            if let Some(id) = p.id() {
                parts.push(id);
            }
            parent = p.parent();
        }
        parts.reverse();
        Some(parts.join("."))
    }

    fn entity_document(
        &self,
        key: EntityKey,
        numbers: &HashMap<EntityKey, u64>,
        offset: Vector,
    ) -> Result<EntityDocument, DocumentError> {
        let node = self
            .entities
            .get(key)
            .ok_or(DocumentError::Collection(CollectionError::NotInCollection))?;
        let number_of = |target: Association, field: &'static str| {
            numbers
                .get(&target.key())
                .copied()
                .ok_or_else(|| DocumentError::DanglingReference {
                    entity: node.describe(),
                    field,
                })
        };

        let world = self.entities.world_position(key).unwrap_or(node.position());
        let number = number_of(Association::new(key), "entity_number")?;
        let mut doc = EntityDocument::new(number, node.kind(), world - offset);
        doc.id = self.qualified_id(key);
        doc.direction = (node.direction() != Direction::North).then_some(node.direction());
        doc.orientation = node.orientation().map(|o| o.value());
        doc.extra = node.fields().clone();
        doc.neighbours = node
            .neighbours()
            .iter()
            .map(|n| number_of(*n, "neighbours"))
            .collect::<Result<_, _>>()?;

        let mut connections = ConnectionsDocument::default();
        for link in node.circuit_links() {
            let entity_id = number_of(link.target, "connections")?;
            let two_sided = self
                .entities
                .get(link.target.key())
                .is_some_and(|t| t.capabilities().dual_circuit_connectable);
            let target = CircuitTargetDocument {
                entity_id,
                circuit_id: two_sided.then_some(link.target_side),
            };
            let side = connections.side_mut(link.side);
            match link.color {
                WireColor::Red => side.red.push(target),
                WireColor::Green => side.green.push(target),
            }
        }
        for link in node.copper_links() {
            let copper = CopperDocument {
                entity_id: number_of(link.target, "connections")?,
                wire_id: link.target_side.saturating_sub(1),
            };
            match link.side {
                2 => connections.cu1.push(copper),
                _ => connections.cu0.push(copper),
            }
        }
        doc.connections = (!connections.is_empty()).then_some(connections);
        Ok(doc)
    }

    pub fn to_blueprint_string(&self) -> Result<String, BlueprintError> {
        let doc = self.to_document()?;
        Ok(codec::encode_document(&doc)?)
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    pub fn from_document(
        catalog: Arc<dyn Catalog>,
        doc: &BlueprintDocument,
    ) -> Result<Self, BlueprintError> {
        Self::from_document_with(catalog, CollectionConfig::default(), doc)
    }

    /// Build a blueprint from `doc`. Group structure is not part of the
    /// document, so every entity comes back at top level.
    pub fn from_document_with(
        catalog: Arc<dyn Catalog>,
        config: CollectionConfig,
        doc: &BlueprintDocument,
    ) -> Result<Self, BlueprintError> {
        let mut bp = Self::with_config(catalog, config)?;
        bp.label = doc.label.clone();
        bp.set_label_color(doc.label_color)?;
        bp.set_icons(doc.icons.clone())?;
        bp.description = doc.description.clone();
        bp.version = doc.version;
        bp.snap_to_grid = doc.snap_to_grid;
        bp.absolute_snapping = doc.absolute_snapping;
        bp.position_relative_to_grid = doc.position_relative_to_grid;

        // Pass 1: entities, in document order.
        let mut keys: HashMap<u64, EntityKey> = HashMap::with_capacity(doc.entities.len());
        for e in &doc.entities {
            if keys.contains_key(&e.entity_number) {
                return Err(DocumentError::DuplicateEntityNumber(e.entity_number).into());
            }
            let spec = EntitySpec {
                kind: e.name.clone(),
                id: e.id.clone(),
                position: Some(e.position),
                tile_position: None,
                direction: e.direction,
                orientation: e.orientation,
                fields: e.extra.clone(),
            };
            let key = bp.entities.append_spec(spec)?.key();
            keys.insert(e.entity_number, key);
        }

        // Pass 2: numbers back into associations.
        let lookup = |n: u64| {
            keys.get(&n)
                .copied()
                .ok_or(DocumentError::UnknownEntityNumber(n))
        };
        for e in &doc.entities {
            let holder = lookup(e.entity_number)?;
            for n in &e.neighbours {
                bp.entities.push_neighbour(holder, lookup(*n)?);
            }
            let Some(conn) = &e.connections else {
                continue;
            };
            for side in [1u8, 2] {
                let Some(wires) = conn.side(side) else {
                    continue;
                };
                for (color, targets) in [(WireColor::Red, &wires.red), (WireColor::Green, &wires.green)] {
                    for t in targets {
                        let link = CircuitLink {
                            color,
                            side,
                            target: Association::new(lookup(t.entity_id)?),
                            target_side: t.circuit_id.unwrap_or(1),
                        };
                        bp.entities.push_circuit(holder, link);
                    }
                }
            }
            for (side, wires) in [(1u8, &conn.cu0), (2, &conn.cu1)] {
                for w in wires {
                    let link = CopperLink {
                        side,
                        target: Association::new(lookup(w.entity_id)?),
                        target_side: w.wire_id.saturating_add(1),
                    };
                    bp.entities.push_copper(holder, link);
                }
            }
        }

        for t in &doc.tiles {
            bp.tiles
                .append(Tile::new(&t.name, t.position.x, t.position.y))?;
        }

        for s in &doc.schedules {
            let mut schedule = Schedule::new();
            for stop in &s.schedule {
                schedule.add_stop(&stop.station, stop.wait_conditions.clone());
            }
            for n in &s.locomotives {
                schedule.push_locomotive(lookup(*n)?);
            }
            bp.schedules.push(schedule);
        }

        log::debug!(
            "imported {} entities and {} tiles",
            bp.entities.len(),
            bp.tiles.len()
        );
        Ok(bp)
    }

    pub fn from_blueprint_string(catalog: Arc<dyn Catalog>, text: &str) -> Result<Self, BlueprintError> {
        let doc = codec::decode_document(text)?;
        Self::from_document(catalog, &doc)
    }
}

/// Detached copy of the node at `key` with its world position, for
/// moving entities between blueprints.
pub fn extract(collection: &EntityCollection, key: EntityKey) -> Option<EntityNode> {
    let mut node = collection.detached_copy(key)?;
    let world = collection.world_position(key)?;
    node.set_position(world).ok()?;
    Some(node)
}
