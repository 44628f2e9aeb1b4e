//! Circuit and copper wiring between entities in one collection.
//!
//! Each wire is stored on both endpoints as an [`Association`] plus side
//! metadata. Capability mismatches and bad colors or sides are errors and
//! change nothing; over-long wires and crowded poles are warnings.

use crate::association::Association;
use crate::collection::{EntityCollection, EntityRef};
use crate::entity::{CircuitLink, CopperLink, EntityNode, WireColor};
use crate::error::CollectionError;
use schematic_core::geometry::EPSILON;
use schematic_core::id::EntityKey;
use schematic_core::warning::Warning;

/// Power neighbours an entity may hold before a warning is raised.
pub const MAX_POWER_NEIGHBOURS: usize = 5;

fn check_side(side: u8) -> Result<u8, CollectionError> {
    match side {
        1 | 2 => Ok(side),
        other => Err(CollectionError::InvalidSide(other)),
    }
}

fn powered(node: &EntityNode) -> bool {
    let caps = node.capabilities();
    caps.power_connectable || caps.dual_power_connectable
}

impl EntityCollection {
    fn node(&self, key: EntityKey) -> Result<&EntityNode, CollectionError> {
        self.arena.get(key).ok_or(CollectionError::NotInCollection)
    }

    fn wire_length(&self, a: EntityKey, b: EntityKey) -> f64 {
        match (self.world_position(a), self.world_position(b)) {
            (Some(pa), Some(pb)) => pa.distance(pb),
            _ => 0.0,
        }
    }

    fn check_reach(&mut self, a: EntityKey, b: EntityKey, max: f64) {
        let distance = self.wire_length(a, b);
        if distance > max + EPSILON {
            let describe = |k| self.arena.get(k).map(EntityNode::describe).unwrap_or_default();
            let warning = Warning::WireDistance {
                from: describe(a),
                to: describe(b),
                distance,
                max,
            };
            self.diagnostics.warn(warning);
        }
    }

    // -- Circuit wires --

    /// Connect side `side_a` of `a` to side `side_b` of `b` with a `color`
    /// wire. Reconnecting an existing wire is a no-op.
    pub fn connect_circuit(
        &mut self,
        color: &str,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
        side_a: u8,
        side_b: u8,
    ) -> Result<(), CollectionError> {
        let color: WireColor = color.parse()?;
        let side_a = check_side(side_a)?;
        let side_b = check_side(side_b)?;
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        if a == b && side_a == side_b {
            return Err(CollectionError::SelfConnection);
        }

        let mut single_sided = Vec::new();
        let mut reach = f64::INFINITY;
        for (key, side) in [(a, side_a), (b, side_b)] {
            let node = self.node(key)?;
            let caps = node.capabilities();
            if !caps.circuit_connectable {
                return Err(CollectionError::NotCircuitConnectable(node.kind().to_string()));
            }
            if side == 2 && !caps.dual_circuit_connectable {
                single_sided.push(Warning::SingleSidedCircuit {
                    entity: node.describe(),
                    side,
                });
            }
            reach = reach.min(node.prototype().circuit_wire_max_distance);
        }

        self.diagnostics.extend(single_sided);
        self.check_reach(a, b, reach);
        for (holder, side, target, target_side) in [(a, side_a, b, side_b), (b, side_b, a, side_a)] {
            let link = CircuitLink {
                color,
                side,
                target: Association::new(target),
                target_side,
            };
            self.push_circuit(holder, link);
        }
        log::debug!("connected {} circuit wire", color.as_str());
        Ok(())
    }

    /// Remove a circuit wire. Missing wires are ignored.
    pub fn disconnect_circuit(
        &mut self,
        color: &str,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
        side_a: u8,
        side_b: u8,
    ) -> Result<(), CollectionError> {
        let color: WireColor = color.parse()?;
        let side_a = check_side(side_a)?;
        let side_b = check_side(side_b)?;
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        let ends = [(a, side_a, b, side_b), (b, side_b, a, side_a)];
        for (holder, side, target, target_side) in ends {
            if let Some(node) = self.arena.get_mut(holder) {
                node.circuit.retain(|l| {
                    !(l.color == color
                        && l.side == side
                        && l.target.key() == target
                        && l.target_side == target_side)
                });
            }
        }
        Ok(())
    }

    pub fn remove_all_circuit_connections(&mut self) {
        for (_, node) in self.arena.iter_mut() {
            node.circuit.clear();
        }
    }

    // -- Copper wires --

    /// Connect `a` and `b` with copper wire.
    ///
    /// Between two poles this records a neighbour on each. When one end is
    /// a power switch, `side` picks the switch terminal and a copper link is
    /// recorded instead.
    pub fn connect_power(
        &mut self,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
        side: u8,
    ) -> Result<(), CollectionError> {
        let side = check_side(side)?;
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        if a == b {
            return Err(CollectionError::SelfConnection);
        }
        let (na, nb) = (self.node(a)?, self.node(b)?);
        for node in [na, nb] {
            if !powered(node) {
                return Err(CollectionError::NotPowerConnectable(node.kind().to_string()));
            }
        }
        let (dual_a, dual_b) = (
            na.capabilities().dual_power_connectable,
            nb.capabilities().dual_power_connectable,
        );
        if dual_a && dual_b {
            return Err(CollectionError::DualPowerConnection {
                a: na.describe(),
                b: nb.describe(),
            });
        }
        let reach = na
            .prototype()
            .maximum_wire_distance
            .min(nb.prototype().maximum_wire_distance);

        self.check_reach(a, b, reach);
        if dual_a || dual_b {
            let (switch, pole) = if dual_a { (a, b) } else { (b, a) };
            let at_switch = CopperLink {
                side,
                target: Association::new(pole),
                target_side: 1,
            };
            let at_pole = CopperLink {
                side: 1,
                target: Association::new(switch),
                target_side: side,
            };
            self.push_copper(switch, at_switch);
            self.push_copper(pole, at_pole);
            log::debug!("connected copper wire to switch terminal {side}");
            return Ok(());
        }

        for (holder, target) in [(a, b), (b, a)] {
            self.push_neighbour(holder, target);
        }
        for key in [a, b] {
            if let Some(node) = self.arena.get(key)
                && node.neighbours.len() > MAX_POWER_NEIGHBOURS
            {
                let warning = Warning::ConnectionCount {
                    entity: node.describe(),
                    count: node.neighbours.len(),
                };
                self.diagnostics.warn(warning);
            }
        }
        log::debug!("connected power neighbours");
        Ok(())
    }

    pub(crate) fn push_neighbour(&mut self, holder: EntityKey, target: EntityKey) {
        let target = Association::new(target);
        if let Some(node) = self.arena.get_mut(holder)
            && !node.neighbours.contains(&target)
        {
            node.neighbours.push(target);
        }
    }

    pub(crate) fn push_copper(&mut self, holder: EntityKey, link: CopperLink) {
        if let Some(node) = self.arena.get_mut(holder)
            && !node.copper.contains(&link)
        {
            node.copper.push(link);
        }
    }

    pub(crate) fn push_circuit(&mut self, holder: EntityKey, link: CircuitLink) {
        if let Some(node) = self.arena.get_mut(holder)
            && !node.circuit.contains(&link)
        {
            node.circuit.push(link);
        }
    }

    /// Remove every copper wire between `a` and `b`.
    pub fn disconnect_power(
        &mut self,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
    ) -> Result<(), CollectionError> {
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        for (holder, target) in [(a, b), (b, a)] {
            if let Some(node) = self.arena.get_mut(holder) {
                node.neighbours.retain(|n| n.key() != target);
                node.copper.retain(|l| l.target.key() != target);
            }
        }
        Ok(())
    }

    pub fn remove_all_power_connections(&mut self) {
        for (_, node) in self.arena.iter_mut() {
            node.neighbours.clear();
            node.copper.clear();
        }
    }

    fn saturated(&self, key: EntityKey) -> bool {
        self.arena
            .get(key)
            .is_none_or(|n| n.neighbours.len() >= MAX_POWER_NEIGHBOURS)
    }

    /// Connect every pole to nearby poles, nearest first.
    ///
    /// Candidates lie within the shorter reach of the two poles. With
    /// `prefer_axis`, candidates sharing an x or y coordinate are ranked
    /// ahead of the rest; with `only_axis`, the rest are dropped. A pole
    /// already holding [`MAX_POWER_NEIGHBOURS`] neighbours takes no more.
    /// Returns the number of wires added.
    pub fn auto_wire_power(&mut self, prefer_axis: bool, only_axis: bool) -> usize {
        let poles: Vec<(EntityKey, _, f64)> = self
            .flatten()
            .into_iter()
            .filter_map(|k| {
                let node = self.arena.get(k)?;
                let caps = node.capabilities();
                (caps.power_connectable && !caps.dual_power_connectable).then_some(())?;
                Some((k, self.world_position(k)?, node.prototype().maximum_wire_distance))
            })
            .collect();

        let mut added = 0;
        for &(key, pos, reach) in &poles {
            let mut candidates: Vec<(bool, f64, EntityKey)> = poles
                .iter()
                .filter(|(other, _, _)| *other != key)
                .filter_map(|&(other, other_pos, other_reach)| {
                    let distance = pos.distance(other_pos);
                    let aligned = (pos.x - other_pos.x).abs() < EPSILON
                        || (pos.y - other_pos.y).abs() < EPSILON;
                    (distance <= reach.min(other_reach) + EPSILON && (aligned || !only_axis))
                        .then_some((prefer_axis && !aligned, distance, other))
                })
                .collect();
            candidates.sort_by(|x, y| x.0.cmp(&y.0).then(x.1.total_cmp(&y.1)));

            for (_, _, other) in candidates {
                if self.saturated(key) {
                    break;
                }
                let already = self
                    .arena
                    .get(key)
                    .is_some_and(|n| n.neighbours.contains(&Association::new(other)));
                if already || self.saturated(other) {
                    continue;
                }
                self.push_neighbour(key, other);
                self.push_neighbour(other, key);
                added += 1;
            }
        }
        log::debug!("auto-wired {added} power connections");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitySpec;
    use schematic_core::catalog::vanilla;
    use schematic_core::geometry::Vector;

    fn place(c: &mut EntityCollection, kind: &str, x: i32, y: i32) -> EntityKey {
        c.append_spec(EntitySpec::new(kind).tile_position(x, y))
            .unwrap()
            .key()
    }

    fn vanilla_collection() -> EntityCollection {
        EntityCollection::new(vanilla())
    }

    // -----------------------------------------------------------------------
    // Copper
    // -----------------------------------------------------------------------

    #[test]
    fn power_between_poles_is_mutual_and_idempotent() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "small-electric-pole", 0, 0);
        let b = place(&mut c, "small-electric-pole", 6, 0);
        c.connect_power(a, b, 1).unwrap();
        c.connect_power(b, a, 1).unwrap();
        assert_eq!(c.get(a).unwrap().neighbours(), &[Association::new(b)]);
        assert_eq!(c.get(b).unwrap().neighbours(), &[Association::new(a)]);
        assert!(c.warnings().is_empty());
    }

    #[test]
    fn container_is_not_power_connectable() {
        let mut c = vanilla_collection();
        let chest = place(&mut c, "wooden-chest", 0, 0);
        let pole = place(&mut c, "small-electric-pole", 5, 0);
        let err = c.connect_power(chest, pole, 1).unwrap_err();
        assert_eq!(err, CollectionError::NotPowerConnectable("wooden-chest".into()));
        assert!(c.get(pole).unwrap().neighbours().is_empty());
    }

    #[test]
    fn keys_from_another_collection_are_refused() {
        let mut mine = vanilla_collection();
        let mut theirs = vanilla_collection();
        let a1 = place(&mut mine, "small-electric-pole", 0, 0);
        let a2 = place(&mut mine, "small-electric-pole", 4, 0);
        let b1 = place(&mut theirs, "small-electric-pole", 0, 0);
        assert_ne!(a1, b1);
        assert_eq!(mine.connect_power(a2, b1, 1), Err(CollectionError::NotInCollection));
        assert_eq!(
            mine.connect_circuit("red", a2, b1, 1, 1),
            Err(CollectionError::NotInCollection)
        );
        assert!(mine.get(a1).unwrap().neighbours().is_empty());
        assert!(mine.get(a2).unwrap().neighbours().is_empty());
        assert!(mine.get(a2).unwrap().circuit_links().is_empty());
        assert!(theirs.get(b1).unwrap().neighbours().is_empty());
    }

    #[test]
    fn two_switches_cannot_connect() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "power-switch", 0, 0);
        let b = place(&mut c, "power-switch", 4, 0);
        assert!(matches!(
            c.connect_power(a, b, 1),
            Err(CollectionError::DualPowerConnection { .. })
        ));
    }

    #[test]
    fn switch_gets_copper_links() {
        let mut c = vanilla_collection();
        let switch = place(&mut c, "power-switch", 0, 0);
        let pole = place(&mut c, "small-electric-pole", 4, 0);
        c.connect_power(pole, switch, 2).unwrap();
        let s = c.get(switch).unwrap();
        assert!(s.neighbours().is_empty());
        assert_eq!(
            s.copper_links(),
            &[CopperLink { side: 2, target: Association::new(pole), target_side: 1 }]
        );
        let p = c.get(pole).unwrap();
        assert_eq!(p.copper_links()[0].target_side, 2);

        c.disconnect_power(switch, pole).unwrap();
        assert!(c.get(switch).unwrap().copper_links().is_empty());
        assert!(c.get(pole).unwrap().copper_links().is_empty());
    }

    #[test]
    fn long_wire_warns_but_connects() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "small-electric-pole", 0, 0);
        let b = place(&mut c, "small-electric-pole", 20, 0);
        c.connect_power(a, b, 1).unwrap();
        assert_eq!(c.get(a).unwrap().neighbours().len(), 1);
        assert!(matches!(c.warnings(), [Warning::WireDistance { .. }]));
    }

    #[test]
    fn sixth_neighbour_warns() {
        let mut c = vanilla_collection();
        let hub = place(&mut c, "substation", 0, 0);
        for i in 0..6 {
            let other = place(&mut c, "small-electric-pole", 2 + i, 2);
            c.connect_power(hub, other, 1).unwrap();
        }
        assert_eq!(c.get(hub).unwrap().neighbours().len(), 6);
        assert!(matches!(
            c.warnings(),
            [Warning::ConnectionCount { count: 6, .. }]
        ));
    }

    #[test]
    fn self_connection_rejected() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "small-electric-pole", 0, 0);
        assert_eq!(c.connect_power(a, a, 1), Err(CollectionError::SelfConnection));
        assert_eq!(
            c.connect_circuit("red", a, a, 1, 1),
            Err(CollectionError::SelfConnection)
        );
    }

    // -----------------------------------------------------------------------
    // Circuit
    // -----------------------------------------------------------------------

    #[test]
    fn circuit_validation() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "iron-chest", 0, 0);
        let b = place(&mut c, "iron-chest", 2, 0);
        let furnace = place(&mut c, "stone-furnace", 6, 0);
        assert!(matches!(
            c.connect_circuit("blue", a, b, 1, 1),
            Err(CollectionError::InvalidWireColor(_))
        ));
        assert_eq!(
            c.connect_circuit("red", a, b, 3, 1),
            Err(CollectionError::InvalidSide(3))
        );
        assert!(matches!(
            c.connect_circuit("red", a, furnace, 1, 1),
            Err(CollectionError::NotCircuitConnectable(_))
        ));
        assert!(c.get(a).unwrap().circuit_links().is_empty());
    }

    #[test]
    fn circuit_connect_and_disconnect() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "iron-chest", 0, 0);
        let comb = place(&mut c, "arithmetic-combinator", 2, 0);
        c.connect_circuit("green", a, comb, 1, 2).unwrap();
        c.connect_circuit("green", a, comb, 1, 2).unwrap();
        assert_eq!(c.get(a).unwrap().circuit_links().len(), 1);
        let back = c.get(comb).unwrap().circuit_links()[0];
        assert_eq!((back.side, back.target_side), (2, 1));
        assert_eq!(back.target, Association::new(a));
        assert!(c.warnings().is_empty());

        c.disconnect_circuit("green", comb, a, 2, 1).unwrap();
        assert!(c.get(a).unwrap().circuit_links().is_empty());
        assert!(c.get(comb).unwrap().circuit_links().is_empty());
        // Missing wires are ignored.
        c.disconnect_circuit("red", a, comb, 1, 1).unwrap();
    }

    #[test]
    fn side_two_on_single_sided_warns() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "iron-chest", 0, 0);
        let b = place(&mut c, "iron-chest", 1, 0);
        c.connect_circuit("red", a, b, 2, 1).unwrap();
        assert!(matches!(
            c.warnings(),
            [Warning::SingleSidedCircuit { side: 2, .. }]
        ));
        assert_eq!(c.get(a).unwrap().circuit_links().len(), 1);
    }

    #[test]
    fn combinator_may_loop_onto_itself() {
        let mut c = vanilla_collection();
        let comb = place(&mut c, "decider-combinator", 0, 0);
        c.connect_circuit("red", comb, comb, 1, 2).unwrap();
        assert_eq!(c.get(comb).unwrap().circuit_links().len(), 2);
    }

    // -----------------------------------------------------------------------
    // Bulk
    // -----------------------------------------------------------------------

    #[test]
    fn bulk_removal_reaches_group_members() {
        let mut c = vanilla_collection();
        let mut diag = schematic_core::warning::Diagnostics::new();
        let mut pole = |x: f64| {
            EntitySpec::new("small-electric-pole")
                .position(x, 0.5)
                .build(
                    c.catalog().as_ref(),
                    crate::config::ValidationMode::Strict,
                    &mut diag,
                )
                .unwrap()
        };
        let group = EntityNode::group(Some("g"), Vector::ZERO, vec![pole(0.5), pole(3.5)]);
        c.append(group).unwrap();
        let members = c.flatten();
        c.connect_power(members[0], members[1], 1).unwrap();
        c.connect_circuit("red", members[0], members[1], 1, 1).unwrap();
        c.remove_all_power_connections();
        c.remove_all_circuit_connections();
        for k in members {
            let n = c.get(k).unwrap();
            assert!(n.neighbours().is_empty() && n.circuit_links().is_empty());
        }
    }

    #[test]
    fn auto_wire_caps_neighbours() {
        let mut c = vanilla_collection();
        for (x, y) in [(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1), (1, 2)] {
            place(&mut c, "small-electric-pole", x, y);
        }
        let added = c.auto_wire_power(true, false);
        assert!(added > 0);
        for key in c.flatten() {
            assert!(c.get(key).unwrap().neighbours().len() <= MAX_POWER_NEIGHBOURS);
        }
    }

    #[test]
    fn auto_wire_only_axis() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "small-electric-pole", 0, 0);
        let b = place(&mut c, "small-electric-pole", 3, 0);
        let diagonal = place(&mut c, "small-electric-pole", 2, 2);
        c.auto_wire_power(false, true);
        assert_eq!(c.get(a).unwrap().neighbours(), &[Association::new(b)]);
        assert!(c.get(diagonal).unwrap().neighbours().is_empty());
    }

    #[test]
    fn auto_wire_respects_reach() {
        let mut c = vanilla_collection();
        let a = place(&mut c, "small-electric-pole", 0, 0);
        place(&mut c, "small-electric-pole", 30, 0);
        assert_eq!(c.auto_wire_power(false, false), 0);
        assert!(c.get(a).unwrap().neighbours().is_empty());
    }
}
