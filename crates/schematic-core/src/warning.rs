//! Non-fatal diagnostics.
//!
//! Operations that complete despite a questionable input (overlapping
//! footprints, over-long wires, unrecognized fields) report a [`Warning`]
//! instead of failing. Warnings are collected in a [`Diagnostics`] sink and
//! mirrored to the `log` facade at `warn` level.

use crate::geometry::Vector;

/// A condition worth reporting that does not abort the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A newly placed object overlaps an existing one.
    Overlap {
        entity: String,
        other: String,
        position: Vector,
    },
    /// A wire is longer than either endpoint supports.
    WireDistance {
        from: String,
        to: String,
        distance: f64,
        max: f64,
    },
    /// An entity holds more power neighbours than the game allows.
    ConnectionCount { entity: String, count: usize },
    /// Side 2 was requested on an entity that only has one circuit side.
    SingleSidedCircuit { entity: String, side: u8 },
    /// The kind is missing from the catalog; a placeholder was used.
    UnknownKind { kind: String },
    /// The tile kind is missing from the catalog.
    UnknownTile { kind: String },
    /// A field the catalog does not know for this kind. Kept verbatim.
    UnknownField { kind: String, field: String },
    /// A value that is representable but outside the sensible range.
    IndexRange {
        kind: String,
        field: String,
        value: u64,
        limit: u64,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Overlap {
                entity,
                other,
                position,
            } => write!(
                f,
                "{entity} at ({}, {}) overlaps {other}",
                position.x, position.y
            ),
            Warning::WireDistance {
                from,
                to,
                distance,
                max,
            } => write!(
                f,
                "wire between {from} and {to} is {distance:.2} tiles long (max {max:.2})"
            ),
            Warning::ConnectionCount { entity, count } => {
                write!(f, "{entity} has {count} power neighbours (max 5)")
            }
            Warning::SingleSidedCircuit { entity, side } => {
                write!(f, "{entity} has no circuit side {side}")
            }
            Warning::UnknownKind { kind } => write!(f, "unknown entity kind '{kind}'"),
            Warning::UnknownTile { kind } => write!(f, "unknown tile kind '{kind}'"),
            Warning::UnknownField { kind, field } => {
                write!(f, "unknown field '{field}' for '{kind}'")
            }
            Warning::IndexRange {
                kind,
                field,
                value,
                limit,
            } => write!(f, "'{field}' = {value} on '{kind}' exceeds {limit}"),
        }
    }
}

/// Collected warnings for one owner (collection, blueprint).
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn extend<I: IntoIterator<Item = Warning>>(&mut self, warnings: I) {
        for w in warnings {
            self.warn(w);
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Drain all collected warnings.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_drains() {
        let mut diag = Diagnostics::new();
        diag.warn(Warning::UnknownKind {
            kind: "modded-thing".into(),
        });
        assert_eq!(diag.len(), 1);
        let taken = diag.take();
        assert_eq!(taken.len(), 1);
        assert!(diag.is_empty());
    }

    #[test]
    fn display_mentions_subjects() {
        let w = Warning::WireDistance {
            from: "pole A".into(),
            to: "pole B".into(),
            distance: 12.0,
            max: 7.5,
        };
        let msg = w.to_string();
        assert!(msg.contains("pole A"), "got: {msg}");
        assert!(msg.contains("7.50"), "got: {msg}");
    }
}
