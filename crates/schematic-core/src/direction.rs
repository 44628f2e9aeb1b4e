//! Discrete directions and continuous orientations.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// One of sixteen compass directions. North is up (negative y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Direction {
    #[default]
    North = 0,
    NorthNorthEast = 1,
    NorthEast = 2,
    EastNorthEast = 3,
    East = 4,
    EastSouthEast = 5,
    SouthEast = 6,
    SouthSouthEast = 7,
    South = 8,
    SouthSouthWest = 9,
    SouthWest = 10,
    WestSouthWest = 11,
    West = 12,
    WestNorthWest = 13,
    NorthWest = 14,
    NorthNorthWest = 15,
}

/// Error for a direction value outside `0..16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid direction {0}: expected a value in 0..16")]
pub struct InvalidDirection(pub u8);

impl Direction {
    /// The four cardinal directions.
    pub fn cardinals() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    pub fn from_u8(value: u8) -> Result<Direction, InvalidDirection> {
        use Direction::*;
        const ALL: [Direction; 16] = [
            North,
            NorthNorthEast,
            NorthEast,
            EastNorthEast,
            East,
            EastSouthEast,
            SouthEast,
            SouthSouthEast,
            South,
            SouthSouthWest,
            SouthWest,
            WestSouthWest,
            West,
            WestNorthWest,
            NorthWest,
            NorthNorthWest,
        ];
        ALL.get(value as usize).copied().ok_or(InvalidDirection(value))
    }

    pub fn is_cardinal(self) -> bool {
        (self as u8) % 4 == 0
    }

    /// Clockwise quarter turns from north, if cardinal.
    pub fn quarter_turns(self) -> Option<u8> {
        self.is_cardinal().then_some(self as u8 / 4)
    }

    /// Clockwise rotation from north, in radians.
    pub fn radians(self) -> f64 {
        (self as u8) as f64 * TAU / 16.0
    }

    pub fn opposite(self) -> Direction {
        self.rotate(8)
    }

    /// Rotate clockwise by `steps` sixteenths of a turn.
    pub fn rotate(self, steps: i32) -> Direction {
        let value = (self as i32 + steps).rem_euclid(16) as u8;
        // rem_euclid keeps the value in range.
        Direction::from_u8(value).unwrap_or_default()
    }

    pub fn to_orientation(self) -> Orientation {
        Orientation((self as u8) as f64 / 16.0)
    }
}

impl TryFrom<u8> for Direction {
    type Error = InvalidDirection;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Direction::from_u8(value)
    }
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> u8 {
        d as u8
    }
}

/// Continuous orientation in `[0, 1)`, as used by rolling stock.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Orientation(f64);

/// Error for an orientation outside `[0, 1)` or not finite.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid orientation {0}: expected a value in [0, 1)")]
pub struct InvalidOrientation(pub f64);

impl Orientation {
    pub fn new(value: f64) -> Result<Orientation, InvalidOrientation> {
        if value.is_finite() && (0.0..1.0).contains(&value) {
            Ok(Orientation(value))
        } else {
            Err(InvalidOrientation(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn radians(self) -> f64 {
        self.0 * TAU
    }

    /// Nearest of the sixteen discrete directions.
    pub fn to_direction(self) -> Direction {
        let step = (self.0 * 16.0).round() as i32;
        Direction::North.rotate(step)
    }
}
