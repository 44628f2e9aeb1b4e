//! Planar geometry for placed objects.
//!
//! World positions are `f64` vectors measured in tiles; tile positions are
//! integer grid coordinates. Collision footprints are sets of axis-aligned
//! boxes and rotated rectangles tagged with a [`CollisionMask`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Tolerance used for geometric comparisons.
pub const EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Vector
// ---------------------------------------------------------------------------

/// A 2D world-space coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(&self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Vector) -> f64 {
        (*self - other).length()
    }

    /// Rotate about the origin by `radians` (clockwise in screen space,
    /// since y grows downward).
    pub fn rotated(&self, radians: f64) -> Vector {
        let (sin, cos) = radians.sin_cos();
        Vector::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Rotate by a whole number of clockwise quarter turns. Exact, unlike
    /// [`Vector::rotated`].
    pub fn rotated_quarters(&self, quarters: u8) -> Vector {
        match quarters % 4 {
            0 => *self,
            1 => Vector::new(-self.y, self.x),
            2 => Vector::new(-self.x, -self.y),
            _ => Vector::new(self.y, -self.x),
        }
    }

    /// Component-wise floor into the integer grid.
    pub fn floor(&self) -> TilePosition {
        TilePosition::new(self.x.floor() as i32, self.y.floor() as i32)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Vector) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, rhs: Vector) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;
    fn mul(self, rhs: f64) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Vector {
    fn from((x, y): (f64, f64)) -> Self {
        Vector::new(x, y)
    }
}

impl From<TilePosition> for Vector {
    fn from(tile: TilePosition) -> Self {
        Vector::new(tile.x as f64, tile.y as f64)
    }
}

// ---------------------------------------------------------------------------
// TilePosition
// ---------------------------------------------------------------------------

/// A position on the integer tile grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TilePosition {
    pub x: i32,
    pub y: i32,
}

impl TilePosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &TilePosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Chebyshev (chessboard) distance to another position.
    pub fn chebyshev_distance(&self, other: &TilePosition) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
    }
}

impl Add for TilePosition {
    type Output = TilePosition;
    fn add(self, rhs: TilePosition) -> TilePosition {
        TilePosition::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for TilePosition {
    type Output = TilePosition;
    fn sub(self, rhs: TilePosition) -> TilePosition {
        TilePosition::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(i32, i32)> for TilePosition {
    fn from((x, y): (i32, i32)) -> Self {
        TilePosition::new(x, y)
    }
}

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// An axis-aligned bounding box. `top_left` is component-wise `<=`
/// `bottom_right`; the constructor normalizes its corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub top_left: Vector,
    pub bottom_right: Vector,
}

impl Aabb {
    pub fn new(a: Vector, b: Vector) -> Self {
        Self {
            top_left: Vector::new(a.x.min(b.x), a.y.min(b.y)),
            bottom_right: Vector::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(Vector::new(x1, y1), Vector::new(x2, y2))
    }

    /// A box of the given size centered on the origin.
    pub fn centered(width: f64, height: f64) -> Self {
        Self::from_coords(-width / 2.0, -height / 2.0, width / 2.0, height / 2.0)
    }

    /// The degenerate box containing exactly one point.
    pub fn point(p: Vector) -> Self {
        Self {
            top_left: p,
            bottom_right: p,
        }
    }

    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }

    pub fn center(&self) -> Vector {
        (self.top_left + self.bottom_right) * 0.5
    }

    /// Inclusive point containment.
    pub fn contains_point(&self, p: Vector) -> bool {
        p.x >= self.top_left.x
            && p.x <= self.bottom_right.x
            && p.y >= self.top_left.y
            && p.y <= self.bottom_right.y
    }

    /// Strict overlap: boxes that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.top_left.x < other.bottom_right.x
            && self.bottom_right.x > other.top_left.x
            && self.top_left.y < other.bottom_right.y
            && self.bottom_right.y > other.top_left.y
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.contains_point(other.top_left) && self.contains_point(other.bottom_right)
    }

    /// Whether a circle intersects this box.
    pub fn overlaps_circle(&self, center: Vector, radius: f64) -> bool {
        let nearest = Vector::new(
            center.x.clamp(self.top_left.x, self.bottom_right.x),
            center.y.clamp(self.top_left.y, self.bottom_right.y),
        );
        nearest.distance(center) <= radius
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            top_left: Vector::new(
                self.top_left.x.min(other.top_left.x),
                self.top_left.y.min(other.top_left.y),
            ),
            bottom_right: Vector::new(
                self.bottom_right.x.max(other.bottom_right.x),
                self.bottom_right.y.max(other.bottom_right.y),
            ),
        }
    }

    /// Union of two optional boxes, where `None` means empty.
    pub fn merge(a: Option<Aabb>, b: Option<Aabb>) -> Option<Aabb> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    pub fn translated(&self, offset: Vector) -> Aabb {
        Aabb {
            top_left: self.top_left + offset,
            bottom_right: self.bottom_right + offset,
        }
    }

    /// Rotate about the origin by whole clockwise quarter turns.
    pub fn rotated_quarters(&self, quarters: u8) -> Aabb {
        Aabb::new(
            self.top_left.rotated_quarters(quarters),
            self.bottom_right.rotated_quarters(quarters),
        )
    }

    pub fn corners(&self) -> [Vector; 4] {
        [
            self.top_left,
            Vector::new(self.bottom_right.x, self.top_left.y),
            self.bottom_right,
            Vector::new(self.top_left.x, self.bottom_right.y),
        ]
    }

    /// Width and height in whole tiles covered by the box.
    pub fn tile_dimensions(&self) -> (u32, u32) {
        let w = (self.bottom_right.x.ceil() - self.top_left.x.floor()).max(0.0);
        let h = (self.bottom_right.y.ceil() - self.top_left.y.floor()).max(0.0);
        (w as u32, h as u32)
    }
}

// ---------------------------------------------------------------------------
// Rect (rotated rectangle)
// ---------------------------------------------------------------------------

/// A rectangle rotated about its center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: Vector,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in radians.
    pub angle: f64,
}

impl Rect {
    pub fn new(center: Vector, width: f64, height: f64, angle: f64) -> Self {
        Self {
            center,
            width,
            height,
            angle,
        }
    }

    pub fn from_aabb(aabb: &Aabb, angle: f64) -> Self {
        Self::new(aabb.center(), aabb.width(), aabb.height(), angle)
    }

    pub fn corners(&self) -> [Vector; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            Vector::new(-hw, -hh),
            Vector::new(hw, -hh),
            Vector::new(hw, hh),
            Vector::new(-hw, hh),
        ]
        .map(|c| c.rotated(self.angle) + self.center)
    }

    pub fn contains_point(&self, p: Vector) -> bool {
        let local = (p - self.center).rotated(-self.angle);
        local.x.abs() <= self.width / 2.0 + EPSILON && local.y.abs() <= self.height / 2.0 + EPSILON
    }

    pub fn bounding_box(&self) -> Aabb {
        let corners = self.corners();
        let mut bb = Aabb::point(corners[0]);
        for c in &corners[1..] {
            bb = bb.union(&Aabb::point(*c));
        }
        bb
    }
}

// ---------------------------------------------------------------------------
// Shape / CollisionSet
// ---------------------------------------------------------------------------

/// One primitive of a collision footprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Aabb(Aabb),
    Rect(Rect),
}

impl Shape {
    pub fn bounding_box(&self) -> Aabb {
        match self {
            Shape::Aabb(b) => *b,
            Shape::Rect(r) => r.bounding_box(),
        }
    }

    pub fn contains_point(&self, p: Vector) -> bool {
        match self {
            Shape::Aabb(b) => b.contains_point(p),
            Shape::Rect(r) => r.contains_point(p),
        }
    }

    pub fn translated(&self, offset: Vector) -> Shape {
        match self {
            Shape::Aabb(b) => Shape::Aabb(b.translated(offset)),
            Shape::Rect(r) => Shape::Rect(Rect {
                center: r.center + offset,
                ..*r
            }),
        }
    }

    /// Rotate about the origin. Quarter turns keep boxes axis-aligned.
    pub fn rotated(&self, radians: f64) -> Shape {
        if let Some(quarters) = quarter_turns(radians) {
            return match self {
                Shape::Aabb(b) => Shape::Aabb(b.rotated_quarters(quarters)),
                Shape::Rect(r) => Shape::Rect(Rect {
                    center: r.center.rotated_quarters(quarters),
                    angle: r.angle + radians,
                    ..*r
                }),
            };
        }
        match self {
            Shape::Aabb(b) => {
                let r = Rect::from_aabb(b, 0.0);
                Shape::Rect(Rect {
                    center: r.center.rotated(radians),
                    angle: radians,
                    ..r
                })
            }
            Shape::Rect(r) => Shape::Rect(Rect {
                center: r.center.rotated(radians),
                angle: r.angle + radians,
                ..*r
            }),
        }
    }

    fn corners(&self) -> [Vector; 4] {
        match self {
            Shape::Aabb(b) => b.corners(),
            Shape::Rect(r) => r.corners(),
        }
    }

    /// Strict overlap between two shapes using the separating axis test.
    pub fn overlaps(&self, other: &Shape) -> bool {
        if let (Shape::Aabb(a), Shape::Aabb(b)) = (self, other) {
            return a.overlaps(b);
        }
        if !self.bounding_box().overlaps(&other.bounding_box()) {
            return false;
        }
        let a = self.corners();
        let b = other.corners();
        for poly in [&a, &b] {
            for i in 0..2 {
                let edge = poly[i + 1] - poly[i];
                let axis = Vector::new(-edge.y, edge.x);
                if axis.length() < EPSILON {
                    continue;
                }
                let (a_min, a_max) = project(&a, axis);
                let (b_min, b_max) = project(&b, axis);
                if a_max <= b_min + EPSILON || b_max <= a_min + EPSILON {
                    return false;
                }
            }
        }
        true
    }
}

fn project(corners: &[Vector; 4], axis: Vector) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for c in corners {
        let d = c.dot(axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

/// Number of clockwise quarter turns if `radians` is a multiple of 90°.
fn quarter_turns(radians: f64) -> Option<u8> {
    let quarters = radians / std::f64::consts::FRAC_PI_2;
    let rounded = quarters.round();
    if (quarters - rounded).abs() < 1e-9 {
        Some(rounded.rem_euclid(4.0) as u8)
    } else {
        None
    }
}

/// A footprint made of one or more shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollisionSet {
    pub shapes: Vec<Shape>,
}

impl CollisionSet {
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// A single axis-aligned box.
    pub fn from_aabb(aabb: Aabb) -> Self {
        Self {
            shapes: vec![Shape::Aabb(aabb)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        self.shapes
            .iter()
            .map(Shape::bounding_box)
            .reduce(|a, b| a.union(&b))
    }

    pub fn contains_point(&self, p: Vector) -> bool {
        self.shapes.iter().any(|s| s.contains_point(p))
    }

    pub fn overlaps(&self, other: &CollisionSet) -> bool {
        self.shapes
            .iter()
            .any(|a| other.shapes.iter().any(|b| a.overlaps(b)))
    }

    pub fn overlaps_aabb(&self, aabb: &Aabb) -> bool {
        let boxed = Shape::Aabb(*aabb);
        self.shapes.iter().any(|s| s.overlaps(&boxed))
    }

    pub fn translated(&self, offset: Vector) -> CollisionSet {
        CollisionSet {
            shapes: self.shapes.iter().map(|s| s.translated(offset)).collect(),
        }
    }

    pub fn rotated(&self, radians: f64) -> CollisionSet {
        CollisionSet {
            shapes: self.shapes.iter().map(|s| s.rotated(radians)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// CollisionMask
// ---------------------------------------------------------------------------

/// Set of collision layers. Two footprints collide only if their masks
/// share at least one layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollisionMask(pub BTreeSet<String>);

impl CollisionMask {
    pub fn new<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(layers.into_iter().map(Into::into).collect())
    }

    /// The layers most buildings occupy.
    pub fn object() -> Self {
        Self::new(["item-layer", "object-layer", "player-layer", "water-tile"])
    }

    pub fn intersects(&self, other: &CollisionMask) -> bool {
        self.0.iter().any(|layer| other.0.contains(layer))
    }

    pub fn contains(&self, layer: &str) -> bool {
        self.0.contains(layer)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
