//! Geometry and collision probes.
//!
//! Everything here works on the continuous coordinate system of the game:
//! one tile is one unit of distance, `y` grows upward, a unit's position is
//! the centre of its feet. Angle helpers are wraparound-aware - raw
//! subtraction of two atan2 results near the +-pi seam produces spurious
//! near-2pi deltas, so all angular comparisons must go through
//! [`angle_delta`] / [`angle_between`].

use std::collections::BTreeMap;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::types::{Level, Tile, Unit};

/// Default tolerance for float comparisons, matching the engine's own
/// boundary epsilon.
pub const EPS: f64 = 1e-7;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn len(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Polar angle of the vector in radians, `(-pi, pi]`.
    #[inline]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle. `top > bottom` in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Square blast area centred on `pos`.
    pub fn around(pos: Vec2, radius: f64) -> Self {
        Self {
            left: pos.x - radius,
            top: pos.y + radius,
            right: pos.x + radius,
            bottom: pos.y - radius,
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.left > other.right
            || self.right < other.left
            || self.top < other.bottom
            || self.bottom > other.top)
    }

    pub fn shifted(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

#[inline]
pub fn approx_eq(a: f64, b: f64, precision: f64) -> bool {
    (a - b).abs() < precision
}

#[inline]
pub fn distance_sqr(a: Vec2, b: Vec2) -> f64 {
    (a.x - b.x) * (a.x - b.x) + (a.y - b.y) * (a.y - b.y)
}

/// Unsigned angle between two direction vectors, `[0, pi]`.
/// Degenerate (near-zero) vectors yield 0 rather than NaN.
pub fn angle_between(a: Vec2, b: Vec2) -> f64 {
    let lengths = a.len() * b.len();
    if lengths < EPS {
        return 0.0;
    }
    let cos = ((a.x * b.x + a.y * b.y) / lengths).clamp(-1.0, 1.0);
    cos.acos()
}

/// Unsigned difference of two angles folded across the +-pi seam, `[0, pi]`.
#[inline]
pub fn angle_delta(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs();
    if delta > std::f64::consts::PI {
        2.0 * std::f64::consts::PI - delta
    } else {
        delta
    }
}

/// Solid-tile probe for a swept rectangle.
///
/// `jump_down` relaxes platform and ladder support so the unit drops through
/// them. A platform only arrests a fall when the foot line was still above it
/// before the move (`supported_before_move` is the probe result at the
/// pre-move rectangle), which keeps a unit already inside a platform tile
/// from snagging on it.
pub fn wall_collision(
    rect: &Rect,
    level: &Level,
    jump_down: bool,
    supported_before_move: bool,
) -> bool {
    let mut hit = level.tile_at(rect.right, rect.bottom) == Tile::Wall
        || level.tile_at(rect.right, rect.top) == Tile::Wall
        || level.tile_at(rect.left, rect.bottom) == Tile::Wall
        || level.tile_at(rect.left, rect.top) == Tile::Wall;
    if !jump_down {
        hit = hit || ladder_collision(rect, level);
        if !supported_before_move {
            hit = hit
                || level.tile_at(rect.right, rect.bottom) == Tile::Platform
                || level.tile_at(rect.left, rect.bottom) == Tile::Platform;
        }
    }
    hit
}

/// Ladder probe along the rectangle's vertical centre line.
pub fn ladder_collision(rect: &Rect, level: &Level) -> bool {
    let x = (rect.left + rect.right) / 2.0;
    level.tile_at(x, rect.bottom) == Tile::Ladder
        || level.tile_at(x, (rect.bottom + rect.top) / 2.0) == Tile::Ladder
}

pub fn jump_pad_collision(rect: &Rect, level: &Level) -> bool {
    level.tile_at(rect.right, rect.bottom) == Tile::JumpPad
        || level.tile_at(rect.right, rect.top) == Tile::JumpPad
        || level.tile_at(rect.left, rect.bottom) == Tile::JumpPad
        || level.tile_at(rect.left, rect.top) == Tile::JumpPad
}

/// True when `rect` overlaps any unit other than `unit_id`.
pub fn units_collision(rect: &Rect, unit_id: i32, units: &BTreeMap<i32, Unit>) -> bool {
    units
        .iter()
        .any(|(id, unit)| *id != unit_id && rect.intersects(&unit.rect()))
}
