//! 2D math and hit-region tests shared by the server resolver and the client renderer

use crate::{ARENA_HEIGHT, ARENA_WIDTH, PLAYER_RADIUS};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::ops::{Add, Mul, Sub};

/// A point or vector in arena space. `y` grows downwards, matching screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    /// Returns the unit vector, or zero for a zero-length input.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.length();
        if mag == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / mag, self.y / mag)
        }
    }

    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product.
    pub fn cross(&self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Left-hand perpendicular (rotated -90 degrees in screen space).
    pub fn perpendicular(&self) -> Vec2 {
        Vec2::new(self.y, -self.x)
    }

    pub fn lerp(&self, to: Vec2, t: f32) -> Vec2 {
        *self + (to - *self) * t
    }

    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    pub fn from_angle(radians: f32) -> Vec2 {
        Vec2::new(radians.cos(), radians.sin())
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

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Ease-out-cubic curve, `1 - (1 - t)^3`, with `t` clamped to `[0, 1]`.
///
/// Decelerates toward the endpoint and reaches exactly `1.0` at `t = 1`.
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Keeps a player-sized body fully inside the arena.
pub fn clamp_to_arena(position: Vec2) -> Vec2 {
    Vec2::new(
        position.x.clamp(PLAYER_RADIUS, ARENA_WIDTH - PLAYER_RADIUS),
        position.y.clamp(PLAYER_RADIUS, ARENA_HEIGHT - PLAYER_RADIUS),
    )
}

/// Filled circle. A zero radius only contains the exact center.
pub fn in_circle(point: Vec2, center: Vec2, radius: f32) -> bool {
    point.distance(center) <= radius
}

/// Donut band between `inner` and `outer`, both edges inclusive.
pub fn in_ring(point: Vec2, center: Vec2, inner: f32, outer: f32) -> bool {
    let d = point.distance(center);
    d >= inner && d <= outer
}

/// Rectangle of the given width centred on the segment `start -> end`.
///
/// A zero-length segment has no hit region.
pub fn in_rotated_rect(point: Vec2, start: Vec2, end: Vec2, width: f32) -> bool {
    let axis = end - start;
    let len = axis.length();
    if len == 0.0 {
        return false;
    }

    let dir = axis * (1.0 / len);
    let rel = point - start;
    let along = rel.dot(dir);
    let across = rel.cross(dir).abs();

    (0.0..=len).contains(&along) && across <= width / 2.0
}

/// Circular sector around `direction` with a full opening of `angle` radians.
pub fn in_cone(point: Vec2, origin: Vec2, direction: f32, angle: f32, radius: f32) -> bool {
    let rel = point - origin;
    let d = rel.length();
    if d > radius {
        return false;
    }
    if d == 0.0 {
        return true;
    }

    normalize_angle(rel.angle() - direction).abs() <= angle / 2.0
}

/// Wraps an angle into `(-PI, PI]`.
pub fn normalize_angle(radians: f32) -> f32 {
    let mut a = radians % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}
