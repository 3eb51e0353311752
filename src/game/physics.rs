//! Continuous-space math: points, distances, bounded heading turns

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// A position in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Heading angle from this point toward another
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Clamp into the arena interior, `margin` away from every wall
    pub fn clamped(&self, margin: f64, world_size: f64) -> Point {
        Point {
            x: self.x.max(margin).min(world_size - margin),
            y: self.y.max(margin).min(world_size - margin),
        }
    }
}

/// Wrap an angle into (-π, π]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Signed shortest-path delta from `from` to `to`
pub fn angle_delta(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// Turn `current` toward `desired` by at most `max_step` radians along the
/// shortest angular path. The bound holds no matter how large the desired
/// delta is.
pub fn turn_toward(current: f64, desired: f64, max_step: f64) -> f64 {
    let delta = angle_delta(current, desired);
    let step = delta.clamp(-max_step, max_step);
    normalize_angle(current + step)
}
