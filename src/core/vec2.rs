//! 2D Vector
//!
//! Minimal float vector for car positions and track geometry.
//! Only what lap tracking and the demo driver need.

use std::fmt;
use std::ops::{Add, Sub};
use serde::{Serialize, Deserialize};

use super::angle::normalize_bearing;

/// 2D vector with `f32` components, in scene units.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Point at `radius` from `center` along `bearing`.
    #[inline]
    pub fn from_bearing(center: Self, radius: f32, bearing: f32) -> Self {
        center + Self::new(radius * bearing.cos(), radius * bearing.sin())
    }

    /// Bearing of this point as seen from `center`, in [0, 2π).
    ///
    /// A point sitting exactly on `center` has bearing 0.
    #[inline]
    pub fn bearing_from(self, center: Self) -> f32 {
        let offset = self - center;
        normalize_bearing(offset.y.atan2(offset.x))
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.3}, {:.3})", self.x, self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================
