//! Track Bearing Arithmetic
//!
//! Angles are radians measured counter-clockwise from +X, the same
//! convention `f32::atan2` uses. Lap progress is measured on the bearing
//! turned by a half revolution and normalized into [0, 2π), so the
//! start/finish line at geometric bearing 0 sits at progress angle π.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// One quarter of a revolution.
pub const QUARTER_TURN: f32 = FRAC_PI_2;

/// A full revolution.
pub const FULL_TURN: f32 = TAU;

/// Progress angle of the start/finish line.
pub const START_FINISH_PROGRESS: f32 = PI;

/// Quadrants per lap.
pub const QUADRANTS: u8 = 4;

/// Tolerance for comparing accumulated angles.
pub const ANGLE_EPSILON: f32 = 1e-4;

/// Shift any angle into [0, 2π).
#[inline]
pub fn normalize_bearing(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(FULL_TURN);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= FULL_TURN {
        0.0
    } else {
        wrapped
    }
}

/// Progress angle for a geometric bearing from track centre.
#[inline]
pub fn progress_angle(bearing: f32) -> f32 {
    normalize_bearing(bearing + PI)
}

/// Angle of quadrant boundary `index` (0 → 0, 1 → π/2, 2 → π, 3 → 3π/2).
#[inline]
pub fn quadrant_angle(index: u8) -> f32 {
    (index % QUADRANTS) as f32 * QUARTER_TURN
}

/// Quadrant boundary index nearest to `angle`.
#[inline]
pub fn quadrant_index(angle: f32) -> u8 {
    let steps = (normalize_bearing(angle) / QUARTER_TURN).round() as u32;
    (steps % QUADRANTS as u32) as u8
}

/// Whether two angles are equal within [`ANGLE_EPSILON`].
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < ANGLE_EPSILON
}
