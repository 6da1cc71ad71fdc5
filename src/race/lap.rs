//! Lap Progress Tracking
//!
//! Detects completed laps from a car's bearing around the track centre,
//! without modelling the track itself. Bearings are turned by π first, so
//! the start/finish line (geometric bearing 0) is progress angle π. The
//! circuit is split into four quadrants; a lap is four forward quadrant
//! advances that bring the next expected boundary back to progress π.
//!
//! A step only counts when the car sits less than a quarter turn past the
//! next boundary. Reversing over the line, or jumping more than a quadrant
//! in one update, never advances progress.

use serde::{Serialize, Deserialize};

use crate::core::angle::{
    progress_angle, quadrant_angle, quadrant_index, QUADRANTS, QUARTER_TURN, START_FINISH_PROGRESS,
};
use crate::core::vec2::Vec2;

/// Result of one tracker update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LapProgress {
    /// Car did not pass the next boundary.
    NoProgress,
    /// Car passed a quadrant boundary.
    QuadrantAdvanced,
    /// Car passed the boundary that completes a lap.
    LapCompleted,
}

/// Per-car quadrant tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LapTracker {
    /// Track centre bearings are measured from.
    center: Vec2,
    /// Index of the next boundary to pass; its angle is
    /// `next_quadrant * π/2`. Kept as an index so returning to the
    /// start boundary is exact.
    next_quadrant: u8,
    /// Laps recognised so far.
    laps_completed: u32,
}

impl LapTracker {
    /// Quadrant index of the start/finish progress angle.
    pub const START_QUADRANT: u8 = 2;

    /// New tracker waiting for the car to cross the start/finish line.
    pub fn new(center: Vec2) -> Self {
        debug_assert_eq!(quadrant_index(START_FINISH_PROGRESS), Self::START_QUADRANT);
        Self {
            center,
            next_quadrant: Self::START_QUADRANT,
            laps_completed: 0,
        }
    }

    /// Progress angle of the next boundary the car must pass, in [0, 2π).
    pub fn next_progress_angle(&self) -> f32 {
        quadrant_angle(self.next_quadrant)
    }

    /// Laps recognised since creation or last reset.
    pub fn laps_completed(&self) -> u32 {
        self.laps_completed
    }

    /// Feed the car's current position.
    pub fn update(&mut self, position: Vec2) -> LapProgress {
        self.update_bearing(position.bearing_from(self.center))
    }

    /// Feed the car's geometric bearing from track centre. Any angle is
    /// accepted.
    pub fn update_bearing(&mut self, bearing: f32) -> LapProgress {
        let ahead = progress_angle(bearing) - self.next_progress_angle();
        if !(ahead > 0.0 && ahead < QUARTER_TURN) {
            return LapProgress::NoProgress;
        }

        self.next_quadrant = (self.next_quadrant + 1) % QUADRANTS;
        if self.next_quadrant == Self::START_QUADRANT {
            self.laps_completed += 1;
            LapProgress::LapCompleted
        } else {
            LapProgress::QuadrantAdvanced
        }
    }

    /// Forget all progress.
    pub fn reset(&mut self) {
        self.next_quadrant = Self::START_QUADRANT;
        self.laps_completed = 0;
    }
}

// =============================================================================
// TESTS
// =============================================================================
