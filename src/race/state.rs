//! Race State Definitions
//!
//! Player identity, race phases and per-player lap counters.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Opaque player identifier handed out by the matchmaking layer.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier (UUID v4), for local peers without a
    /// matchmaking-assigned id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// RACE STATE
// =============================================================================

/// Phase of a race session.
///
/// Phases only move forward; `Done` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum RaceState {
    /// No match yet.
    #[default]
    WaitingForMatch = 0,
    /// Match running, exchanging peer tokens.
    WaitingForRandomNumber = 1,
    /// Order agreed, waiting for the rank-0 peer to start.
    WaitingForStart = 2,
    /// Race in progress.
    Playing = 3,
    /// Race over or match ended.
    Done = 4,
}

impl RaceState {
    /// Whether the race has started and not yet finished.
    #[inline]
    pub fn is_playing(self) -> bool {
        self == RaceState::Playing
    }

    /// Whether the session is finished for good.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self == RaceState::Done
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Skipping ahead is allowed (an order can complete before the match
    /// is reported started), going back never is.
    #[inline]
    pub fn can_advance_to(self, next: RaceState) -> bool {
        next > self
    }
}

// =============================================================================
// LAP COUNTERS
// =============================================================================

/// Remaining laps per player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapCounters {
    remaining: BTreeMap<PlayerId, u32>,
}

impl LapCounters {
    /// Give every listed player `laps` remaining laps.
    pub fn new<'a>(players: impl IntoIterator<Item = &'a PlayerId>, laps: u32) -> Self {
        Self {
            remaining: players.into_iter().map(|id| (id.clone(), laps)).collect(),
        }
    }

    /// Laps left for a player, if known.
    pub fn remaining(&self, player_id: &PlayerId) -> Option<u32> {
        self.remaining.get(player_id).copied()
    }

    /// Record one completed lap. Returns the laps left afterwards,
    /// or `None` for an unknown player. Never goes below zero.
    pub fn complete_lap(&mut self, player_id: &PlayerId) -> Option<u32> {
        let laps = self.remaining.get_mut(player_id)?;
        *laps = laps.saturating_sub(1);
        Some(*laps)
    }

    /// Whether the player has no laps left.
    pub fn is_finished(&self, player_id: &PlayerId) -> bool {
        self.remaining(player_id) == Some(0)
    }

    /// Number of tracked players.
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Whether no players are tracked.
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Iterate `(player, remaining)` in player id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, u32)> {
        self.remaining.iter().map(|(id, laps)| (id, *laps))
    }
}

// =============================================================================
// TESTS
// =============================================================================
