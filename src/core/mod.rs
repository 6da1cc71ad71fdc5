//! Core primitives.
//!
//! Bearing math, token generation and order digests. No knowledge of
//! peers, messages or race phases lives here.

pub mod angle;
pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use angle::{normalize_bearing, QUARTER_TURN, FULL_TURN, START_FINISH_PROGRESS, progress_angle};
pub use vec2::Vec2;
pub use rng::{DeterministicRng, ScriptedTokens, TokenSource};
pub use hash::{DigestHasher, OrderDigest};
