//! Race Logic Module
//!
//! Everything about a race that does not touch the wire.
//!
//! ## Module Structure
//!
//! - `state`: Player ids, race phases, lap counters
//! - `ordering`: Token exchange and peer ranking
//! - `lap`: Quadrant-based lap detection
//! - `level`: Per-difficulty lap count and time limit

pub mod state;
pub mod ordering;
pub mod lap;
pub mod level;

// Re-export key types
pub use state::{PlayerId, RaceState, LapCounters};
pub use ordering::{PeerToken, PeerOrder, PeerOrderResolver, TokenOutcome};
pub use lap::{LapTracker, LapProgress};
pub use level::{LevelType, LevelDetails, LevelTable};
