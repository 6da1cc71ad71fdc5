//! # Circuit Racer Sync
//!
//! Peer-to-peer multiplayer core for Circuit Racer: message codec, peer
//! ordering, lap detection and the race session state machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CIRCUIT RACER SYNC                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Primitives                               │
//! │  ├── angle.rs     - Bearing normalization, quadrants         │
//! │  ├── vec2.rs      - 2D position                              │
//! │  ├── rng.rs       - Xorshift128+ token source                │
//! │  └── hash.rs      - Peer order digest                        │
//! │                                                              │
//! │  race/            - Race rules (no I/O)                      │
//! │  ├── state.rs     - Player ids, phases, lap counters         │
//! │  ├── ordering.rs  - Token exchange and ranking               │
//! │  ├── lap.rs       - Quadrant lap tracker                     │
//! │  └── level.rs     - Laps and time limit per level            │
//! │                                                              │
//! │  network/         - Event driven                             │
//! │  ├── protocol.rs  - Binary message codec                     │
//! │  ├── transport.rs - Broadcast seam, channel mesh             │
//! │  ├── observer.rs  - Callbacks to the game scene              │
//! │  ├── session.rs   - Race state machine                       │
//! │  └── driver.rs    - Tokio event loop                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Agreement
//!
//! There is no host. Every peer draws a 32-bit token, broadcasts it and
//! sorts all tokens descending. Ties are broken by the colliding peers
//! drawing again. Since every peer sorts the same set, they all agree on
//! who is rank 0; that peer alone sends `GameBegin`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod race;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::{DeterministicRng, TokenSource};
pub use race::state::{PlayerId, RaceState};
pub use race::level::LevelType;
pub use network::protocol::Message;
pub use network::session::{RaceSession, SessionConfig, SessionError};
pub use network::observer::{RaceObserver, RaceEvent};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
