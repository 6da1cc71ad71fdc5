//! Network Layer
//!
//! Wire codec, transport seam and the race session state machine.
//! Everything here is driven by external events; the session itself never
//! blocks or spawns.
//!
//! ## Module Structure
//!
//! - `protocol`: Fixed-size binary messages
//! - `transport`: Broadcast seam and the in-process channel mesh
//! - `observer`: Callbacks into the game scene
//! - `session`: Per-peer race state machine
//! - `driver`: Tokio task that serializes events onto a session

pub mod protocol;
pub mod transport;
pub mod observer;
pub mod session;
pub mod driver;

pub use protocol::{Message, MessageKind, ProtocolError, encode, decode};
pub use transport::{Transport, TransportError, Inbound, Outbox, ChannelTransport, ChannelMesh};
pub use observer::{RaceObserver, RaceEvent};
pub use session::{RaceSession, SessionConfig, SessionError};
pub use driver::{RaceDriver, DriverHandle, DriverError, SessionCommand};
