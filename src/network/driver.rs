//! Session Driver
//!
//! Runs a [`RaceSession`] on a tokio task. Local input, inbound peer bytes
//! and the race clock are merged into one `select!` loop so the session
//! only ever sees one event at a time.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn, debug};

use crate::core::vec2::Vec2;
use crate::race::state::{PlayerId, RaceState};
use crate::network::observer::RaceObserver;
use crate::network::session::RaceSession;
use crate::network::transport::{Inbound, Transport};

/// Command queue depth.
const COMMAND_BUFFER: usize = 64;

/// Local events for the driven session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// The match layer connected these remote players.
    MatchStarted(Vec<PlayerId>),
    /// Local steering update.
    Steering {
        /// Horizontal steering component.
        dx: f32,
        /// Vertical steering component.
        dy: f32,
        /// Car rotation.
        rotation: f32,
    },
    /// Local car position, for lap detection.
    Position(Vec2),
    /// Local lap finished, bypassing the tracker.
    LapComplete,
    /// The match layer lost the match.
    MatchEnded,
    /// Stop the driver.
    Shutdown,
}

/// Driver errors.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The driver task has stopped.
    #[error("session driver stopped")]
    Stopped,
}

/// Sends commands to a running driver.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl DriverHandle {
    /// Queue a raw command.
    pub async fn send(&self, command: SessionCommand) -> Result<(), DriverError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DriverError::Stopped)
    }

    /// Report the connected remote players.
    pub async fn match_started(&self, remote_players: Vec<PlayerId>) -> Result<(), DriverError> {
        self.send(SessionCommand::MatchStarted(remote_players)).await
    }

    /// Broadcast a steering update.
    pub async fn steer(&self, dx: f32, dy: f32, rotation: f32) -> Result<(), DriverError> {
        self.send(SessionCommand::Steering { dx, dy, rotation }).await
    }

    /// Feed the local car position.
    pub async fn update_position(&self, position: Vec2) -> Result<(), DriverError> {
        self.send(SessionCommand::Position(position)).await
    }

    /// Report a finished lap.
    pub async fn lap_complete(&self) -> Result<(), DriverError> {
        self.send(SessionCommand::LapComplete).await
    }

    /// Report that the match was lost.
    pub async fn match_ended(&self) -> Result<(), DriverError> {
        self.send(SessionCommand::MatchEnded).await
    }

    /// Stop the driver.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.send(SessionCommand::Shutdown).await
    }
}

/// Owns a session and feeds it.
pub struct RaceDriver<T, O> {
    session: RaceSession<T, O>,
    commands: mpsc::Receiver<SessionCommand>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    tick_duration: Duration,
}

impl<T: Transport, O: RaceObserver> RaceDriver<T, O> {
    /// Wrap a session. `inbound` delivers bytes from the peers.
    pub fn new(
        session: RaceSession<T, O>,
        inbound: mpsc::UnboundedReceiver<Inbound>,
    ) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = Self {
            session,
            commands: rx,
            inbound,
            tick_duration: Duration::from_micros(1_000_000 / crate::TICK_RATE as u64),
        };
        (driver, DriverHandle { commands: tx })
    }

    /// Override the race clock step.
    pub fn with_tick_duration(mut self, tick_duration: Duration) -> Self {
        self.tick_duration = tick_duration;
        self
    }

    /// Run until shut down or every handle is dropped. Returns the session
    /// for inspection.
    pub async fn run(mut self) -> RaceSession<T, O> {
        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut inbound_open = true;

        info!("Driver started for {}", self.session.local_id().short());

        loop {
            tokio::select! {
                biased;

                inbound = self.inbound.recv(), if inbound_open => {
                    match inbound {
                        Some(Inbound { sender, data }) => {
                            if let Err(e) = self.session.notify_transport_data(&sender, &data) {
                                warn!("Message from {} rejected: {}", sender.short(), e);
                            }
                        }
                        None => {
                            inbound_open = false;
                            self.peers_gone();
                        }
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(command) => self.apply(command),
                    }
                }
                _ = ticker.tick() => {
                    self.session.tick(self.tick_duration);
                }
            }
        }

        info!(
            "Driver stopped for {} in {:?}",
            self.session.local_id().short(),
            self.session.state()
        );
        self.session
    }

    fn apply(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::MatchStarted(remote_players) => {
                self.session.notify_match_started(&remote_players)
            }
            SessionCommand::Steering { dx, dy, rotation } => {
                self.session.submit_local_steering(dx, dy, rotation)
            }
            SessionCommand::Position(position) => {
                self.session.update_local_position(position).map(|_| ())
            }
            SessionCommand::LapComplete => self.session.submit_local_lap_complete(),
            SessionCommand::MatchEnded => {
                self.session.notify_match_ended();
                Ok(())
            }
            SessionCommand::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            debug!("Command rejected for {}: {}", self.session.local_id().short(), e);
        }
    }

    /// Every peer dropped its end of the mesh.
    fn peers_gone(&mut self) {
        match self.session.state() {
            // Peers are not known yet; a solo match never has any.
            RaceState::WaitingForMatch | RaceState::Done => {}
            _ => {
                info!("All peers of {} disconnected", self.session.local_id().short());
                self.session.notify_match_ended();
            }
        }
    }
}
