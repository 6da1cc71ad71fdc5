//! Collaborator Callbacks
//!
//! The narrow interface through which the session reports to the game
//! scene. Implementations must not call back into the session.

use tokio::sync::mpsc;

/// Receives session outcomes.
pub trait RaceObserver {
    /// The match is over for a reason other than racing (disconnect,
    /// transport failure).
    fn on_match_ended(&mut self);

    /// The local player's car index, fixed once the race starts.
    fn on_assigned_player_index(&mut self, index: usize);

    /// A remote car's steering update. `index` is the sender's rank.
    fn on_peer_position_update(&mut self, index: usize, dx: f32, dy: f32, rotation: f32);

    /// The race finished.
    fn on_game_over(&mut self, did_local_player_win: bool);
}

/// Observer callbacks as data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RaceEvent {
    /// See [`RaceObserver::on_match_ended`].
    MatchEnded,
    /// See [`RaceObserver::on_assigned_player_index`].
    AssignedPlayerIndex(usize),
    /// See [`RaceObserver::on_peer_position_update`].
    PeerPositionUpdate {
        /// Sender rank.
        index: usize,
        /// Horizontal steering component.
        dx: f32,
        /// Vertical steering component.
        dy: f32,
        /// Car rotation.
        rotation: f32,
    },
    /// See [`RaceObserver::on_game_over`].
    GameOver {
        /// Whether the local player won.
        won: bool,
    },
}

/// Records events in memory, for a game loop that polls.
impl RaceObserver for Vec<RaceEvent> {
    fn on_match_ended(&mut self) {
        self.push(RaceEvent::MatchEnded);
    }

    fn on_assigned_player_index(&mut self, index: usize) {
        self.push(RaceEvent::AssignedPlayerIndex(index));
    }

    fn on_peer_position_update(&mut self, index: usize, dx: f32, dy: f32, rotation: f32) {
        self.push(RaceEvent::PeerPositionUpdate { index, dx, dy, rotation });
    }

    fn on_game_over(&mut self, did_local_player_win: bool) {
        self.push(RaceEvent::GameOver { won: did_local_player_win });
    }
}

/// Forwards events to another task. A dropped receiver is ignored: the
/// scene has gone away and nobody is listening.
impl RaceObserver for mpsc::UnboundedSender<RaceEvent> {
    fn on_match_ended(&mut self) {
        let _ = self.send(RaceEvent::MatchEnded);
    }

    fn on_assigned_player_index(&mut self, index: usize) {
        let _ = self.send(RaceEvent::AssignedPlayerIndex(index));
    }

    fn on_peer_position_update(&mut self, index: usize, dx: f32, dy: f32, rotation: f32) {
        let _ = self.send(RaceEvent::PeerPositionUpdate { index, dx, dy, rotation });
    }

    fn on_game_over(&mut self, did_local_player_win: bool) {
        let _ = self.send(RaceEvent::GameOver { won: did_local_player_win });
    }
}
