//! Race Session
//!
//! Drives one peer through a match: token exchange, start arbitration,
//! lap bookkeeping and game over. The session is single-threaded; the
//! [`RaceDriver`](super::driver::RaceDriver) serializes every event source
//! onto it.
//!
//! ```text
//! WaitingForMatch ──match started──▶ WaitingForRandomNumber ──order complete──▶ WaitingForStart
//!        │                                                                        │
//!        └───────────────────────match started, order already complete───────────┤
//!                                                                                 ▼
//!                                   Done ◀──game over / match ended── Playing ◀── rank 0 starts
//!                                                                                 or GameBegin received
//! ```

use std::time::Duration;
use tracing::{info, warn, error, debug};

use crate::core::rng::TokenSource;
use crate::core::vec2::Vec2;
use crate::race::lap::{LapProgress, LapTracker};
use crate::race::level::LevelType;
use crate::race::ordering::{PeerOrder, PeerOrderResolver, TokenOutcome};
use crate::race::state::{LapCounters, PlayerId, RaceState};
use crate::network::observer::RaceObserver;
use crate::network::protocol::{self, Message, ProtocolError};
use crate::network::transport::{Transport, TransportError};

/// Configuration for a race session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Laps to win.
    pub laps: u32,
    /// Race clock. `None` races until someone finishes.
    pub time_limit: Option<Duration>,
    /// Track centre for lap detection, in scene units.
    pub track_center: Vec2,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::for_level(LevelType::default(), Vec2::ZERO)
    }
}

impl SessionConfig {
    /// Config for a level of the built-in table.
    pub fn for_level(level: LevelType, track_center: Vec2) -> Self {
        let details = level.details();
        Self {
            laps: details.laps,
            time_limit: Some(details.time_limit()),
            track_center,
        }
    }
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Operation not valid in the current state.
    #[error("invalid session state {0:?}")]
    InvalidState(RaceState),

    /// Race not in progress.
    #[error("match not in progress")]
    MatchNotInProgress,

    /// Message from a player the session does not know.
    #[error("unknown peer {0}")]
    UnknownPeer(PlayerId),

    /// Undecodable message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Send failed; the match has been ended.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// One peer's view of a race.
pub struct RaceSession<T, O> {
    local_id: PlayerId,
    config: SessionConfig,
    state: RaceState,
    resolver: PeerOrderResolver,
    /// Local peer holds rank 0 in the complete order.
    is_player1: bool,
    /// GameBegin arrived before our order completed.
    pending_begin: bool,
    player_index: Option<usize>,
    laps: LapCounters,
    lap_tracker: LapTracker,
    time_remaining: Option<Duration>,
    match_ended_reported: bool,
    transport: T,
    observer: O,
}

impl<T: Transport, O: RaceObserver> RaceSession<T, O> {
    /// Create a session and draw the local token.
    pub fn new(
        local_id: PlayerId,
        config: SessionConfig,
        tokens: Box<dyn TokenSource>,
        transport: T,
        observer: O,
    ) -> Self {
        let resolver = PeerOrderResolver::new(local_id.clone(), tokens);
        debug!("Session for {} drew token {}", local_id.short(), resolver.local_token());

        Self {
            lap_tracker: LapTracker::new(config.track_center),
            time_remaining: config.time_limit,
            local_id,
            config,
            state: RaceState::WaitingForMatch,
            resolver,
            is_player1: false,
            pending_begin: false,
            player_index: None,
            laps: LapCounters::default(),
            match_ended_reported: false,
            transport,
            observer,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Local player id.
    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    /// Current phase.
    pub fn state(&self) -> RaceState {
        self.state
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Local ordering token.
    pub fn local_token(&self) -> u32 {
        self.resolver.local_token()
    }

    /// Current peer order.
    pub fn order(&self) -> &PeerOrder {
        self.resolver.order()
    }

    /// Whether every peer's token is known and distinct.
    pub fn received_all_tokens(&self) -> bool {
        self.resolver.is_complete()
    }

    /// Whether the local player is rank 0.
    pub fn is_player1(&self) -> bool {
        self.is_player1
    }

    /// Local car index, once the race has started.
    pub fn player_index(&self) -> Option<usize> {
        self.player_index
    }

    /// Remaining laps for a player.
    pub fn remaining_laps(&self, player_id: &PlayerId) -> Option<u32> {
        self.laps.remaining(player_id)
    }

    /// All lap counters.
    pub fn lap_counters(&self) -> &LapCounters {
        &self.laps
    }

    /// Local car's lap tracker.
    pub fn lap_tracker(&self) -> &LapTracker {
        &self.lap_tracker
    }

    /// Time left on the race clock.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.time_remaining
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// The observer, mutably.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    // =========================================================================
    // Collaborator entry points
    // =========================================================================

    /// The match layer connected everyone. Broadcasts our token and, if the
    /// order is already complete and we rank first, starts the race.
    pub fn notify_match_started(&mut self, remote_players: &[PlayerId]) -> Result<(), SessionError> {
        if self.state != RaceState::WaitingForMatch {
            return Err(SessionError::InvalidState(self.state));
        }

        info!(
            "Match started for {} with {} remote players",
            self.local_id.short(),
            remote_players.len()
        );

        self.resolver.set_expected_peers(remote_players.len() + 1);
        self.laps = LapCounters::new(
            remote_players.iter().chain(std::iter::once(&self.local_id)),
            self.config.laps,
        );

        let complete = self.resolver.is_complete();
        self.set_state(if complete {
            RaceState::WaitingForStart
        } else {
            RaceState::WaitingForRandomNumber
        });
        self.refresh_rank();

        self.broadcast(Message::RandomNumber(self.resolver.local_token()))?;

        if complete {
            self.order_settled()?;
        }
        Ok(())
    }

    /// Bytes arrived from `sender`.
    pub fn notify_transport_data(&mut self, sender: &PlayerId, data: &[u8]) -> Result<(), SessionError> {
        let message = match protocol::decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed message from {}: {}", sender.short(), e);
                return Err(e.into());
            }
        };
        self.handle_message(sender, message)
    }

    /// The match layer lost the match (disconnect, error). Ends the session.
    pub fn notify_match_ended(&mut self) {
        info!("Match ended for {} in {:?}", self.local_id.short(), self.state);
        self.end_match();
    }

    /// Broadcast a local steering update.
    pub fn submit_local_steering(&mut self, dx: f32, dy: f32, rotation: f32) -> Result<(), SessionError> {
        if !self.state.is_playing() {
            return Err(SessionError::MatchNotInProgress);
        }
        self.broadcast(Message::Move { dx, dy, rotation })
    }

    /// Feed the local car's position to the lap tracker. A completed lap is
    /// submitted automatically.
    pub fn update_local_position(&mut self, position: Vec2) -> Result<LapProgress, SessionError> {
        if !self.state.is_playing() {
            return Err(SessionError::MatchNotInProgress);
        }

        let progress = self.lap_tracker.update(position);
        if progress == LapProgress::LapCompleted {
            self.submit_local_lap_complete()?;
        }
        Ok(progress)
    }

    /// The local car finished a lap: count it and tell the peers.
    pub fn submit_local_lap_complete(&mut self) -> Result<(), SessionError> {
        if !self.state.is_playing() {
            return Err(SessionError::MatchNotInProgress);
        }

        let remaining = self
            .laps
            .complete_lap(&self.local_id)
            .ok_or_else(|| SessionError::UnknownPeer(self.local_id.clone()))?;
        info!("{} completed a lap, {} to go", self.local_id.short(), remaining);

        self.broadcast(Message::LapComplete)?;

        if remaining == 0 {
            self.finish(true);
        }
        Ok(())
    }

    /// Advance the race clock by one simulation step.
    pub fn tick(&mut self, elapsed: Duration) {
        if !self.state.is_playing() {
            return;
        }
        let Some(remaining) = self.time_remaining else {
            return;
        };

        let remaining = remaining.saturating_sub(elapsed);
        self.time_remaining = Some(remaining);
        if remaining.is_zero() {
            info!("Time expired for {}", self.local_id.short());
            self.finish(false);
        }
    }

    // =========================================================================
    // Message handling
    // =========================================================================

    fn handle_message(&mut self, sender: &PlayerId, message: Message) -> Result<(), SessionError> {
        if self.state == RaceState::Done {
            debug!("Ignoring {:?} from {} after race end", message.kind(), sender.short());
            return Ok(());
        }

        match message {
            Message::RandomNumber(token) => self.handle_random_number(sender, token),
            Message::GameBegin => self.handle_game_begin(sender),
            Message::Move { dx, dy, rotation } => {
                #[cfg(feature = "debug-tracing")]
                tracing::trace!("Move from {}: dx={} dy={} rot={}", sender.short(), dx, dy, rotation);

                let index = self
                    .resolver
                    .rank_of(sender)
                    .ok_or_else(|| SessionError::UnknownPeer(sender.clone()))?;
                self.observer.on_peer_position_update(index, dx, dy, rotation);
                Ok(())
            }
            Message::LapComplete => self.handle_lap_complete(sender),
            Message::GameOver => {
                debug!("GameOver from {} ignored", sender.short());
                Ok(())
            }
        }
    }

    fn handle_random_number(&mut self, sender: &PlayerId, token: u32) -> Result<(), SessionError> {
        if self.state.is_playing() {
            debug!("Late token {} from {} ignored", token, sender.short());
            return Ok(());
        }

        debug!("Received token {} from {}", token, sender.short());

        let tie = match self.resolver.receive(sender, token) {
            TokenOutcome::Tie { new_token } => {
                info!("Token tie with {}, rebroadcasting {}", sender.short(), new_token);
                self.broadcast(Message::RandomNumber(new_token))?;
                true
            }
            TokenOutcome::Accepted | TokenOutcome::Discarded => false,
        };

        self.refresh_rank();

        if !tie && self.resolver.is_complete() {
            if self.state == RaceState::WaitingForRandomNumber {
                self.set_state(RaceState::WaitingForStart);
            }
            self.order_settled()?;
        }
        Ok(())
    }

    fn handle_game_begin(&mut self, sender: &PlayerId) -> Result<(), SessionError> {
        match self.state {
            RaceState::WaitingForStart => {
                self.begin_as_follower();
            }
            RaceState::WaitingForMatch | RaceState::WaitingForRandomNumber => {
                debug!("GameBegin from {} before order complete, deferring", sender.short());
                self.pending_begin = true;
            }
            RaceState::Playing | RaceState::Done => {
                debug!("Duplicate GameBegin from {} ignored", sender.short());
            }
        }
        Ok(())
    }

    fn handle_lap_complete(&mut self, sender: &PlayerId) -> Result<(), SessionError> {
        let remaining = self
            .laps
            .complete_lap(sender)
            .ok_or_else(|| SessionError::UnknownPeer(sender.clone()))?;
        debug!("{} completed a lap, {} to go", sender.short(), remaining);

        if remaining == 0 && self.state.is_playing() {
            info!("{} finished first", sender.short());
            self.finish(false);
        }
        Ok(())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Called in `WaitingForStart` once the order is complete: follow a
    /// GameBegin we already saw, or start the race if we rank first.
    fn order_settled(&mut self) -> Result<(), SessionError> {
        if self.state != RaceState::WaitingForStart {
            return Ok(());
        }

        info!(
            "Peer order settled for {}: rank {:?}, digest {}",
            self.local_id.short(),
            self.resolver.local_rank(),
            hex::encode(&self.resolver.order().digest()[..8])
        );

        if self.pending_begin {
            self.begin_as_follower();
            Ok(())
        } else {
            self.try_start_game()
        }
    }

    /// Rank 0 starts the race. No-op for everyone else.
    fn try_start_game(&mut self) -> Result<(), SessionError> {
        if !(self.is_player1 && self.state == RaceState::WaitingForStart) {
            return Ok(());
        }

        info!("{} is player 1, starting race", self.local_id.short());
        self.set_state(RaceState::Playing);
        self.broadcast(Message::GameBegin)?;
        self.assign_player_index(0);
        Ok(())
    }

    fn begin_as_follower(&mut self) {
        self.pending_begin = false;
        self.set_state(RaceState::Playing);

        match self.resolver.local_rank() {
            Some(index) => self.assign_player_index(index),
            None => warn!("{} missing from its own order", self.local_id.short()),
        }
    }

    fn assign_player_index(&mut self, index: usize) {
        info!("{} races as player index {}", self.local_id.short(), index);
        self.player_index = Some(index);
        self.observer.on_assigned_player_index(index);
    }

    fn refresh_rank(&mut self) {
        if self.resolver.is_complete() {
            self.is_player1 = self.resolver.local_rank() == Some(0);
        }
    }

    fn finish(&mut self, won: bool) {
        if self.state == RaceState::Done {
            return;
        }
        info!("Race over for {}: {}", self.local_id.short(), if won { "won" } else { "lost" });
        self.set_state(RaceState::Done);
        self.observer.on_game_over(won);
    }

    fn end_match(&mut self) {
        self.set_state(RaceState::Done);
        if !self.match_ended_reported {
            self.match_ended_reported = true;
            self.observer.on_match_ended();
        }
    }

    fn set_state(&mut self, next: RaceState) {
        if self.state == next {
            return;
        }
        debug_assert!(self.state.can_advance_to(next), "{:?} -> {:?}", self.state, next);
        debug!("{}: {:?} -> {:?}", self.local_id.short(), self.state, next);
        self.state = next;
    }

    /// Encode and send. A failed send ends the match.
    fn broadcast(&mut self, message: Message) -> Result<(), SessionError> {
        let data = protocol::encode(&message)?;
        if let Err(e) = self.transport.send_to_all(&data) {
            error!("Failed to send {:?} from {}: {}", message.kind(), self.local_id.short(), e);
            self.end_match();
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedTokens;
    use crate::network::observer::RaceEvent;
    use crate::network::transport::Outbox;
    use std::f32::consts::PI;

    type TestSession = RaceSession<Outbox, Vec<RaceEvent>>;

    fn session(id: &str, tokens: Vec<u32>) -> TestSession {
        session_with(id, tokens, SessionConfig::default())
    }

    fn session_with(id: &str, tokens: Vec<u32>, config: SessionConfig) -> TestSession {
        RaceSession::new(
            PlayerId::new(id),
            config,
            Box::new(ScriptedTokens::new(tokens, 7)),
            Outbox::new(),
            Vec::new(),
        )
    }

    fn sent_messages(session: &mut TestSession) -> Vec<Message> {
        session
            .transport_mut()
            .drain()
            .iter()
            .map(|bytes| protocol::decode(bytes).unwrap())
            .collect()
    }

    fn token_bytes(token: u32) -> Vec<u8> {
        protocol::encode(&Message::RandomNumber(token)).unwrap()
    }

    fn bytes(message: Message) -> Vec<u8> {
        protocol::encode(&message).unwrap()
    }

    /// Two-peer session that has reached `Playing`, local peer ranked `rank`.
    fn playing(rank: usize, config: SessionConfig) -> TestSession {
        let (local, remote) = if rank == 0 { (100, 50) } else { (50, 100) };
        let mut s = session_with("G:local", vec![local], config);
        let peer = PlayerId::new("G:peer");
        s.notify_match_started(&[peer.clone()]).unwrap();
        s.notify_transport_data(&peer, &token_bytes(remote)).unwrap();
        if rank != 0 {
            s.notify_transport_data(&peer, &bytes(Message::GameBegin)).unwrap();
        }
        assert_eq!(s.state(), RaceState::Playing);
        s.transport_mut().drain();
        s.observer_mut().clear();
        s
    }

    #[test]
    fn test_match_start_broadcasts_token() {
        let mut s = session("G:a", vec![10]);
        s.notify_match_started(&[PlayerId::new("G:b")]).unwrap();

        assert_eq!(s.state(), RaceState::WaitingForRandomNumber);
        assert_eq!(sent_messages(&mut s), vec![Message::RandomNumber(10)]);
        assert_eq!(s.remaining_laps(&PlayerId::new("G:b")), Some(s.config().laps));
        assert_eq!(s.remaining_laps(&PlayerId::new("G:a")), Some(s.config().laps));
    }

    #[test]
    fn test_match_start_twice_rejected() {
        let mut s = session("G:a", vec![10]);
        s.notify_match_started(&[]).unwrap();
        assert!(matches!(
            s.notify_match_started(&[]),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_solo_match_starts_immediately() {
        let mut s = session("G:a", vec![10]);
        s.notify_match_started(&[]).unwrap();

        assert_eq!(s.state(), RaceState::Playing);
        assert!(s.is_player1());
        assert_eq!(
            sent_messages(&mut s),
            vec![Message::RandomNumber(10), Message::GameBegin]
        );
        assert_eq!(s.observer(), &vec![RaceEvent::AssignedPlayerIndex(0)]);
    }

    #[test]
    fn test_tokens_before_match_start_are_kept() {
        let mut s = session("G:a", vec![99]);
        let b = PlayerId::new("G:b");
        s.notify_transport_data(&b, &token_bytes(12)).unwrap();
        assert_eq!(s.state(), RaceState::WaitingForMatch);
        assert!(!s.received_all_tokens());

        s.notify_match_started(&[b]).unwrap();
        // Order already complete and we rank first
        assert_eq!(s.state(), RaceState::Playing);
        assert_eq!(
            sent_messages(&mut s),
            vec![Message::RandomNumber(99), Message::GameBegin]
        );
    }

    #[test]
    fn test_rank_zero_initiates() {
        let mut s = session("G:a", vec![80]);
        let b = PlayerId::new("G:b");
        s.notify_match_started(&[b.clone()]).unwrap();
        s.transport_mut().drain();

        s.notify_transport_data(&b, &token_bytes(20)).unwrap();

        assert_eq!(s.state(), RaceState::Playing);
        assert!(s.is_player1());
        assert_eq!(s.player_index(), Some(0));
        assert_eq!(sent_messages(&mut s), vec![Message::GameBegin]);
        assert_eq!(s.observer(), &vec![RaceEvent::AssignedPlayerIndex(0)]);
    }

    #[test]
    fn test_follower_waits_for_game_begin() {
        let mut s = session("G:a", vec![20]);
        let b = PlayerId::new("G:b");
        s.notify_match_started(&[b.clone()]).unwrap();
        s.transport_mut().drain();

        s.notify_transport_data(&b, &token_bytes(80)).unwrap();
        assert_eq!(s.state(), RaceState::WaitingForStart);
        assert!(!s.is_player1());
        assert!(sent_messages(&mut s).is_empty());
        assert!(s.observer().is_empty());

        s.notify_transport_data(&b, &bytes(Message::GameBegin)).unwrap();
        assert_eq!(s.state(), RaceState::Playing);
        assert_eq!(s.player_index(), Some(1));
        assert_eq!(s.observer(), &vec![RaceEvent::AssignedPlayerIndex(1)]);

        // A second GameBegin changes nothing
        s.notify_transport_data(&b, &bytes(Message::GameBegin)).unwrap();
        assert_eq!(s.observer().len(), 1);
    }

    #[test]
    fn test_early_game_begin_is_deferred() {
        let mut s = session("G:a", vec![20]);
        let b = PlayerId::new("G:b");
        s.notify_match_started(&[b.clone()]).unwrap();

        s.notify_transport_data(&b, &bytes(Message::GameBegin)).unwrap();
        assert_eq!(s.state(), RaceState::WaitingForRandomNumber);

        s.notify_transport_data(&b, &token_bytes(80)).unwrap();
        assert_eq!(s.state(), RaceState::Playing);
        assert_eq!(s.player_index(), Some(1));
    }

    #[test]
    fn test_tie_regenerates_and_rebroadcasts() {
        let mut s = session("G:a", vec![10, 10]);
        let b = PlayerId::new("G:b");
        s.notify_match_started(&[b.clone()]).unwrap();
        s.transport_mut().drain();

        s.notify_transport_data(&b, &token_bytes(10)).unwrap();
        assert_eq!(sent_messages(&mut s), vec![Message::RandomNumber(10)]);
        assert_eq!(s.state(), RaceState::WaitingForRandomNumber);
        assert_eq!(s.order().len(), 1);

        s.notify_transport_data(&b, &token_bytes(55)).unwrap();
        assert_eq!(s.state(), RaceState::WaitingForStart);
        assert_eq!(s.order().index_of(&b), Some(0));
        assert!(!s.is_player1());
    }

    #[test]
    fn test_replaced_token_cannot_complete_order() {
        // a and b tied on 10 elsewhere; a's redraw arrives before b's 10
        let mut s = session("G:c", vec![25]);
        let a = PlayerId::new("G:a");
        let b = PlayerId::new("G:b");
        s.notify_match_started(&[a.clone(), b.clone()]).unwrap();
        s.transport_mut().drain();

        s.notify_transport_data(&a, &token_bytes(10)).unwrap();
        s.notify_transport_data(&a, &token_bytes(20)).unwrap();
        s.notify_transport_data(&b, &token_bytes(10)).unwrap();
        assert_eq!(s.state(), RaceState::WaitingForRandomNumber);
        assert!(!s.received_all_tokens());
        assert!(sent_messages(&mut s).is_empty());

        s.notify_transport_data(&b, &token_bytes(30)).unwrap();
        assert_eq!(s.state(), RaceState::WaitingForStart);
        assert!(!s.is_player1());
        assert_eq!(s.order().index_of(&b), Some(0));
        assert!(sent_messages(&mut s).is_empty());
    }

    #[test]
    fn test_move_reports_sender_rank() {
        let mut s = playing(0, SessionConfig::default());
        let peer = PlayerId::new("G:peer");

        s.notify_transport_data(&peer, &bytes(Message::Move { dx: 0.5, dy: -0.25, rotation: PI }))
            .unwrap();
        assert_eq!(
            s.observer(),
            &vec![RaceEvent::PeerPositionUpdate { index: 1, dx: 0.5, dy: -0.25, rotation: PI }]
        );

        let stranger = PlayerId::new("G:stranger");
        let result = s.notify_transport_data(&stranger, &bytes(Message::GameOver));
        assert!(result.is_ok());
        let result = s.notify_transport_data(&stranger, &bytes(Message::Move { dx: 0.0, dy: 0.0, rotation: 0.0 }));
        assert!(matches!(result, Err(SessionError::UnknownPeer(_))));
    }

    #[test]
    fn test_steering_only_while_playing() {
        let mut s = session("G:a", vec![10]);
        assert!(matches!(
            s.submit_local_steering(1.0, 0.0, 0.0),
            Err(SessionError::MatchNotInProgress)
        ));

        let mut s = playing(1, SessionConfig::default());
        s.submit_local_steering(1.0, 0.0, 0.5).unwrap();
        assert_eq!(
            sent_messages(&mut s),
            vec![Message::Move { dx: 1.0, dy: 0.0, rotation: 0.5 }]
        );
    }

    #[test]
    fn test_local_laps_win_race() {
        let config = SessionConfig { laps: 2, ..SessionConfig::default() };
        let mut s = playing(0, config);

        s.submit_local_lap_complete().unwrap();
        assert_eq!(s.remaining_laps(s.local_id()), Some(1));
        assert_eq!(s.state(), RaceState::Playing);

        s.submit_local_lap_complete().unwrap();
        assert_eq!(s.state(), RaceState::Done);
        assert_eq!(sent_messages(&mut s), vec![Message::LapComplete, Message::LapComplete]);
        assert_eq!(s.observer(), &vec![RaceEvent::GameOver { won: true }]);
    }

    #[test]
    fn test_remote_laps_lose_race() {
        let config = SessionConfig { laps: 1, ..SessionConfig::default() };
        let mut s = playing(1, config);
        let peer = PlayerId::new("G:peer");

        s.notify_transport_data(&peer, &bytes(Message::LapComplete)).unwrap();
        assert_eq!(s.remaining_laps(&peer), Some(0));
        assert_eq!(s.state(), RaceState::Done);
        assert_eq!(s.observer(), &vec![RaceEvent::GameOver { won: false }]);

        // Messages after the end are ignored
        s.notify_transport_data(&peer, &bytes(Message::LapComplete)).unwrap();
        assert_eq!(s.observer().len(), 1);
    }

    #[test]
    fn test_positions_drive_lap_counter() {
        let config = SessionConfig { laps: 5, time_limit: None, track_center: Vec2::new(10.0, 20.0) };
        let center = config.track_center;
        let mut s = playing(0, config);

        let step = PI / 16.0;
        let mut bearing = -step / 2.0;
        while s.state() == RaceState::Playing {
            bearing += step;
            s.update_local_position(Vec2::from_bearing(center, 100.0, bearing)).unwrap();
        }

        assert_eq!(s.remaining_laps(s.local_id()), Some(0));
        assert_eq!(s.lap_tracker().laps_completed(), 5);
        assert_eq!(s.observer(), &vec![RaceEvent::GameOver { won: true }]);
        let laps_sent = sent_messages(&mut s)
            .into_iter()
            .filter(|m| *m == Message::LapComplete)
            .count();
        assert_eq!(laps_sent, 5);
        // Each lap lands three quarters into its revolution
        assert!(bearing > 9.0 * PI && bearing < 5.0 * 2.0 * PI);
    }

    #[test]
    fn test_time_limit_ends_race() {
        let config = SessionConfig { time_limit: Some(Duration::from_secs(1)), ..SessionConfig::default() };
        let mut s = playing(0, config);

        s.tick(Duration::from_millis(600));
        assert_eq!(s.state(), RaceState::Playing);
        assert_eq!(s.time_remaining(), Some(Duration::from_millis(400)));

        s.tick(Duration::from_millis(600));
        assert_eq!(s.state(), RaceState::Done);
        assert_eq!(s.observer(), &vec![RaceEvent::GameOver { won: false }]);
    }

    #[test]
    fn test_send_failure_ends_match() {
        let mut s = session("G:a", vec![10]);
        s.transport_mut().fail_sends();

        let result = s.notify_match_started(&[PlayerId::new("G:b")]);
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(s.state(), RaceState::Done);
        assert_eq!(s.observer(), &vec![RaceEvent::MatchEnded]);
    }

    #[test]
    fn test_match_ended_reported_once() {
        let mut s = playing(0, SessionConfig::default());
        s.notify_match_ended();
        s.notify_match_ended();
        assert_eq!(s.state(), RaceState::Done);
        assert_eq!(s.observer(), &vec![RaceEvent::MatchEnded]);
    }

    #[test]
    fn test_malformed_message_leaves_state_alone() {
        let mut s = session("G:a", vec![10]);
        s.notify_match_started(&[PlayerId::new("G:b")]).unwrap();

        let result = s.notify_transport_data(&PlayerId::new("G:b"), &[0xFF, 0, 0]);
        assert!(matches!(result, Err(SessionError::Protocol(_))));
        assert_eq!(s.state(), RaceState::WaitingForRandomNumber);
        assert!(s.observer().is_empty());
    }
}
