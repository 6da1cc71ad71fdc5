//! Transport Adapters
//!
//! The session only needs "send these bytes to every peer". Delivery of
//! inbound bytes happens outside the session: whoever owns the transport
//! hands `(sender, bytes)` to `RaceSession::notify_transport_data`.
//!
//! [`ChannelMesh`] connects in-process peers with tokio channels. It backs
//! the demo binary and the multi-peer tests.

use tokio::sync::mpsc;

use crate::race::state::PlayerId;

/// Transport errors. Any of these ends the match.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// A peer's receiving side has gone away.
    #[error("peer {0} disconnected")]
    PeerDisconnected(PlayerId),

    /// The transport was closed locally.
    #[error("transport closed")]
    Closed,
}

/// Broadcast channel to all other peers of the match.
pub trait Transport {
    /// Send `data` to every connected peer. Fire-and-forget: success means
    /// the bytes were handed off, not that they arrived.
    fn send_to_all(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

/// Bytes received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Transport-level identity of the sender.
    pub sender: PlayerId,
    /// Raw message bytes.
    pub data: Vec<u8>,
}

/// Transport that records outgoing bytes instead of sending them.
///
/// Useful for driving a single session by hand.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Vec<Vec<u8>>,
    fail: bool,
}

impl Outbox {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail.
    pub fn fail_sends(&mut self) {
        self.fail = true;
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Take everything sent so far.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for Outbox {
    fn send_to_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Closed);
        }
        self.sent.push(data.to_vec());
        Ok(())
    }
}

/// One peer's end of a [`ChannelMesh`].
#[derive(Debug)]
pub struct ChannelTransport {
    local: PlayerId,
    peers: Vec<(PlayerId, mpsc::UnboundedSender<Inbound>)>,
    closed: bool,
}

impl ChannelTransport {
    /// Local player this transport sends as.
    pub fn local_player(&self) -> &PlayerId {
        &self.local
    }

    /// Remote players reachable through this transport.
    pub fn remote_players(&self) -> Vec<PlayerId> {
        self.peers.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Stop sending. Later sends fail with [`TransportError::Closed`] and
    /// peers see this end's sender dropped.
    pub fn close(&mut self) {
        self.closed = true;
        self.peers.clear();
    }
}

impl Transport for ChannelTransport {
    fn send_to_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        for (peer, tx) in &self.peers {
            tx.send(Inbound {
                sender: self.local.clone(),
                data: data.to_vec(),
            })
            .map_err(|_| TransportError::PeerDisconnected(peer.clone()))?;
        }
        Ok(())
    }
}

/// Fully connected in-process mesh.
pub struct ChannelMesh;

impl ChannelMesh {
    /// Connect every player to every other. Returns, per player and in the
    /// given order, its transport and the receiver of its inbound bytes.
    pub fn connect(
        players: &[PlayerId],
    ) -> Vec<(ChannelTransport, mpsc::UnboundedReceiver<Inbound>)> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            players.iter().map(|_| mpsc::unbounded_channel()).unzip();

        players
            .iter()
            .enumerate()
            .zip(receivers)
            .map(|((i, local), rx)| {
                let peers = players
                    .iter()
                    .zip(&senders)
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, (id, tx))| (id.clone(), tx.clone()))
                    .collect();
                let transport = ChannelTransport {
                    local: local.clone(),
                    peers,
                    closed: false,
                };
                (transport, rx)
            })
            .collect()
    }
}
