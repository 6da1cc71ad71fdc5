//! Peer Ordering
//!
//! Derives a total order over peers from exchanged 32-bit tokens, with no
//! coordinator. Every peer sorts the same token set descending, so all
//! peers agree on ranks once the set is complete. Rank 0 starts the race.
//!
//! Collisions with the local token are resolved by redrawing the local
//! token and broadcasting it again. Both colliding peers see the tie, so
//! both redraw.
//!
//! A peer only changes its token after a tie, so every value a peer gives
//! up has collided and every other holder of it will redraw too. The
//! resolver retires such values: later arrivals of a retired value are
//! stale and dropped, except from the one peer known to have drawn it
//! afresh. Two remote peers showing the same value are both dropped until
//! their replacements arrive. Without this, a peer on a slow link could
//! complete its order with a token its owner has already replaced.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::hash::{DigestHasher, OrderDigest};
use crate::core::rng::TokenSource;
use crate::race::state::PlayerId;

/// A peer's ordering token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerToken {
    /// Peer the token belongs to.
    pub player_id: PlayerId,
    /// The token value. Higher ranks first.
    pub random_number: u32,
}

impl PeerToken {
    /// Create a token.
    pub fn new(player_id: PlayerId, random_number: u32) -> Self {
        Self { player_id, random_number }
    }
}

/// Peers sorted descending by token.
///
/// Never mutated in place: each update returns a new order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerOrder {
    entries: Vec<PeerToken>,
}

impl PeerOrder {
    /// An order holding only `token`.
    pub fn single(token: PeerToken) -> Self {
        Self { entries: vec![token] }
    }

    /// New order with `token` added, replacing any earlier entry for the
    /// same player, sorted descending by token.
    ///
    /// The sort is stable, so entries with equal tokens keep arrival order
    /// until the tie is resolved.
    pub fn with_token(&self, token: PeerToken) -> Self {
        let mut entries: Vec<PeerToken> = self
            .entries
            .iter()
            .filter(|entry| entry.player_id != token.player_id)
            .cloned()
            .collect();
        entries.push(token);
        entries.sort_by(|a, b| b.random_number.cmp(&a.random_number));
        Self { entries }
    }

    /// New order keeping only the entries `keep` accepts.
    pub fn retain(&self, keep: impl Fn(&PeerToken) -> bool) -> Self {
        Self {
            entries: self.entries.iter().filter(|entry| keep(entry)).cloned().collect(),
        }
    }

    /// Entries in rank order.
    pub fn entries(&self) -> &[PeerToken] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the order is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct token values.
    pub fn distinct_tokens(&self) -> usize {
        // Sorted, so equal values are adjacent
        let mut count = 0;
        let mut last = None;
        for entry in &self.entries {
            if last != Some(entry.random_number) {
                count += 1;
                last = Some(entry.random_number);
            }
        }
        count
    }

    /// Whether the order covers exactly `expected_peers` peers with
    /// pairwise distinct tokens.
    pub fn is_complete(&self, expected_peers: usize) -> bool {
        self.entries.len() == expected_peers && self.distinct_tokens() == expected_peers
    }

    /// Rank of a player, if present.
    pub fn index_of(&self, player_id: &PlayerId) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.player_id == player_id)
    }

    /// Token currently recorded for a player.
    pub fn token_of(&self, player_id: &PlayerId) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| &entry.player_id == player_id)
            .map(|entry| entry.random_number)
    }

    /// First player recorded with `random_number`.
    pub fn holder_of(&self, random_number: u32) -> Option<&PlayerId> {
        self.entries
            .iter()
            .find(|entry| entry.random_number == random_number)
            .map(|entry| &entry.player_id)
    }

    /// The rank-0 entry.
    pub fn first(&self) -> Option<&PeerToken> {
        self.entries.first()
    }

    /// SHA-256 digest of the order, identical on every peer that agrees.
    pub fn digest(&self) -> OrderDigest {
        let mut hasher = DigestHasher::for_peer_order();
        hasher.update_u32(self.entries.len() as u32);
        for entry in &self.entries {
            hasher.update_str(entry.player_id.as_str());
            hasher.update_u32(entry.random_number);
        }
        hasher.finalize()
    }
}

/// What happened to a received token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenOutcome {
    /// The token was recorded in the order.
    Accepted,
    /// The token equalled ours; we drew `new_token`, which must be broadcast.
    Tie {
        /// The replacement local token.
        new_token: u32,
    },
    /// The token was stale, or collided with another remote peer's token.
    /// Nothing was recorded for the sender.
    Discarded,
}

/// Runs the token exchange for the local peer.
pub struct PeerOrderResolver {
    local_id: PlayerId,
    local_token: u32,
    order: PeerOrder,
    expected_peers: Option<usize>,
    /// Collided values. A retired value is only accepted again from the
    /// player stored with it, whose next token is known to be a fresh draw.
    retired: BTreeMap<u32, Option<PlayerId>>,
    tokens: Box<dyn TokenSource>,
}

impl PeerOrderResolver {
    /// Draw the local token and start an order containing only us.
    pub fn new(local_id: PlayerId, mut tokens: Box<dyn TokenSource>) -> Self {
        let local_token = tokens.next_token();
        let order = PeerOrder::single(PeerToken::new(local_id.clone(), local_token));
        Self {
            local_id,
            local_token,
            order,
            expected_peers: None,
            retired: BTreeMap::new(),
            tokens,
        }
    }

    /// Our current token.
    pub fn local_token(&self) -> u32 {
        self.local_token
    }

    /// Current order snapshot.
    pub fn order(&self) -> &PeerOrder {
        &self.order
    }

    /// Peer count (including us) the order must reach. Unknown until the
    /// match reports its players.
    pub fn expected_peers(&self) -> Option<usize> {
        self.expected_peers
    }

    /// Set how many peers, including us, take part.
    pub fn set_expected_peers(&mut self, expected_peers: usize) {
        self.expected_peers = Some(expected_peers);
    }

    /// Whether every expected peer has a distinct token in the order.
    pub fn is_complete(&self) -> bool {
        self.expected_peers
            .map_or(false, |expected| self.order.is_complete(expected))
    }

    /// Our rank in the current order.
    pub fn local_rank(&self) -> Option<usize> {
        self.order.index_of(&self.local_id)
    }

    /// Rank of any peer in the current order.
    pub fn rank_of(&self, player_id: &PlayerId) -> Option<usize> {
        self.order.index_of(player_id)
    }

    /// Whether `random_number` has collided and been given up.
    pub fn is_retired(&self, random_number: u32) -> bool {
        self.retired.contains_key(&random_number)
    }

    /// Process a token received from `sender`.
    ///
    /// A token equal to ours is not recorded: the sender saw the same
    /// collision and will send a fresh one.
    pub fn receive(&mut self, sender: &PlayerId, random_number: u32) -> TokenOutcome {
        let previous = self.order.token_of(sender);

        if random_number == self.local_token {
            let new_token = self.regenerate();
            debug!(
                "Token tie with {} on {}, redrew {}",
                sender.short(),
                random_number,
                new_token
            );
            // The sender redraws too; whatever it held before is void
            if let Some(previous) = previous.filter(|p| *p != random_number) {
                self.retire(previous, Some(sender.clone()));
            }
            self.order = self.order.retain(|entry| &entry.player_id != sender);
            self.retire(random_number, Some(sender.clone()));
            return TokenOutcome::Tie { new_token };
        }

        if let Some(reusable_by) = self.retired.get(&random_number) {
            if reusable_by.as_ref() != Some(sender) {
                debug!("Stale token {} from {} dropped", random_number, sender.short());
                return TokenOutcome::Discarded;
            }
        }

        if let Some(previous) = previous.filter(|p| *p != random_number) {
            self.retire(previous, Some(sender.clone()));
        }

        let holder = self
            .order
            .holder_of(random_number)
            .filter(|holder| *holder != sender && **holder != self.local_id)
            .cloned();
        if let Some(holder) = holder {
            debug!(
                "{} and {} both hold {}, waiting for redraws",
                sender.short(),
                holder.short(),
                random_number
            );
            self.order = self
                .order
                .retain(|entry| entry.player_id != holder && &entry.player_id != sender);
            self.retire(random_number, None);
            return TokenOutcome::Discarded;
        }

        self.order = self
            .order
            .with_token(PeerToken::new(sender.clone(), random_number));
        TokenOutcome::Accepted
    }

    /// Retire `value` and drop every remote entry still holding it, except
    /// the one from `reusable_by`.
    fn retire(&mut self, value: u32, reusable_by: Option<PlayerId>) {
        let reusable_by = match self.retired.get(&value) {
            Some(existing) if *existing != reusable_by => None,
            _ => reusable_by,
        };

        self.order = self.order.retain(|entry| {
            entry.random_number != value
                || entry.player_id == self.local_id
                || Some(&entry.player_id) == reusable_by.as_ref()
        });
        self.retired.insert(value, reusable_by);
    }

    fn regenerate(&mut self) -> u32 {
        self.local_token = self.tokens.next_token();
        self.order = self
            .order
            .with_token(PeerToken::new(self.local_id.clone(), self.local_token));
        self.local_token
    }
}

// =============================================================================
// TESTS
// =============================================================================
