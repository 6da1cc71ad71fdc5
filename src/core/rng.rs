//! Peer Token Generation
//!
//! Uses Xorshift128+ for fast, high-quality randomness.
//! Given the same seed, produces identical sequence on all platforms,
//! which lets tests replay exact token exchanges.

use std::collections::VecDeque;

/// Source of 32-bit peer tokens.
///
/// The session draws one token at start and one more for every tie it
/// detects. Implementations must be `Send` so a session can live inside
/// the race driver task.
pub trait TokenSource: Send {
    /// Draw the next token.
    fn next_token(&mut self) -> u32;
}

/// Xorshift128+ token generator.
///
/// # Example
///
/// ```
/// use circuit_racer::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(42);
/// let value = rng.next_u64();
/// assert_eq!(value, 16629283624882167704);
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create an RNG seeded from operating system entropy.
    ///
    /// This is what a live session uses: two devices must not share a seed,
    /// otherwise they would tie on every draw.
    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u64>())
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random u32.
    ///
    /// Takes the upper half, which has better statistical quality
    /// than the low bits of Xorshift128+.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }
}

impl TokenSource for DeterministicRng {
    fn next_token(&mut self) -> u32 {
        self.next_u32()
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Token source that replays a fixed script, then falls back to a seeded RNG.
///
/// Used to stage collisions: two peers scripted with the same first token
/// are guaranteed to tie.
#[derive(Clone, Debug)]
pub struct ScriptedTokens {
    script: VecDeque<u32>,
    fallback: DeterministicRng,
}

impl ScriptedTokens {
    /// Create a source that yields `script` in order.
    pub fn new(script: impl IntoIterator<Item = u32>, fallback_seed: u64) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: DeterministicRng::new(fallback_seed),
        }
    }

    /// Tokens still waiting in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl TokenSource for ScriptedTokens {
    fn next_token(&mut self) -> u32 {
        self.script
            .pop_front()
            .unwrap_or_else(|| self.fallback.next_u32())
    }
}

// =============================================================================
// TESTS
// =============================================================================
