//! Order Digests
//!
//! SHA-256 over the agreed peer order. Every peer logs the digest when its
//! order completes, so a mismatch between devices is visible in the logs
//! without shipping the whole order around.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type OrderDigest = [u8; 32];

/// Domain-separated SHA-256 hasher.
///
/// Order of updates is significant.
pub struct DigestHasher {
    hasher: Sha256,
}

impl DigestHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a peer order.
    pub fn for_peer_order() -> Self {
        Self::new(b"CIRCUIT_RACER_ORDER_V1")
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a length-prefixed string, so adjacent strings
    /// cannot run into each other.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> OrderDigest {
        self.hasher.finalize().into()
    }
}

// =============================================================================
// TESTS
// =============================================================================
