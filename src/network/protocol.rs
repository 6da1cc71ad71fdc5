//! Protocol Messages
//!
//! Wire format for peer-to-peer race messages. Every message is fixed
//! size and starts with a little-endian `u32` discriminator, followed by
//! the payload fields in declaration order:
//!
//! | Discriminator | Message        | Payload                        | Bytes |
//! |---------------|----------------|--------------------------------|-------|
//! | 0             | `RandomNumber` | `u32` token                    | 8     |
//! | 1             | `GameBegin`    | -                              | 4     |
//! | 2             | `Move`         | `f32` dx, `f32` dy, `f32` rot  | 16    |
//! | 3             | `LapComplete`  | -                              | 4     |
//! | 4             | `GameOver`     | -                              | 4     |
//!
//! Fields are serialized one by one through serde/bincode, so the layout
//! does not depend on struct padding or the host's endianness.

use serde::{Serialize, Deserialize};

/// Size of the discriminator prefix.
pub const DISCRIMINATOR_LEN: usize = 4;

/// Messages exchanged between peers.
///
/// Variant order is the wire discriminator. Do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Ordering token, sent on join and again after a tie.
    RandomNumber(u32),

    /// Race start, sent once by the rank-0 peer.
    GameBegin,

    /// Local steering update.
    Move {
        /// Horizontal steering component.
        dx: f32,
        /// Vertical steering component.
        dy: f32,
        /// Car rotation in radians.
        rotation: f32,
    },

    /// The sender finished a lap. Attributed to the transport sender.
    LapComplete,

    /// Reserved. Decoded, never acted on.
    GameOver,
}

/// Discriminator of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageKind {
    /// Ordering token.
    RandomNumber = 0,
    /// Race start.
    GameBegin = 1,
    /// Steering update.
    Move = 2,
    /// Lap finished.
    LapComplete = 3,
    /// Reserved.
    GameOver = 4,
}

impl MessageKind {
    /// Look up a kind by its wire discriminator.
    pub fn from_discriminator(value: u32) -> Option<Self> {
        match value {
            0 => Some(MessageKind::RandomNumber),
            1 => Some(MessageKind::GameBegin),
            2 => Some(MessageKind::Move),
            3 => Some(MessageKind::LapComplete),
            4 => Some(MessageKind::GameOver),
            _ => None,
        }
    }

    /// Wire discriminator.
    #[inline]
    pub fn discriminator(self) -> u32 {
        self as u32
    }

    /// Total encoded size of a message of this kind.
    pub fn encoded_len(self) -> usize {
        DISCRIMINATOR_LEN
            + match self {
                MessageKind::RandomNumber => 4,
                MessageKind::Move => 12,
                MessageKind::GameBegin | MessageKind::LapComplete | MessageKind::GameOver => 0,
            }
    }
}

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Fewer bytes than a discriminator.
    #[error("message truncated: {0} bytes")]
    Truncated(usize),

    /// Discriminator outside the known table.
    #[error("unknown message discriminator {0}")]
    UnknownKind(u32),

    /// Payload size does not match the kind.
    #[error("{kind:?} message must be {expected} bytes, got {actual}")]
    Length {
        /// Kind named by the discriminator.
        kind: MessageKind,
        /// Size the kind requires.
        expected: usize,
        /// Size received.
        actual: usize,
    },

    /// Serializer failure.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl Message {
    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::RandomNumber(_) => MessageKind::RandomNumber,
            Message::GameBegin => MessageKind::GameBegin,
            Message::Move { .. } => MessageKind::Move,
            Message::LapComplete => MessageKind::LapComplete,
            Message::GameOver => MessageKind::GameOver,
        }
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary.
    ///
    /// The discriminator is read first and the buffer length checked
    /// against that kind before any payload is decoded.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let prefix: [u8; DISCRIMINATOR_LEN] = data
            .get(..DISCRIMINATOR_LEN)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ProtocolError::Truncated(data.len()))?;

        let discriminator = u32::from_le_bytes(prefix);
        let kind = MessageKind::from_discriminator(discriminator)
            .ok_or(ProtocolError::UnknownKind(discriminator))?;

        if data.len() != kind.encoded_len() {
            return Err(ProtocolError::Length {
                kind,
                expected: kind.encoded_len(),
                actual: data.len(),
            });
        }

        Ok(bincode::deserialize(data)?)
    }
}

/// Encode a message for the wire.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    message.to_bytes()
}

/// Decode a message received from the wire.
pub fn decode(data: &[u8]) -> Result<Message, ProtocolError> {
    Message::from_bytes(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::PI;

    fn roundtrip(message: Message) -> Message {
        let bytes = encode(&message).unwrap();
        assert_eq!(bytes.len(), message.kind().encoded_len());
        decode(&bytes).unwrap()
    }

    #[test]
    fn test_every_variant_roundtrips() {
        let messages = vec![
            Message::RandomNumber(0),
            Message::RandomNumber(u32::MAX),
            Message::GameBegin,
            Message::Move { dx: 0.25, dy: -0.75, rotation: -PI },
            Message::Move { dx: -1.0, dy: 1.0, rotation: PI },
            Message::LapComplete,
            Message::GameOver,
        ];

        for message in messages {
            assert_eq!(roundtrip(message), message);
        }
    }

    #[test]
    fn test_discriminator_comes_first() {
        let cases = [
            (Message::RandomNumber(7), 0u32),
            (Message::GameBegin, 1),
            (Message::Move { dx: 0.0, dy: 0.0, rotation: 0.0 }, 2),
            (Message::LapComplete, 3),
            (Message::GameOver, 4),
        ];

        for (message, discriminator) in cases {
            let bytes = encode(&message).unwrap();
            assert_eq!(bytes[..4], discriminator.to_le_bytes());
            assert_eq!(message.kind().discriminator(), discriminator);
        }
    }

    #[test]
    fn test_random_number_layout() {
        let bytes = encode(&Message::RandomNumber(0xDEADBEEF)).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_move_layout() {
        let bytes = encode(&Message::Move { dx: 1.0, dy: -2.0, rotation: 0.5 }).unwrap();
        assert_eq!(bytes[4..8], 1.0f32.to_le_bytes());
        assert_eq!(bytes[8..12], (-2.0f32).to_le_bytes());
        assert_eq!(bytes[12..16], 0.5f32.to_le_bytes());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(decode(&[]), Err(ProtocolError::Truncated(0))));
        assert!(matches!(decode(&[0, 0]), Err(ProtocolError::Truncated(2))));
        assert!(matches!(decode(&9u32.to_le_bytes()), Err(ProtocolError::UnknownKind(9))));

        // RandomNumber without its payload
        let result = decode(&0u32.to_le_bytes());
        assert!(matches!(
            result,
            Err(ProtocolError::Length { kind: MessageKind::RandomNumber, expected: 8, actual: 4 })
        ));

        // GameBegin with trailing junk
        let mut bytes = encode(&Message::GameBegin).unwrap();
        bytes.push(0xFF);
        assert!(matches!(decode(&bytes), Err(ProtocolError::Length { .. })));
    }

    proptest! {
        #[test]
        fn prop_random_number_roundtrip(token in any::<u32>()) {
            prop_assert_eq!(roundtrip(Message::RandomNumber(token)), Message::RandomNumber(token));
        }

        #[test]
        fn prop_move_roundtrip(
            dx in -1.0f32..=1.0,
            dy in -1.0f32..=1.0,
            rotation in -PI..=PI,
        ) {
            let message = Message::Move { dx, dy, rotation };
            prop_assert_eq!(roundtrip(message), message);
        }
    }
}
