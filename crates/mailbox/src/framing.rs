//! Byte layouts of the slot
//!
//! Text frame:
//! ```text
//! [UTF-8 bytes][0x00 padding up to capacity]
//! ```
//! Trailing zero bytes are padding, never payload.
//!
//! Binary frame:
//! ```text
//! [i16 big-endian length L][L payload bytes][stale bytes, ignored]
//! ```
//! with `0 <= L <= min(32767, capacity - 2)`. Bytes past the payload are not
//! cleared, so readers must trust only the length field.
//!
//! These functions never synchronize. The caller must hold the matching
//! handshake permission for the whole call.

use crate::config::FramingMode;
use crate::paths::{BINARY_HEADER_SIZE, MAX_BINARY_LENGTH};
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Text message of {len} bytes exceeds slot capacity of {capacity} bytes")]
    TextTooLarge { len: usize, capacity: usize },

    #[error("Slot does not hold valid UTF-8: {0}")]
    Decoding(#[from] Utf8Error),

    #[error("Binary payload of {len} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Declared length {declared} exceeds {available} available bytes")]
    ShortRead { declared: usize, available: usize },

    #[error("Negative length field {0} in binary header")]
    NegativeLength(i16),

    #[error("Slot uses {configured} framing, cannot perform a {requested} operation")]
    ModeMismatch {
        configured: FramingMode,
        requested: FramingMode,
    },
}

pub fn check_text_len(len: usize, capacity: usize) -> Result<(), FramingError> {
    if len > capacity {
        return Err(FramingError::TextTooLarge { len, capacity });
    }
    Ok(())
}

/// Overwrite the whole slot with `message` followed by zero padding.
pub fn encode_text(slot: &mut [u8], message: &str) -> Result<(), FramingError> {
    let bytes = message.as_bytes();
    check_text_len(bytes.len(), slot.len())?;

    slot[..bytes.len()].copy_from_slice(bytes);
    slot[bytes.len()..].fill(0);
    Ok(())
}

/// Decode the slot as text, dropping trailing zero padding.
pub fn decode_text(slot: &[u8]) -> Result<String, FramingError> {
    let end = slot.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = std::str::from_utf8(&slot[..end])?;
    Ok(text.to_owned())
}

/// Largest binary payload a slot of `capacity` bytes can carry.
pub fn max_binary_payload(capacity: usize) -> usize {
    capacity
        .saturating_sub(BINARY_HEADER_SIZE)
        .min(MAX_BINARY_LENGTH)
}

pub fn check_binary_len(len: usize, capacity: usize) -> Result<(), FramingError> {
    let max = max_binary_payload(capacity);
    if len > max {
        return Err(FramingError::PayloadTooLarge { len, max });
    }
    Ok(())
}

/// Write the length header and payload. Bytes after the payload keep
/// whatever a previous write left there.
pub fn encode_binary(slot: &mut [u8], payload: &[u8]) -> Result<(), FramingError> {
    check_binary_len(payload.len(), slot.len())?;

    // Bounded by MAX_BINARY_LENGTH above, so the cast cannot wrap.
    let header = (payload.len() as i16).to_be_bytes();
    slot[..BINARY_HEADER_SIZE].copy_from_slice(&header);
    slot[BINARY_HEADER_SIZE..BINARY_HEADER_SIZE + payload.len()].copy_from_slice(payload);
    Ok(())
}

/// Borrow the payload described by the length header.
pub fn decode_binary(slot: &[u8]) -> Result<&[u8], FramingError> {
    if slot.len() < BINARY_HEADER_SIZE {
        return Err(FramingError::ShortRead {
            declared: BINARY_HEADER_SIZE,
            available: slot.len(),
        });
    }

    let length = i16::from_be_bytes([slot[0], slot[1]]);
    if length < 0 {
        return Err(FramingError::NegativeLength(length));
    }

    let length = length as usize;
    let available = slot.len() - BINARY_HEADER_SIZE;
    if length > available {
        return Err(FramingError::ShortRead {
            declared: length,
            available,
        });
    }

    Ok(&slot[BINARY_HEADER_SIZE..BINARY_HEADER_SIZE + length])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_zero_padded_to_capacity() {
        let mut slot = [0xAAu8; 16];
        encode_text(&mut slot, "hello").unwrap();

        assert_eq!(&slot[..5], b"hello");
        assert!(
            slot[5..].iter().all(|&b| b == 0),
            "Remainder of the slot must be zero padding"
        );
        assert_eq!(decode_text(&slot).unwrap(), "hello");
    }

    #[test]
    fn test_text_overwrites_longer_previous_message() {
        let mut slot = [0u8; 32];
        encode_text(&mut slot, "a much longer first message").unwrap();
        encode_text(&mut slot, "short").unwrap();

        assert_eq!(decode_text(&slot).unwrap(), "short");
    }

    #[test]
    fn test_text_exactly_capacity_fits() {
        let mut slot = [0u8; 8];
        encode_text(&mut slot, "12345678").unwrap();
        assert_eq!(decode_text(&slot).unwrap(), "12345678");
    }

    #[test]
    fn test_text_over_capacity_is_rejected_not_truncated() {
        let mut slot = [0u8; 8];
        encode_text(&mut slot, "previous").unwrap();

        let err = encode_text(&mut slot, "123456789").unwrap_err();
        assert_eq!(
            err,
            FramingError::TextTooLarge {
                len: 9,
                capacity: 8
            }
        );
        assert_eq!(
            decode_text(&slot).unwrap(),
            "previous",
            "Rejected write must leave the slot untouched"
        );
    }

    #[test]
    fn test_multibyte_text_counts_encoded_bytes() {
        let mut slot = [0u8; 6];
        // Two 3-byte code points
        encode_text(&mut slot, "안녕").unwrap();
        assert_eq!(decode_text(&slot).unwrap(), "안녕");

        let err = encode_text(&mut slot, "안녕!").unwrap_err();
        assert!(matches!(err, FramingError::TextTooLarge { len: 7, .. }));
    }

    #[test]
    fn test_empty_slot_decodes_to_empty_text() {
        let slot = [0u8; 64];
        assert_eq!(decode_text(&slot).unwrap(), "");
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let mut slot = [0u8; 8];
        slot[0] = b'o';
        slot[1] = 0xFF;
        slot[2] = b'k';

        assert!(matches!(decode_text(&slot), Err(FramingError::Decoding(_))));
    }

    #[test]
    fn test_binary_header_is_big_endian() {
        let mut slot = [0u8; 600];
        let payload = vec![7u8; 258];
        encode_binary(&mut slot, &payload).unwrap();

        assert_eq!(slot[0], 0x01);
        assert_eq!(slot[1], 0x02);
        assert_eq!(decode_binary(&slot).unwrap(), payload.as_slice());
    }

    #[test]
    fn test_binary_ignores_stale_trailing_bytes() {
        let mut slot = [0u8; 32];
        encode_binary(&mut slot, b"0123456789").unwrap();
        encode_binary(&mut slot, b"abc").unwrap();

        assert_eq!(
            &slot[5..12],
            b"3456789",
            "Bytes past the new payload are left as they were"
        );
        assert_eq!(decode_binary(&slot).unwrap(), b"abc");
    }

    #[test]
    fn test_empty_binary_payload() {
        let mut slot = [0xFFu8; 4];
        encode_binary(&mut slot, &[]).unwrap();
        assert_eq!(decode_binary(&slot).unwrap(), b"");
    }

    #[test]
    fn test_max_binary_payload_bounds() {
        assert_eq!(max_binary_payload(4096), 4094);
        assert_eq!(max_binary_payload(2), 0);
        assert_eq!(max_binary_payload(0), 0);
        assert_eq!(max_binary_payload(1 << 20), 32767);
    }

    #[test]
    fn test_binary_oversize_is_rejected_and_slot_stays_usable() {
        let capacity = 64;
        let mut slot = vec![0u8; capacity];

        let err = encode_binary(&mut slot, &vec![1u8; capacity - 1]).unwrap_err();
        assert_eq!(
            err,
            FramingError::PayloadTooLarge {
                len: capacity - 1,
                max: capacity - 2
            }
        );

        let payload = vec![9u8; capacity - 2];
        encode_binary(&mut slot, &payload).unwrap();
        assert_eq!(decode_binary(&slot).unwrap(), payload.as_slice());
    }

    #[test]
    fn test_binary_length_past_slot_end_is_short_read() {
        let mut slot = [0u8; 16];
        slot[..2].copy_from_slice(&100i16.to_be_bytes());

        assert_eq!(
            decode_binary(&slot).unwrap_err(),
            FramingError::ShortRead {
                declared: 100,
                available: 14
            }
        );
    }

    #[test]
    fn test_negative_binary_length_is_rejected() {
        let mut slot = [0u8; 16];
        slot[..2].copy_from_slice(&(-5i16).to_be_bytes());

        assert_eq!(
            decode_binary(&slot).unwrap_err(),
            FramingError::NegativeLength(-5)
        );
    }

    #[test]
    fn test_slot_smaller_than_header_is_short_read() {
        let slot = [0u8; 1];
        assert_eq!(
            decode_binary(&slot).unwrap_err(),
            FramingError::ShortRead {
                declared: 2,
                available: 1
            }
        );
    }
}
