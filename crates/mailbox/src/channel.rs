use crate::config::FramingMode;
use crate::framing::{self, FramingError};
use crate::region::SharedRegion;

/// Slot-level access to a shared region under one framing mode.
///
/// `Channel` does no locking. Callers hold the handshake permission matching
/// the operation (write or read) for the duration of each call.
pub struct Channel {
    region: SharedRegion,
    mode: FramingMode,
}

impl Channel {
    pub fn new(region: SharedRegion, mode: FramingMode) -> Self {
        Self { region, mode }
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    pub fn write_text(&mut self, message: &str) -> Result<(), FramingError> {
        self.expect_mode(FramingMode::Text)?;
        framing::encode_text(self.region.bytes_mut(), message)
    }

    pub fn read_text(&self) -> Result<String, FramingError> {
        self.expect_mode(FramingMode::Text)?;
        framing::decode_text(self.region.bytes()).inspect_err(|e| {
            tracing::warn!(
                error = %e,
                path = %self.region.path().display(),
                "Discarding unreadable text slot"
            );
        })
    }

    pub fn write_binary(&mut self, payload: &[u8]) -> Result<(), FramingError> {
        self.expect_mode(FramingMode::Binary)?;
        framing::encode_binary(self.region.bytes_mut(), payload)
    }

    pub fn read_binary(&self) -> Result<Vec<u8>, FramingError> {
        self.expect_mode(FramingMode::Binary)?;
        framing::decode_binary(self.region.bytes())
            .map(<[u8]>::to_vec)
            .inspect_err(|e| {
                tracing::warn!(
                    error = %e,
                    path = %self.region.path().display(),
                    "Discarding malformed binary slot"
                );
            })
    }

    /// Reject a message before any permission is taken for it.
    pub(crate) fn check_outgoing(
        &self,
        requested: FramingMode,
        len: usize,
    ) -> Result<(), FramingError> {
        self.expect_mode(requested)?;
        match requested {
            FramingMode::Text => framing::check_text_len(len, self.capacity()),
            FramingMode::Binary => framing::check_binary_len(len, self.capacity()),
        }
    }

    fn expect_mode(&self, requested: FramingMode) -> Result<(), FramingError> {
        if self.mode != requested {
            return Err(FramingError::ModeMismatch {
                configured: self.mode,
                requested,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn channel(dir: &TempDir, name: &str, capacity: usize, mode: FramingMode) -> Channel {
        let region = SharedRegion::create_or_open(dir.path().join(name), capacity).unwrap();
        Channel::new(region, mode)
    }

    #[test]
    fn test_text_round_trip_across_mappings() {
        let dir = tempdir().unwrap();
        let mut writer = channel(&dir, "text", 4096, FramingMode::Text);
        let reader = channel(&dir, "text", 4096, FramingMode::Text);

        for message in ["Hello from Rust! 0", "", "line one\nline two", "ünïcödé ✓"] {
            writer.write_text(message).unwrap();
            assert_eq!(reader.read_text().unwrap(), message);
        }
    }

    #[test]
    fn test_text_of_full_capacity_round_trips() {
        let dir = tempdir().unwrap();
        let mut chan = channel(&dir, "full", 4096, FramingMode::Text);
        let message = "x".repeat(4096);

        chan.write_text(&message).unwrap();
        assert_eq!(chan.read_text().unwrap(), message);

        let err = chan.write_text(&"y".repeat(4097)).unwrap_err();
        assert!(matches!(err, FramingError::TextTooLarge { len: 4097, .. }));
    }

    #[test]
    fn test_binary_round_trip_across_mappings() {
        let dir = tempdir().unwrap();
        let mut writer = channel(&dir, "bin", 4096, FramingMode::Binary);
        let reader = channel(&dir, "bin", 4096, FramingMode::Binary);

        let payloads: [Vec<u8>; 4] = [
            vec![],
            vec![0u8; 1],
            (0..=255).collect(),
            vec![0xAB; 4094],
        ];
        for payload in payloads {
            writer.write_binary(&payload).unwrap();
            assert_eq!(reader.read_binary().unwrap(), payload);
        }
    }

    #[test]
    fn test_binary_oversize_then_valid_write() {
        let dir = tempdir().unwrap();
        let mut chan = channel(&dir, "oversize", 4096, FramingMode::Binary);

        let err = chan.write_binary(&vec![1u8; 4095]).unwrap_err();
        assert!(matches!(err, FramingError::PayloadTooLarge { len: 4095, max: 4094 }));

        chan.write_binary(b"still works").unwrap();
        assert_eq!(chan.read_binary().unwrap(), b"still works");
    }

    #[test]
    fn test_malformed_binary_slot_is_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("malformed");
        let mut raw = SharedRegion::create_or_open(&path, 64).unwrap();
        let region = SharedRegion::create_or_open(&path, 64).unwrap();
        let chan = Channel::new(region, FramingMode::Binary);

        raw.bytes_mut()[..2].copy_from_slice(&1000i16.to_be_bytes());
        assert!(matches!(
            chan.read_binary(),
            Err(FramingError::ShortRead {
                declared: 1000,
                available: 62
            })
        ));

        raw.bytes_mut()[..2].copy_from_slice(&(-1i16).to_be_bytes());
        assert!(matches!(chan.read_binary(), Err(FramingError::NegativeLength(-1))));
    }

    #[test]
    fn test_operations_reject_the_other_framing_mode() {
        let dir = tempdir().unwrap();
        let mut text = channel(&dir, "text_only", 64, FramingMode::Text);
        let mut binary = channel(&dir, "binary_only", 64, FramingMode::Binary);

        assert!(matches!(
            text.write_binary(b"x"),
            Err(FramingError::ModeMismatch {
                configured: FramingMode::Text,
                requested: FramingMode::Binary
            })
        ));
        assert!(matches!(text.read_binary(), Err(FramingError::ModeMismatch { .. })));
        assert!(matches!(binary.write_text("x"), Err(FramingError::ModeMismatch { .. })));
        assert!(matches!(binary.read_text(), Err(FramingError::ModeMismatch { .. })));
    }

    #[test]
    fn test_check_outgoing_validates_size_without_writing() {
        let dir = tempdir().unwrap();
        let mut chan = channel(&dir, "check", 16, FramingMode::Text);
        chan.write_text("keep").unwrap();

        assert!(chan.check_outgoing(FramingMode::Text, 16).is_ok());
        assert!(chan.check_outgoing(FramingMode::Text, 17).is_err());
        assert!(chan.check_outgoing(FramingMode::Binary, 1).is_err());
        assert_eq!(chan.read_text().unwrap(), "keep");
    }
}
