use crate::errors::MailboxError;
use crate::paths;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Wire representation used for the whole lifetime of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// UTF-8 bytes, zero-padded to the slot capacity
    Text,
    /// 2-byte big-endian signed length followed by the payload
    Binary,
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingMode::Text => f.write_str("text"),
            FramingMode::Binary => f.write_str("binary"),
        }
    }
}

/// Identity and shape of one channel: which named objects to map and how the
/// slot bytes are framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub name: String,
    pub region_dir: PathBuf,
    pub capacity: usize,
    pub framing: FramingMode,
    /// How often a cancellable wait re-checks its stop flag
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: paths::DEFAULT_CHANNEL_NAME.to_string(),
            region_dir: PathBuf::from(paths::DEFAULT_REGION_DIR),
            capacity: paths::DEFAULT_CAPACITY,
            framing: FramingMode::Text,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_region_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.region_dir = dir.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_framing(mut self, framing: FramingMode) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn region_path(&self) -> PathBuf {
        self.region_dir.join(&self.name)
    }

    /// Name of the "slot empty" semaphore, held by the writer
    pub fn sem_read_name(&self) -> String {
        format!("/{}{}", self.name, paths::SEM_READ_SUFFIX)
    }

    /// Name of the "slot full" semaphore, held by the reader
    pub fn sem_write_name(&self) -> String {
        format!("/{}{}", self.name, paths::SEM_WRITE_SUFFIX)
    }

    pub fn validate(&self) -> Result<(), MailboxError> {
        if self.name.is_empty() || self.name.contains('/') || self.name.contains('\0') {
            return Err(MailboxError::init(
                format!("channel {:?}", self.name),
                "name must be a non-empty single path component",
            ));
        }

        if self.capacity < paths::BINARY_HEADER_SIZE {
            return Err(MailboxError::init(
                format!("channel {}", self.name),
                format!(
                    "capacity {} is below the {}-byte minimum",
                    self.capacity,
                    paths::BINARY_HEADER_SIZE
                ),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(MailboxError::init(
                format!("channel {}", self.name),
                "poll interval must be non-zero",
            ));
        }

        Ok(())
    }
}
