//! Default IPC names and sizes
//!
//! Producer and consumer must agree on these values; a mismatch means the two
//! sides map different objects and never see each other's messages.
//! `ChannelConfig` starts from these defaults.

/// Directory holding named shared memory objects on Linux
pub const DEFAULT_REGION_DIR: &str = "/dev/shm";

/// Channel name - the region is `DEFAULT_REGION_DIR/DEFAULT_CHANNEL_NAME`
pub const DEFAULT_CHANNEL_NAME: &str = "shm_mailbox";

/// Suffix of the "slot empty" semaphore (writer permission)
pub const SEM_READ_SUFFIX: &str = "_read";

/// Suffix of the "slot full" semaphore (reader permission)
pub const SEM_WRITE_SUFFIX: &str = "_write";

/// Default slot capacity in bytes
pub const DEFAULT_CAPACITY: usize = 4096;

/// Largest length the signed 16-bit binary header can carry
pub const MAX_BINARY_LENGTH: usize = i16::MAX as usize;

/// Size of the binary length header
pub const BINARY_HEADER_SIZE: usize = 2;
