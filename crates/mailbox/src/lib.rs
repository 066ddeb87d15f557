pub mod batcher;
pub mod channel;
pub mod config;
pub mod errors;
pub mod framing;
pub mod handshake;
pub mod mailbox;
pub mod paths;
pub mod region;
pub mod semaphore;

pub use batcher::{Batch, BatchPolicy, BatchSender, Batcher, split_lines};
pub use channel::Channel;
pub use config::{ChannelConfig, FramingMode};
pub use errors::MailboxError;
pub use framing::FramingError;
pub use handshake::{Handshake, ReadPermit, Wait, WritePermit};
pub use mailbox::Mailbox;
pub use region::SharedRegion;
pub use semaphore::{BinarySemaphore, LocalSemaphore, NamedSemaphore, SemaphoreError};
