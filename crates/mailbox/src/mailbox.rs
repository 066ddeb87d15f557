use crate::channel::Channel;
use crate::config::{ChannelConfig, FramingMode};
use crate::errors::MailboxError;
use crate::handshake::{Handshake, Wait};
use crate::region::SharedRegion;
use crate::semaphore::{BinarySemaphore, NamedSemaphore};
use common::span_debug;

/// One endpoint of a single-slot channel: the shared region plus the
/// handshake that gates it.
///
/// Each process (or thread) opens its own `Mailbox` for the same
/// `ChannelConfig`. Exactly one of them sends and exactly one receives.
pub struct Mailbox<S: BinarySemaphore = NamedSemaphore> {
    config: ChannelConfig,
    channel: Channel,
    handshake: Handshake<S>,
}

impl Mailbox<NamedSemaphore> {
    /// Map the shared region and open the semaphore pair, creating whichever
    /// objects do not exist yet.
    pub fn open(config: ChannelConfig) -> Result<Self, MailboxError> {
        config.validate()?;

        let region = SharedRegion::create_or_open(config.region_path(), config.capacity)?;
        let handshake = Handshake::open(&config)?;
        let channel = Channel::new(region, config.framing);

        Ok(Self::from_parts(config, channel, handshake))
    }

    /// Remove the named region and semaphores.
    ///
    /// Never called on ordinary exit. Only the process designated as cleanup
    /// owner should call this, after its peer is done.
    pub fn destroy(config: &ChannelConfig) -> Result<(), MailboxError> {
        SharedRegion::unlink(config.region_path())?;
        Handshake::unlink(config)?;
        tracing::info!(channel = %config.name, "Shared channel objects unlinked");
        Ok(())
    }
}

impl<S: BinarySemaphore> Mailbox<S> {
    pub fn from_parts(config: ChannelConfig, channel: Channel, handshake: Handshake<S>) -> Self {
        Self {
            config,
            channel,
            handshake,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }

    /// Send one text message. Oversize messages are rejected before the
    /// write permission is taken.
    pub fn send_text(&mut self, message: &str, wait: Wait<'_>) -> Result<(), MailboxError> {
        let _s = span_debug!("send_text");
        self.channel.check_outgoing(FramingMode::Text, message.len())?;

        let permit = self.handshake.acquire_write(wait)?;
        self.channel.write_text(message)?;
        permit.commit()
    }

    pub fn send_binary(&mut self, payload: &[u8], wait: Wait<'_>) -> Result<(), MailboxError> {
        let _s = span_debug!("send_binary");
        self.channel.check_outgoing(FramingMode::Binary, payload.len())?;

        let permit = self.handshake.acquire_write(wait)?;
        self.channel.write_binary(payload)?;
        permit.commit()
    }

    /// Receive one text message. A slot that fails to decode still counts as
    /// consumed; the error is returned after the slot is released.
    pub fn recv_text(&mut self, wait: Wait<'_>) -> Result<String, MailboxError> {
        let _s = span_debug!("recv_text");
        let permit = self.handshake.acquire_read(wait)?;
        let message = self.channel.read_text();
        permit.release()?;
        Ok(message?)
    }

    pub fn recv_binary(&mut self, wait: Wait<'_>) -> Result<Vec<u8>, MailboxError> {
        let _s = span_debug!("recv_binary");
        let permit = self.handshake.acquire_read(wait)?;
        let payload = self.channel.read_binary();
        permit.release()?;
        Ok(payload?)
    }
}
