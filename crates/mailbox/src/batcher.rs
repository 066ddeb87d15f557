//! Coalescing many small text messages into one slot transfer
//!
//! Each message is buffered as a line (`message + '\n'`). Before a new
//! message is appended the batcher checks whether the buffer must go first:
//!
//! - size: `pending + next + 1 >= capacity` (the `+ 1` is the trailing NUL)
//! - time: at least `flush_interval` since the last flush
//!
//! A flush writes all buffered lines followed by one NUL byte as a single
//! text frame. The message that tripped the check opens the next batch.

use crate::errors::MailboxError;
use crate::framing::FramingError;
use crate::handshake::Wait;
use crate::mailbox::Mailbox;
use crate::paths;
use crate::semaphore::{BinarySemaphore, NamedSemaphore};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub capacity: usize,
    pub flush_interval: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            capacity: paths::DEFAULT_CAPACITY,
            flush_interval: Duration::from_secs(1),
        }
    }
}

/// Buffered lines ready to go through the slot in one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    blob: String,
    lines: usize,
}

impl Batch {
    pub fn as_str(&self) -> &str {
        &self.blob
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

}

/// Flush policy and buffer, without any I/O.
///
/// Time is passed in by the caller so the policy can be driven by a real or
/// simulated clock.
#[derive(Debug)]
pub struct Batcher {
    policy: BatchPolicy,
    lines: Vec<String>,
    pending_bytes: usize,
    last_flush: Instant,
}

impl Batcher {
    pub fn new(policy: BatchPolicy, now: Instant) -> Self {
        Self {
            policy,
            lines: Vec::new(),
            pending_bytes: 0,
            last_flush: now,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of the encoded sizes of all buffered lines
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Whether the buffer must be flushed before a message of `message_len`
    /// bytes is appended.
    pub fn is_due(&self, message_len: usize, now: Instant) -> bool {
        let next = encoded_len(message_len);
        self.pending_bytes + next + 1 >= self.policy.capacity
            || now.saturating_duration_since(self.last_flush) >= self.policy.flush_interval
    }

    /// Whether the time trigger alone has tripped.
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_flush) >= self.policy.flush_interval
    }

    /// Append a message. Fails only for a message that could never fit in a
    /// slot on its own.
    pub fn push(&mut self, message: &str) -> Result<(), FramingError> {
        self.check(message)?;

        let len = encoded_len(message.len());
        let mut line = String::with_capacity(len);
        line.push_str(message);
        line.push('\n');
        self.lines.push(line);
        self.pending_bytes += len;
        Ok(())
    }

    /// Reject a message that would not fit in an otherwise empty batch.
    pub fn check(&self, message: &str) -> Result<(), FramingError> {
        let len = encoded_len(message.len()) + 1;
        if len > self.policy.capacity {
            return Err(FramingError::TextTooLarge {
                len,
                capacity: self.policy.capacity,
            });
        }
        Ok(())
    }

    /// The current buffer as a batch, leaving the buffer untouched.
    pub fn pending(&self) -> Option<Batch> {
        if self.lines.is_empty() {
            return None;
        }

        let mut blob = String::with_capacity(self.pending_bytes + 1);
        for line in &self.lines {
            blob.push_str(line);
        }
        blob.push('\0');

        Some(Batch {
            blob,
            lines: self.lines.len(),
        })
    }

    /// Clear the buffer and restart the flush timer.
    pub fn mark_flushed(&mut self, now: Instant) {
        self.lines.clear();
        self.pending_bytes = 0;
        self.last_flush = now;
    }

    /// The batch that must be written before `message` is appended, if a
    /// trigger tripped. The buffer is left in place until `mark_flushed`.
    /// A trigger over an empty buffer only restarts the timer.
    pub fn due_before(
        &mut self,
        message: &str,
        now: Instant,
    ) -> Result<Option<Batch>, FramingError> {
        self.check(message)?;
        if !self.is_due(message.len(), now) {
            return Ok(None);
        }
        Ok(self.take_due(now))
    }

    /// Same as `due_before` for the time trigger alone, for idle loops.
    pub fn due_stale(&mut self, now: Instant) -> Option<Batch> {
        if !self.is_stale(now) {
            return None;
        }
        self.take_due(now)
    }

    fn take_due(&mut self, now: Instant) -> Option<Batch> {
        let batch = self.pending();
        if batch.is_none() {
            self.last_flush = now;
        }
        batch
    }
}

fn encoded_len(message_len: usize) -> usize {
    message_len + 1
}

/// Non-empty lines of a received batch.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').filter(|line| !line.is_empty())
}

/// Batcher wired to the writing end of a mailbox.
///
/// The buffer is cleared only after its batch was written, so a flush that
/// is interrupted while waiting for the slot is still available to `finish`.
pub struct BatchSender<S: BinarySemaphore = NamedSemaphore> {
    mailbox: Mailbox<S>,
    batcher: Batcher,
}

impl<S: BinarySemaphore> BatchSender<S> {
    pub fn new(mailbox: Mailbox<S>, flush_interval: Duration) -> Self {
        let policy = BatchPolicy {
            capacity: mailbox.capacity(),
            flush_interval,
        };
        Self {
            mailbox,
            batcher: Batcher::new(policy, Instant::now()),
        }
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    /// Buffer `message`, flushing the previous batch first if a trigger
    /// tripped. Returns the number of lines flushed.
    pub fn send(&mut self, message: &str, wait: Wait<'_>) -> Result<Option<usize>, MailboxError> {
        match self.batcher.due_before(message, Instant::now())? {
            Some(batch) => {
                let lines = self.write(batch, wait)?;
                self.batcher.push(message)?;
                Ok(Some(lines))
            }
            None => {
                self.batcher.push(message)?;
                Ok(None)
            }
        }
    }

    /// Flush on the time trigger alone.
    pub fn poll(&mut self, wait: Wait<'_>) -> Result<Option<usize>, MailboxError> {
        match self.batcher.due_stale(Instant::now()) {
            Some(batch) => self.write(batch, wait).map(Some),
            None => Ok(None),
        }
    }

    /// Final flush of any leftover lines, then hand back the mailbox.
    pub fn finish(mut self, wait: Wait<'_>) -> Result<(Option<usize>, Mailbox<S>), MailboxError> {
        let flushed = match self.batcher.pending() {
            Some(batch) => Some(self.write(batch, wait)?),
            None => None,
        };
        Ok((flushed, self.mailbox))
    }

    fn write(&mut self, batch: Batch, wait: Wait<'_>) -> Result<usize, MailboxError> {
        self.mailbox.send_text(batch.as_str(), wait)?;
        self.batcher.mark_flushed(Instant::now());

        tracing::debug!(
            lines = batch.line_count(),
            bytes = batch.as_str().len(),
            "Batch flushed"
        );
        Ok(batch.line_count())
    }
}
