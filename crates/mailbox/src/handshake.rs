//! Two-semaphore hand-off for a single slot
//!
//! `slot_empty` (named `*_read`) is the writer's permission and `slot_full`
//! (named `*_write`) the reader's. One transfer is:
//!
//! ```text
//! writer: acquire slot_empty -> write -> release slot_full
//! reader: acquire slot_full  -> read  -> release slot_empty
//! ```
//!
//! The pair is seeded `slot_empty = 1, slot_full = 0` by whichever process
//! creates the semaphores. A process that finds them already present opens
//! them without touching their counts. The seed does not depend on which
//! role starts first: the first writer can always take `slot_empty` once, and
//! a reader can only take `slot_full` after a write. Both startup orders
//! therefore make progress.
//!
//! `*_read` is always created before `*_write`. A `*_write` that already
//! exists when `*_read` had to be created is left over from an earlier
//! session and may still be signaled; opening refuses it.

use crate::config::ChannelConfig;
use crate::errors::MailboxError;
use crate::semaphore::{BinarySemaphore, LocalSemaphore, NamedSemaphore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How long an acquire may block.
#[derive(Debug, Clone, Copy)]
pub enum Wait<'a> {
    /// Block until the permission is granted
    Forever,
    /// Block until granted or until the flag is set
    Cancellable(&'a AtomicBool),
    /// Block at most this long
    Timeout(Duration),
}

pub struct Handshake<S: BinarySemaphore = NamedSemaphore> {
    slot_empty: S,
    slot_full: S,
    poll_interval: Duration,
}

impl Handshake<NamedSemaphore> {
    /// Create or open the named semaphore pair for `config`.
    pub fn open(config: &ChannelConfig) -> Result<Self, MailboxError> {
        let read_name = config.sem_read_name();
        let write_name = config.sem_write_name();

        let (slot_empty, created_empty) = NamedSemaphore::create_or_open(&read_name, 1)
            .map_err(|e| MailboxError::init(&read_name, e))?;
        let (slot_full, created_full) = NamedSemaphore::create_or_open(&write_name, 0)
            .map_err(|e| MailboxError::init(&write_name, e))?;

        if created_empty && !created_full {
            drop(slot_empty);
            NamedSemaphore::unlink(&read_name)?;
            return Err(MailboxError::init(
                &write_name,
                "stale semaphore without its pair, unlink the channel before reuse",
            ));
        }
        if created_full && !created_empty {
            tracing::debug!(sem_write = %write_name, "Completed a pair started by a peer");
        }

        tracing::info!(
            sem_read = %read_name,
            sem_write = %write_name,
            created = created_empty && created_full,
            "Handshake semaphores ready"
        );

        Ok(Self::with_semaphores(slot_empty, slot_full, config.poll_interval))
    }

    /// Remove both semaphore names. Only the designated cleanup owner calls this.
    /// `*_read` goes first so a partial unlink is caught by `open`.
    pub fn unlink(config: &ChannelConfig) -> Result<(), MailboxError> {
        NamedSemaphore::unlink(&config.sem_read_name())?;
        NamedSemaphore::unlink(&config.sem_write_name())?;
        Ok(())
    }
}

impl Handshake<LocalSemaphore> {
    /// In-process pair, seeded like the named one.
    pub fn local(poll_interval: Duration) -> Self {
        Self::with_semaphores(
            LocalSemaphore::new(true),
            LocalSemaphore::new(false),
            poll_interval,
        )
    }
}

impl<S: BinarySemaphore> Handshake<S> {
    pub fn with_semaphores(slot_empty: S, slot_full: S, poll_interval: Duration) -> Self {
        Self {
            slot_empty,
            slot_full,
            poll_interval,
        }
    }

    /// Block until the slot may be filled.
    pub fn acquire_write(&self, wait: Wait<'_>) -> Result<WritePermit<'_, S>, MailboxError> {
        acquire(&self.slot_empty, wait, self.poll_interval)?;
        Ok(WritePermit {
            handshake: self,
            done: false,
        })
    }

    /// Block until the slot holds a message.
    pub fn acquire_read(&self, wait: Wait<'_>) -> Result<ReadPermit<'_, S>, MailboxError> {
        acquire(&self.slot_full, wait, self.poll_interval)?;
        Ok(ReadPermit {
            handshake: self,
            done: false,
        })
    }
}

fn acquire<S: BinarySemaphore>(
    sem: &S,
    wait: Wait<'_>,
    poll_interval: Duration,
) -> Result<(), MailboxError> {
    match wait {
        Wait::Forever => {
            sem.wait_acquire()?;
            Ok(())
        }
        Wait::Cancellable(stop) => loop {
            if stop.load(Ordering::Acquire) {
                return Err(MailboxError::Interrupted);
            }
            if sem.try_acquire_for(poll_interval)? {
                return Ok(());
            }
        },
        Wait::Timeout(timeout) => {
            let deadline = Instant::now() + timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if sem.try_acquire_for(remaining)? {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(MailboxError::TimedOut(timeout));
                }
            }
        }
    }
}

/// Exclusive right to fill the slot.
///
/// `commit` publishes the slot to the reader. Dropping the permit without
/// committing hands the slot back to writers instead, so a failed write is
/// never delivered.
pub struct WritePermit<'a, S: BinarySemaphore> {
    handshake: &'a Handshake<S>,
    done: bool,
}

impl<S: BinarySemaphore> WritePermit<'_, S> {
    pub fn commit(mut self) -> Result<(), MailboxError> {
        self.done = true;
        self.handshake.slot_full.signal_release()?;
        Ok(())
    }
}

impl<S: BinarySemaphore> Drop for WritePermit<'_, S> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.handshake.slot_empty.signal_release() {
            tracing::error!(error = %e, "Failed to return abandoned write permission");
        }
    }
}

/// Exclusive right to read the slot. Releasing (or dropping) marks the slot
/// empty for the writer.
pub struct ReadPermit<'a, S: BinarySemaphore> {
    handshake: &'a Handshake<S>,
    done: bool,
}

impl<S: BinarySemaphore> ReadPermit<'_, S> {
    pub fn release(mut self) -> Result<(), MailboxError> {
        self.done = true;
        self.handshake.slot_empty.signal_release()?;
        Ok(())
    }
}

impl<S: BinarySemaphore> Drop for ReadPermit<'_, S> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.handshake.slot_empty.signal_release() {
            tracing::error!(error = %e, "Failed to release read permission");
        }
    }
}
