use crate::framing::FramingError;
use crate::semaphore::SemaphoreError;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Failed to initialize {resource}: {reason}")]
    Initialization { resource: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Semaphore error: {0}")]
    Semaphore(#[from] SemaphoreError),

    #[error("Operation interrupted")]
    Interrupted,

    #[error("Timed out after {0:?} waiting for slot permission")]
    TimedOut(Duration),
}

impl MailboxError {
    pub(crate) fn init(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Initialization {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Framing errors leave the channel usable; the next transfer can proceed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Framing(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
