use clap::{Parser, ValueEnum};
use mailbox::FramingMode;
use std::fmt;

/// Pass messages between two processes through a shared memory slot.
#[derive(Debug, Parser)]
#[command(name = "courier", version)]
pub struct Cli {
    /// Role of this process
    #[arg(value_enum)]
    pub mode: Mode,

    /// Stop after this many messages (batches, for batch_read)
    #[arg(long)]
    pub count: Option<u64>,

    /// Unlink the shared region and semaphores on exit
    #[arg(long)]
    pub owner: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    #[value(name = "read")]
    Read,
    #[value(name = "write")]
    Write,
    #[value(name = "batch_read")]
    BatchRead,
    #[value(name = "batch_write")]
    BatchWrite,
    #[value(name = "bin_read")]
    BinRead,
    #[value(name = "bin_write")]
    BinWrite,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
            Mode::BatchRead => "batch_read",
            Mode::BatchWrite => "batch_write",
            Mode::BinRead => "bin_read",
            Mode::BinWrite => "bin_write",
        }
    }

    pub fn framing(&self) -> FramingMode {
        match self {
            Mode::BinRead | Mode::BinWrite => FramingMode::Binary,
            _ => FramingMode::Text,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
