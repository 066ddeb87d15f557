use mailbox::{ChannelConfig, FramingMode, paths};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct CourierConfig {
    pub environment: Environment,
    pub channel_name: String,
    pub region_dir: PathBuf,
    pub capacity: usize,
    /// Pause between generated messages
    pub write_interval: Duration,
    /// Time trigger of the batch writer
    pub flush_interval: Duration,
    /// How often blocked waits re-check for shutdown
    pub poll_interval: Duration,
    /// Upper bound on the final batch flush at shutdown
    pub drain_timeout: Duration,
}

impl CourierConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let channel_name = env::var("SHM_CHANNEL_NAME")
            .unwrap_or_else(|_| paths::DEFAULT_CHANNEL_NAME.to_string());

        let region_dir = env::var("SHM_REGION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(paths::DEFAULT_REGION_DIR));

        let capacity = env::var("SHM_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(paths::DEFAULT_CAPACITY);

        let write_interval_ms = env::var("WRITE_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let flush_interval_ms = env::var("FLUSH_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let poll_interval_ms = env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&ms| ms > 0)
            .unwrap_or(100);

        let drain_timeout_ms = env::var("DRAIN_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000);

        Ok(Self {
            environment,
            channel_name,
            region_dir,
            capacity,
            write_interval: Duration::from_millis(write_interval_ms),
            flush_interval: Duration::from_millis(flush_interval_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
            drain_timeout: Duration::from_millis(drain_timeout_ms),
        })
    }

    pub fn channel_config(&self, framing: FramingMode) -> ChannelConfig {
        ChannelConfig::new(&self.channel_name)
            .with_region_dir(&self.region_dir)
            .with_capacity(self.capacity)
            .with_framing(framing)
            .with_poll_interval(self.poll_interval)
    }
}
