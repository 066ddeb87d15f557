use anyhow::Context;
use clap::Parser;
use common::setup_logging;
use courier::{Cli, CourierConfig, service};
use mailbox::Mailbox;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CourierConfig::from_env()?;
    setup_logging(&config.environment);
    let shutdown = Arc::new(AtomicBool::new(false));

    for signal in [SIGTERM, SIGINT] {
        // A second signal while shutting down exits at once
        flag::register_conditional_shutdown(signal, 1, Arc::clone(&shutdown))?;
        flag::register(signal, Arc::clone(&shutdown))?;
    }

    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");
    tracing::info!(
        mode = %cli.mode,
        channel = %config.channel_name,
        capacity = config.capacity,
        "Courier starting"
    );

    let result = service::run(cli.mode, &config, cli.count, &shutdown);

    if cli.owner {
        Mailbox::destroy(&config.channel_config(cli.mode.framing()))
            .context("Failed to unlink shared channel objects")?;
    }

    match result {
        Ok(handled) => {
            tracing::info!(mode = %cli.mode, handled, "Courier stopped gracefully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Courier failed: {:#}", e);
            anyhow::bail!("Courier error: {}", e)
        }
    }
}
