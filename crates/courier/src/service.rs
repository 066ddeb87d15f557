use crate::cli::Mode;
use crate::config::CourierConfig;
use anyhow::{Context, Result};
use common::span;
use mailbox::{BatchSender, BinarySemaphore, Mailbox, MailboxError, Wait, split_lines};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Open the channel for `mode` and run that role until `limit` messages,
/// shutdown, or a fatal error. Returns the number of messages handled.
pub fn run(
    mode: Mode,
    config: &CourierConfig,
    limit: Option<u64>,
    shutdown: &AtomicBool,
) -> Result<u64> {
    let _s = span!("courier");
    let channel = config.channel_config(mode.framing());
    let mut mailbox = Mailbox::open(channel)
        .with_context(|| format!("Failed to open shared mailbox {}", config.channel_name))?;

    let handled = match mode {
        Mode::Write => write_text(&mut mailbox, config.write_interval, limit, shutdown)?,
        Mode::Read => read_text(&mut mailbox, limit, shutdown, |message| {
            tracing::info!(%message, "Received message");
        })?,
        Mode::BatchWrite => batch_write(mailbox, config, limit, shutdown)?,
        Mode::BatchRead => batch_read(&mut mailbox, limit, shutdown, log_batch)?,
        Mode::BinWrite => write_binary(&mut mailbox, config.write_interval, limit, shutdown)?,
        Mode::BinRead => read_binary(&mut mailbox, limit, shutdown, |payload| {
            tracing::info!(
                bytes = payload.len(),
                preview = %String::from_utf8_lossy(payload),
                "Received payload"
            );
        })?,
    };

    Ok(handled)
}

pub fn text_message(idx: u64) -> String {
    format!("Hello from Rust! {idx}")
}

/// Index as 8 big-endian bytes followed by the text greeting.
pub fn binary_message(idx: u64) -> Vec<u8> {
    let text = text_message(idx);
    let mut payload = Vec::with_capacity(8 + text.len());
    payload.extend_from_slice(&idx.to_be_bytes());
    payload.extend_from_slice(text.as_bytes());
    payload
}

/// Outcome of a failed transfer inside a loop.
enum Step {
    Continue,
    Stop,
}

fn triage(error: MailboxError, operation: &str) -> Result<Step> {
    if error.is_interrupted() {
        tracing::info!("{} interrupted, shutting down", operation);
        return Ok(Step::Stop);
    }
    if error.is_recoverable() {
        tracing::warn!(error = %error, "{} skipped", operation);
        return Ok(Step::Continue);
    }
    Err(error).with_context(|| format!("{operation} failed"))
}

fn reached(count: u64, limit: Option<u64>) -> bool {
    limit.is_some_and(|limit| count >= limit)
}

fn pause(interval: Duration) {
    if !interval.is_zero() {
        thread::sleep(interval);
    }
}

pub fn write_text<S: BinarySemaphore>(
    mailbox: &mut Mailbox<S>,
    interval: Duration,
    limit: Option<u64>,
    shutdown: &AtomicBool,
) -> Result<u64> {
    let mut idx = 0u64;

    while !reached(idx, limit) && !shutdown.load(Ordering::Acquire) {
        match mailbox.send_text(&text_message(idx), Wait::Cancellable(shutdown)) {
            Ok(()) => idx += 1,
            Err(e) => match triage(e, "Write")? {
                Step::Continue => idx += 1,
                Step::Stop => break,
            },
        }
        pause(interval);
    }

    tracing::info!(sent = idx, "Write test stopped");
    Ok(idx)
}

pub fn read_text<S: BinarySemaphore>(
    mailbox: &mut Mailbox<S>,
    limit: Option<u64>,
    shutdown: &AtomicBool,
    mut on_message: impl FnMut(&str),
) -> Result<u64> {
    let mut received = 0u64;

    while !reached(received, limit) {
        match mailbox.recv_text(Wait::Cancellable(shutdown)) {
            Ok(message) => {
                received += 1;
                if !message.is_empty() {
                    on_message(&message);
                }
            }
            Err(e) => match triage(e, "Read")? {
                Step::Continue => continue,
                Step::Stop => break,
            },
        }
    }

    Ok(received)
}

pub fn write_binary<S: BinarySemaphore>(
    mailbox: &mut Mailbox<S>,
    interval: Duration,
    limit: Option<u64>,
    shutdown: &AtomicBool,
) -> Result<u64> {
    let mut idx = 0u64;

    while !reached(idx, limit) && !shutdown.load(Ordering::Acquire) {
        match mailbox.send_binary(&binary_message(idx), Wait::Cancellable(shutdown)) {
            Ok(()) => idx += 1,
            Err(e) => match triage(e, "Binary write")? {
                Step::Continue => idx += 1,
                Step::Stop => break,
            },
        }
        pause(interval);
    }

    tracing::info!(sent = idx, "Binary write stopped");
    Ok(idx)
}

pub fn read_binary<S: BinarySemaphore>(
    mailbox: &mut Mailbox<S>,
    limit: Option<u64>,
    shutdown: &AtomicBool,
    mut on_payload: impl FnMut(&[u8]),
) -> Result<u64> {
    let mut received = 0u64;

    while !reached(received, limit) {
        match mailbox.recv_binary(Wait::Cancellable(shutdown)) {
            Ok(payload) => {
                received += 1;
                on_payload(&payload);
            }
            Err(e) => match triage(e, "Binary read")? {
                Step::Continue => continue,
                Step::Stop => break,
            },
        }
    }

    Ok(received)
}

/// Generate messages through a batcher. On shutdown or after `limit`
/// messages, whatever is still buffered is flushed once, bounded by the
/// configured drain timeout.
pub fn batch_write<S: BinarySemaphore>(
    mailbox: Mailbox<S>,
    config: &CourierConfig,
    limit: Option<u64>,
    shutdown: &AtomicBool,
) -> Result<u64> {
    let mut sender = BatchSender::new(mailbox, config.flush_interval);
    let mut idx = 0u64;

    let outcome = loop {
        if reached(idx, limit) || shutdown.load(Ordering::Acquire) {
            break Ok(());
        }

        let sent = sender
            .poll(Wait::Cancellable(shutdown))
            .and_then(|_| sender.send(&text_message(idx), Wait::Cancellable(shutdown)));

        match sent {
            Ok(flushed) => {
                if let Some(lines) = flushed {
                    tracing::debug!(lines, "Batch written");
                }
                idx += 1;
            }
            Err(e) => match triage(e, "Batch write") {
                Ok(Step::Continue) => idx += 1,
                Ok(Step::Stop) => break Ok(()),
                Err(e) => break Err(e),
            },
        }
        pause(config.write_interval);
    };

    let pending = sender.batcher().len();
    match sender.finish(Wait::Timeout(config.drain_timeout)) {
        Ok((Some(lines), _)) => tracing::info!(lines, "Final batch flushed"),
        Ok((None, _)) => {}
        Err(e) => tracing::warn!(error = %e, lines = pending, "Final batch dropped"),
    }

    outcome.map(|()| idx)
}

const BATCH_SEPARATOR: &str = "================";

/// Separator line, then one entry per received line.
fn log_batch(lines: &[&str]) {
    tracing::info!("{}", BATCH_SEPARATOR);
    for line in lines {
        tracing::info!(message = %line, "Received message");
    }
}

/// Receive batches, handing the non-empty lines of each non-empty batch to
/// `on_batch`. `limit` counts batches, empty ones included.
pub fn batch_read<S: BinarySemaphore>(
    mailbox: &mut Mailbox<S>,
    limit: Option<u64>,
    shutdown: &AtomicBool,
    mut on_batch: impl FnMut(&[&str]),
) -> Result<u64> {
    let mut batches = 0u64;

    while !reached(batches, limit) {
        match mailbox.recv_text(Wait::Cancellable(shutdown)) {
            Ok(text) => {
                batches += 1;
                if !text.is_empty() {
                    let lines: Vec<&str> = split_lines(&text).collect();
                    on_batch(&lines);
                }
            }
            Err(e) => match triage(e, "Batch read")? {
                Step::Continue => continue,
                Step::Stop => break,
            },
        }
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailbox::{Channel, ChannelConfig, FramingMode, Handshake, LocalSemaphore, SharedRegion};
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    type LocalMailbox = Mailbox<Arc<LocalSemaphore>>;

    fn local_pair(dir: &TempDir, framing: FramingMode) -> (LocalMailbox, LocalMailbox) {
        let config = ChannelConfig::new("courier")
            .with_region_dir(dir.path())
            .with_framing(framing)
            .with_poll_interval(Duration::from_millis(5));
        let empty = Arc::new(LocalSemaphore::new(true));
        let full = Arc::new(LocalSemaphore::new(false));

        let endpoint = || {
            let region =
                SharedRegion::create_or_open(config.region_path(), config.capacity).unwrap();
            let handshake = Handshake::with_semaphores(
                Arc::clone(&empty),
                Arc::clone(&full),
                config.poll_interval,
            );
            Mailbox::from_parts(config.clone(), Channel::new(region, framing), handshake)
        };

        (endpoint(), endpoint())
    }

    fn test_config(dir: &TempDir) -> CourierConfig {
        CourierConfig {
            environment: common::Environment::Development,
            channel_name: "courier".to_string(),
            region_dir: dir.path().to_path_buf(),
            capacity: 4096,
            write_interval: Duration::ZERO,
            flush_interval: Duration::from_secs(1),
            poll_interval: Duration::from_millis(5),
            drain_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_binary_message_layout() {
        let payload = binary_message(258);
        assert_eq!(&payload[..8], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&payload[8..], b"Hello from Rust! 258");
    }

    #[test]
    fn test_text_writer_and_reader_exchange_in_order() {
        let dir = tempdir().unwrap();
        let (mut producer, mut consumer) = local_pair(&dir, FramingMode::Text);
        let shutdown = Arc::new(AtomicBool::new(false));

        let writer = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || write_text(&mut producer, Duration::ZERO, Some(50), &shutdown))
        };

        let mut seen = Vec::new();
        let received =
            read_text(&mut consumer, Some(50), &shutdown, |m| seen.push(m.to_string())).unwrap();

        assert_eq!(writer.join().unwrap().unwrap(), 50);
        assert_eq!(received, 50);
        let expected: Vec<String> = (0..50).map(text_message).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_binary_writer_and_reader_exchange_in_order() {
        let dir = tempdir().unwrap();
        let (mut producer, mut consumer) = local_pair(&dir, FramingMode::Binary);
        let shutdown = Arc::new(AtomicBool::new(false));

        let writer = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || write_binary(&mut producer, Duration::ZERO, Some(20), &shutdown))
        };

        let mut seen = Vec::new();
        read_binary(&mut consumer, Some(20), &shutdown, |p| seen.push(p.to_vec())).unwrap();

        assert_eq!(writer.join().unwrap().unwrap(), 20);
        let expected: Vec<Vec<u8>> = (0..20).map(binary_message).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_batch_writer_delivers_every_line_including_leftover() {
        let dir = tempdir().unwrap();
        let (producer, mut consumer) = local_pair(&dir, FramingMode::Text);
        let config = test_config(&dir);
        let shutdown = Arc::new(AtomicBool::new(false));

        let writer = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || batch_write(producer, &config, Some(1000), &shutdown))
        };

        let mut lines = Vec::new();
        while lines.len() < 1000 {
            batch_read(&mut consumer, Some(1), &shutdown, |batch| {
                lines.extend(batch.iter().map(|l| l.to_string()))
            })
            .unwrap();
        }

        assert_eq!(writer.join().unwrap().unwrap(), 1000);
        let expected: Vec<String> = (0..1000).map(text_message).collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_batch_reader_reports_each_nonempty_batch_once() {
        let dir = tempdir().unwrap();
        let (mut producer, mut consumer) = local_pair(&dir, FramingMode::Text);
        let shutdown = AtomicBool::new(false);

        let mut batches: Vec<Vec<String>> = Vec::new();
        for text in ["a\nb\n", "", "c\n\n"] {
            producer.send_text(text, Wait::Forever).unwrap();
            let received = batch_read(&mut consumer, Some(1), &shutdown, |batch| {
                batches.push(batch.iter().map(|l| l.to_string()).collect());
            })
            .unwrap();
            assert_eq!(received, 1);
        }

        assert_eq!(batches, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_reader_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let (_producer, mut consumer) = local_pair(&dir, FramingMode::Text);
        let shutdown = AtomicBool::new(true);

        let received = read_text(&mut consumer, None, &shutdown, |_| {}).unwrap();
        assert_eq!(received, 0);
    }

    #[test]
    fn test_writer_stops_on_shutdown_without_sending() {
        let dir = tempdir().unwrap();
        let (mut producer, _consumer) = local_pair(&dir, FramingMode::Text);
        let shutdown = AtomicBool::new(true);

        assert_eq!(write_text(&mut producer, Duration::ZERO, None, &shutdown).unwrap(), 0);
    }
}
