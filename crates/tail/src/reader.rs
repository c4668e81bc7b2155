//! Polling tail reader.
//!
//! Waits for the log file to appear, seeds the consumer with the existing
//! content, then streams appended text as it shows up. Runs on its own task;
//! the consumer reads from the returned channel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cursor::FileCursor;

/// Default pause between existence checks and read polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(400);

const CHANNEL_CAPACITY: usize = 64;

/// Events emitted by a running [`TailReader`].
#[derive(Debug, PartialEq, Eq)]
pub enum TailEvent {
    /// Newly observed text, in file order. The first event after the file
    /// appears carries its entire current content.
    Data(String),
    /// The reader exited. Sent exactly once, always last.
    Finished,
}

/// Streams newly appended text from a file that may not exist yet.
#[derive(Debug)]
pub struct TailReader {
    path: PathBuf,
    poll_interval: Duration,
}

impl TailReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Spawns the polling task and returns the event channel.
    ///
    /// Cancellation is cooperative: the token is checked at every loop
    /// boundary, so a stop is observed within one poll interval and never
    /// interrupts a read in progress.
    pub fn spawn(self, cancel: CancellationToken) -> mpsc::Receiver<TailEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run(self.path, self.poll_interval, cancel, tx));
        rx
    }
}

async fn run(
    path: PathBuf,
    poll_interval: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<TailEvent>,
) {
    stream_file(&path, poll_interval, &cancel, &tx).await;
    // Exactly one Finished, no matter how the loop exited.
    let _ = tx.send(TailEvent::Finished).await;
    debug!(file = %path.display(), "tail reader finished");
}

async fn stream_file(
    path: &Path,
    poll_interval: Duration,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<TailEvent>,
) {
    // Wait for the file to exist (the writer may not have started yet).
    while !path.exists() {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    let mut cursor = FileCursor::new(path);
    debug!(file = %path.display(), "tailing log file");

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match cursor.advance() {
            Ok(adv) if !adv.text.is_empty() => {
                if adv.rotated {
                    debug!(file = %path.display(), "log file rotated, re-reading");
                }
                // Consumer gone means there is nothing left to tail for.
                if tx.send(TailEvent::Data(adv.text)).await.is_err() {
                    return;
                }
            }
            Ok(_) => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "error reading log file");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
    }
}
