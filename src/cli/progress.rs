//! Progress display for chunk downloads
//!
//! Consumes [`ChunkProgress`] events from the downloader and renders a byte
//! progress bar with indicatif when stderr is a terminal. Without a terminal
//! the events are only counted, and retries go to the log.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::ChunkProgress;

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Draw a progress bar (ignored when stderr is not a terminal)
    pub enable_progress_bar: bool,
    /// Spinner/redraw tick
    pub tick_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: true,
            tick_interval: Duration::from_millis(120),
        }
    }
}

/// What the display saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTally {
    pub total_chunks: usize,
    pub chunks_written: usize,
    pub bytes_written: u64,
    pub retries: usize,
}

impl ProgressTally {
    /// Fold one event into the tally
    pub fn apply(&mut self, event: &ChunkProgress) {
        match event {
            ChunkProgress::Started { total_chunks, .. } => self.total_chunks = *total_chunks,
            ChunkProgress::Written { bytes, .. } => {
                self.chunks_written += 1;
                self.bytes_written += bytes;
            }
            ChunkProgress::Retrying { .. } => self.retries += 1,
        }
    }
}

pub struct ProgressDisplay {
    config: ProgressConfig,
    is_terminal: bool,
}

impl ProgressDisplay {
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        Self {
            config,
            is_terminal,
        }
    }

    fn bar_enabled(&self) -> bool {
        self.config.enable_progress_bar && self.is_terminal
    }

    /// Drain `events` until the sender is dropped
    pub fn spawn(self, mut events: mpsc::Receiver<ChunkProgress>) -> JoinHandle<ProgressTally> {
        tokio::spawn(async move {
            let bar = if self.bar_enabled() {
                let bar = ProgressBar::new_spinner();
                bar.set_message("Preparing files");
                bar.enable_steady_tick(self.config.tick_interval);
                Some(bar)
            } else {
                None
            };

            let mut tally = ProgressTally::default();
            while let Some(event) = events.recv().await {
                tally.apply(&event);
                match (&event, &bar) {
                    (ChunkProgress::Started { total_bytes, .. }, Some(bar)) => {
                        bar.set_style(bar_style());
                        bar.set_length(*total_bytes);
                        bar.set_message("Downloading chunks");
                    }
                    (ChunkProgress::Written { bytes, .. }, Some(bar)) => bar.inc(*bytes),
                    (ChunkProgress::Retrying { path, attempts }, _) => {
                        warn!("Retrying chunk of {} (attempt {})", path.display(), attempts);
                    }
                    _ => {}
                }
            }

            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
            debug!(
                "Progress display saw {}/{} chunks",
                tally.chunks_written, tally.total_chunks
            );
            tally
        })
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {bytes_per_sec}",
        )
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
