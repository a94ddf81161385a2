//! Download statistics and progress events

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Progress events emitted while a version is materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkProgress {
    /// Files are preallocated and chunk work is queued
    Started { total_chunks: usize, total_bytes: u64 },
    /// A chunk landed in its file
    Written { path: PathBuf, bytes: u64 },
    /// A chunk failed and went back on the queue
    Retrying { path: PathBuf, attempts: u32 },
}

/// Outcome of a successful materialization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub files_written: usize,
    pub files_skipped: usize,
    pub chunks_written: u64,
    pub bytes_written: u64,
    pub retries: u64,
    pub elapsed: Duration,
}

impl DownloadSummary {
    /// Average throughput in bytes per second
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_written as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files ({} skipped), {} chunks, {:.1} MB in {:.1}s ({:.1} MB/s), {} retries",
            self.files_written,
            self.files_skipped,
            self.chunks_written,
            self.bytes_written as f64 / 1_048_576.0,
            self.elapsed.as_secs_f64(),
            self.bytes_per_second() / 1_048_576.0,
            self.retries
        )
    }
}

/// Counters shared by the workers of one materialization
#[derive(Debug, Default)]
pub struct DownloadCounters {
    chunks: AtomicU64,
    bytes: AtomicU64,
    retries: AtomicU64,
}

impl DownloadCounters {
    pub fn record_chunk(&self, bytes: u64) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(
        &self,
        files_written: usize,
        files_skipped: usize,
        elapsed: Duration,
    ) -> DownloadSummary {
        DownloadSummary {
            files_written,
            files_skipped,
            chunks_written: self.chunks.load(Ordering::Relaxed),
            bytes_written: self.bytes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_summary() {
        let counters = DownloadCounters::default();
        counters.record_chunk(5);
        counters.record_chunk(5);
        counters.record_retry();

        let summary = counters.summary(1, 2, Duration::from_secs(2));
        assert_eq!(summary.chunks_written, 2);
        assert_eq!(summary.bytes_written, 10);
        assert_eq!(summary.retries, 1);
        assert_eq!(summary.bytes_per_second(), 5.0);
        assert!(summary.to_string().contains("1 files (2 skipped)"));
    }

    #[test]
    fn test_zero_elapsed_rate() {
        assert_eq!(DownloadSummary::default().bytes_per_second(), 0.0);
    }
}
