//! Chunk workers
//!
//! A worker pops tasks until the queue is empty or another worker has
//! aborted the download. A failed chunk goes back on the queue until it has
//! used up its attempts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::app::cdn::{decode_chunk, CdnClient};
use crate::app::downloader::queue::{ChunkQueue, ChunkTask};
use crate::app::downloader::stats::{ChunkProgress, DownloadCounters};
use crate::app::models::{DepotKey, ServerEndpoint};
use crate::errors::{ChunkResult, DownloadError, DownloadResult};

/// State shared by all workers of one materialization
pub struct WorkerContext {
    pub queue: Arc<ChunkQueue>,
    pub cdn: Arc<dyn CdnClient>,
    pub servers: Arc<[ServerEndpoint]>,
    pub key: DepotKey,
    pub depot_id: u32,
    pub max_chunk_retries: u32,
    pub exclude_failed_server: bool,
    pub abort: AtomicBool,
    pub counters: DownloadCounters,
    pub progress: Option<mpsc::Sender<ChunkProgress>>,
}

impl WorkerContext {
    fn report(&self, event: ChunkProgress) {
        if let Some(tx) = &self.progress {
            // Progress is best effort: a full or closed channel drops the event
            let _ = tx.try_send(event);
        }
    }
}

/// One worker of the pool
pub struct ChunkWorker {
    id: usize,
    ctx: Arc<WorkerContext>,
}

impl ChunkWorker {
    pub fn new(id: usize, ctx: Arc<WorkerContext>) -> Self {
        Self { id, ctx }
    }

    /// Drain the queue; returns the first fatal chunk failure
    pub async fn run(self) -> DownloadResult<()> {
        let ctx = &self.ctx;
        loop {
            if ctx.abort.load(Ordering::SeqCst) {
                debug!("Worker {} stopping: download aborted", self.id);
                return Ok(());
            }
            let Some(mut task) = ctx.queue.pop() else {
                debug!("Worker {} stopping: queue drained", self.id);
                return Ok(());
            };

            let server = pick_server(
                ctx.servers.len(),
                task.last_failed_server,
                ctx.exclude_failed_server,
            );

            match self.process(&task, server).await {
                Ok(bytes) => {
                    ctx.counters.record_chunk(bytes);
                    ctx.report(ChunkProgress::Written {
                        path: task.file.path().to_path_buf(),
                        bytes,
                    });
                }
                Err(e) if task.attempts >= ctx.max_chunk_retries => {
                    ctx.abort.store(true, Ordering::SeqCst);
                    error!(
                        "Chunk {} of {} failed for good: {}",
                        task.chunk.id,
                        task.file.path().display(),
                        e
                    );
                    return Err(DownloadError::RetriesExhausted {
                        chunk_id: task.chunk.id.to_hex(),
                        path: task.file.path().to_path_buf(),
                        attempts: task.attempts + 1,
                        source: e,
                    });
                }
                Err(e) => {
                    task.attempts += 1;
                    task.last_failed_server = Some(server);
                    ctx.counters.record_retry();
                    warn!(
                        "Chunk {} of {} failed on {} (attempt {}): {}",
                        task.chunk.id,
                        task.file.path().display(),
                        ctx.servers[server],
                        task.attempts,
                        e
                    );
                    ctx.report(ChunkProgress::Retrying {
                        path: task.file.path().to_path_buf(),
                        attempts: task.attempts,
                    });
                    ctx.queue.push(task);
                }
            }
        }
    }

    async fn process(&self, task: &ChunkTask, server: usize) -> ChunkResult<u64> {
        let ctx = &self.ctx;
        let raw = ctx
            .cdn
            .download_chunk(&ctx.servers[server], ctx.depot_id, &task.chunk.id)
            .await?;
        let data = decode_chunk(&raw, &ctx.key, &task.chunk)?;
        let len = data.len() as u64;
        task.file.write_at(task.chunk.offset, data).await?;
        Ok(len)
    }
}

/// Pick a server uniformly at random, skipping the one that just failed
fn pick_server(count: usize, last_failed: Option<usize>, exclude_failed: bool) -> usize {
    let mut rng = rand::thread_rng();
    match last_failed {
        Some(failed) if exclude_failed && count > 1 && failed < count => {
            let pick = rng.gen_range(0..count - 1);
            if pick >= failed {
                pick + 1
            } else {
                pick
            }
        }
        _ => rng.gen_range(0..count),
    }
}
