//! Shared FIFO of chunk work
//!
//! The lock is held only for a push or a pop. Retries go to the back.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::app::downloader::files::TargetFile;
use crate::app::models::ChunkDescriptor;

/// One chunk to fetch and where it goes
#[derive(Debug, Clone)]
pub struct ChunkTask {
    pub file: Arc<TargetFile>,
    pub chunk: ChunkDescriptor,
    /// Failed attempts so far
    pub attempts: u32,
    /// Index of the server that failed the last attempt
    pub last_failed_server: Option<usize>,
}

impl ChunkTask {
    pub fn new(file: Arc<TargetFile>, chunk: ChunkDescriptor) -> Self {
        Self {
            file,
            chunk,
            attempts: 0,
            last_failed_server: None,
        }
    }
}

/// Multi-producer multi-consumer chunk queue
#[derive(Debug, Default)]
pub struct ChunkQueue {
    tasks: Mutex<VecDeque<ChunkTask>>,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: ChunkTask) {
        self.tasks.lock().push_back(task);
    }

    pub fn pop(&self) -> Option<ChunkTask> {
        self.tasks.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}
