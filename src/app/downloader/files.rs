//! Preallocated destination files with positional writes
//!
//! Every file gets one handle shared by all workers. Chunks cover disjoint
//! byte ranges, so writes need no locking beyond the OS.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::models::ManifestFile;
use crate::errors::{ChunkError, ChunkResult, DownloadError, DownloadResult};

/// A destination file sized to its final length
#[derive(Debug)]
pub struct TargetFile {
    path: PathBuf,
    handle: File,
}

impl TargetFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `data` at `offset` on the blocking pool
    pub async fn write_at(self: &Arc<Self>, offset: u64, data: Vec<u8>) -> ChunkResult<()> {
        let file = Arc::clone(self);
        tokio::task::spawn_blocking(move || write_all_at(&file.handle, &data, offset))
            .await
            .map_err(|e| ChunkError::WriteTask {
                reason: e.to_string(),
            })??;
        Ok(())
    }

    /// Flush file contents to disk
    pub async fn sync(self: &Arc<Self>) -> DownloadResult<()> {
        let file = Arc::clone(self);
        tokio::task::spawn_blocking(move || file.handle.sync_all())
            .await
            .unwrap_or_else(|e| Err(io::Error::new(io::ErrorKind::Other, e)))
            .map_err(|source| DownloadError::Prepare {
                path: self.path.clone(),
                source,
            })
    }
}

/// Create `file` under `root` and set its length before any chunk lands
pub async fn prepare_file(root: &Path, file: &ManifestFile) -> DownloadResult<Arc<TargetFile>> {
    let path = root.join(&file.path);
    let prepare_err = |source: io::Error| DownloadError::Prepare {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(prepare_err)?;
    }

    let handle = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .await
        .map_err(prepare_err)?;
    handle.set_len(file.total_size).await.map_err(prepare_err)?;

    Ok(Arc::new(TargetFile {
        handle: handle.into_std().await,
        path,
    }))
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
