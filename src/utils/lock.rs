//! Single-instance guard shared by every invocation of the tool.
//!
//! All thermostats hang off one RS485 line, so two processes talking at the
//! same time corrupt each other's frames. The guard is an advisory exclusive
//! lock on a well-known file; contention is polled once per second.

use fs2::FileExt;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::error::{TstatError, TstatResult};

pub const LOCK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Held for the whole run. Dropping it removes the lock file and releases the lock.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub async fn acquire(path: &Path) -> TstatResult<Self> {
        Self::acquire_with_poll(path, LOCK_POLL_INTERVAL).await
    }

    pub async fn acquire_with_poll(path: &Path, poll: Duration) -> TstatResult<Self> {
        let contended = fs2::lock_contended_error().raw_os_error();
        let mut waiting = false;

        loop {
            let file = open_lock_file(path)?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    // The previous holder may have unlinked the file between our open and lock.
                    if !still_linked(&file, path) {
                        debug!("Lock file {} was replaced, retrying", path.display());
                        let _ = file.unlock();
                        continue;
                    }
                    if waiting {
                        eprintln!("Lock acquired.");
                    }
                    debug!("Holding instance lock {}", path.display());
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.raw_os_error() == contended => {
                    if !waiting {
                        eprintln!("Another instance is already running. Waiting for the lock...");
                        waiting = true;
                    }
                    tokio::time::sleep(poll).await;
                }
                Err(e) => {
                    return Err(TstatError::LockError(format!(
                        "Could not acquire lock {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Error removing lock file {}: {}", self.path.display(), e);
        }
        if let Err(e) = self.file.unlock() {
            warn!("Error releasing lock {}: {}", self.path.display(), e);
        }
    }
}

fn open_lock_file(path: &Path) -> TstatResult<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| TstatError::LockError(format!("opening lock file {} failed: {}", path.display(), e)))
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, _path: &Path) -> bool {
    true
}
