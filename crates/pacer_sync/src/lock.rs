//! Cross-process sync lock
//!
//! An advisory exclusive lock on a file next to the store. Whoever holds it is
//! the only process replaying and rewriting the queue. The lock is released
//! when the [`SyncLock`] is dropped or the process exits.

use fs2::FileExt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Attempts made by [`SyncLock::acquire`] before giving up
const ACQUIRE_ATTEMPTS: u32 = 3;

/// Pause between attempts; a status check holds the lock for far less
const ACQUIRE_BACKOFF: Duration = Duration::from_millis(50);

/// Held exclusive lock on the sync lock file
#[derive(Debug)]
pub struct SyncLock {
    file: File,
    path: PathBuf,
}

impl SyncLock {
    /// Take the lock without waiting; `None` if another holder has it
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Take the lock, retrying briefly before reporting it as held elsewhere
    pub async fn acquire(path: &Path) -> io::Result<Option<Self>> {
        for attempt in 1..=ACQUIRE_ATTEMPTS {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(Some(lock));
            }
            if attempt < ACQUIRE_ATTEMPTS {
                tokio::time::sleep(ACQUIRE_BACKOFF).await;
            }
        }
        tracing::warn!("Sync lock {} held by another process", path.display());
        Ok(None)
    }

    /// Whether some process holds the lock right now
    ///
    /// Checks with a shared lock so concurrent checks never block each other.
    /// A missing lock file means nobody has ever synced here.
    pub fn is_held(path: &Path) -> io::Result<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                FileExt::unlock(&file)?;
                Ok(false)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(true),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
