use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How long to sleep between acquisition attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("timed out waiting for file lock at `{}`", _0.display())]
    Timeout(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An exclusive marker-file lock.
///
/// The lock is held by the existence of the file, created `O_CREAT|O_EXCL`;
/// contenders spin with a 100 ms sleep until the deadline passes. A crashed
/// holder leaves the marker behind, which is why callers treat leftover
/// `.lock` files from prior runs as garbage rather than as state.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock, blocking the current thread.
    pub fn acquire_blocking(
        path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        let path = path.into();
        let deadline = Instant::now() + timeout;
        loop {
            match Self::try_acquire(&path)? {
                Some(lock) => return Ok(lock),
                None => {
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout(path));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
            }
        }
    }

    /// Acquire the lock from async code, yielding between attempts.
    pub async fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self, LockError> {
        let path = path.into();
        let deadline = Instant::now() + timeout;
        loop {
            match Self::try_acquire(&path)? {
                Some(lock) => return Ok(lock),
                None => {
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout(path));
                    }
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        }
    }

    fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        match fs_err::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(_) => {
                debug!("acquired lock at {}", path.display());
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(LockError::Io(err)),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = fs_err::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("failed to release lock at {}: {err}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.lock");

        let held = FileLock::acquire_blocking(&path, Duration::from_secs(1)).unwrap();
        let contender = FileLock::acquire_blocking(&path, Duration::from_millis(250));
        assert!(matches!(contender, Err(LockError::Timeout(_))));

        drop(held);
        assert!(!path.exists());
        FileLock::acquire_blocking(&path, Duration::from_secs(1)).unwrap();
    }
}
