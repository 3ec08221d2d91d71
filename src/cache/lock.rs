use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

/// Default lock timeout (5 minutes) - prevents indefinite hangs
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Exclusive advisory lock guarding one organization's stats file.
///
/// Runs for different repositories of the same organization share the file,
/// so every read-modify-write happens while holding this guard.
/// The lock is released when dropped.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
}

fn open_lock_file(lock_path: &Path) -> io::Result<File> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
}

impl CacheLock {
    /// Block until the lock is held, giving up after 5 minutes.
    /// Creates the lock file and parent dirs if needed.
    pub fn acquire(lock_path: &Path) -> io::Result<Self> {
        Self::acquire_with_timeout(lock_path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Poll with exponential backoff until the lock is held.
    /// Fails with `ErrorKind::TimedOut` once `timeout` has elapsed.
    pub fn acquire_with_timeout(lock_path: &Path, timeout: Duration) -> io::Result<Self> {
        let file = open_lock_file(lock_path)?;

        let start = Instant::now();
        let mut backoff = Duration::from_millis(10);
        let max_backoff = Duration::from_millis(500);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!(
                                "timed out after {:?} waiting for {}",
                                timeout,
                                lock_path.display()
                            ),
                        ));
                    }
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(lock_path: &Path) -> io::Result<Option<Self>> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_org_dir_and_lock_file() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("org1").join("stats.json.lock");

        let lock = CacheLock::acquire(&lock_path).unwrap();
        assert!(lock_path.exists());
        drop(lock);
    }

    #[test]
    fn held_lock_blocks_try_acquire_until_dropped() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("stats.json.lock");

        {
            let _lock = CacheLock::acquire(&lock_path).unwrap();
            assert!(CacheLock::try_acquire(&lock_path).unwrap().is_none());
        }
        assert!(CacheLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn contended_acquire_times_out() {
        let dir = tempdir().unwrap();
        let lock_path = Arc::new(dir.path().join("stats.json.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let holder_path = Arc::clone(&lock_path);
        let holder_barrier = Arc::clone(&barrier);
        let holder = thread::spawn(move || {
            let lock = CacheLock::acquire(&holder_path).unwrap();
            holder_barrier.wait();
            thread::sleep(Duration::from_millis(500));
            drop(lock);
        });

        barrier.wait();
        let err = CacheLock::acquire_with_timeout(&lock_path, Duration::from_millis(100))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        holder.join().unwrap();
    }

    #[test]
    fn waiter_gets_lock_after_release() {
        let dir = tempdir().unwrap();
        let lock_path = Arc::new(dir.path().join("stats.json.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let holder_path = Arc::clone(&lock_path);
        let holder_barrier = Arc::clone(&barrier);
        let holder = thread::spawn(move || {
            let lock = CacheLock::acquire(&holder_path).unwrap();
            holder_barrier.wait();
            thread::sleep(Duration::from_millis(50));
            drop(lock);
        });

        barrier.wait();
        let result = CacheLock::acquire_with_timeout(&lock_path, Duration::from_secs(2));
        assert!(result.is_ok(), "lock should be granted once released");

        holder.join().unwrap();
    }
}
