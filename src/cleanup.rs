//! # Deferred Artifact Cleanup
//!
//! Every artifact the pipeline writes (uploads and processed outputs) is
//! scheduled here exactly once and removed by a background sweep after a
//! fixed delay, regardless of whether delivery succeeded. The queue is
//! decoupled from request lifetimes: a request finishes, its entries stay
//! until due.
//!
//! ## Key Properties:
//! - **Idempotent deletion**: a file already gone at sweep time is not an error
//! - **Best-effort**: sweep failures are logged and swallowed, never surfaced
//! - **Testable without sleeping**: `drain_due(now)` exposes the due predicate
//!   so tests pass an explicit instant instead of waiting out the delay

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct CleanupEntry {
    path: PathBuf,
    due_at: Instant,
}

/// A shared queue of artifact paths awaiting deferred deletion.
///
/// Cloning is cheap; all clones share the same entry list. One clone runs
/// the background sweep loop, the rest schedule from request handlers.
#[derive(Clone)]
pub struct CleanupQueue {
    entries: Arc<Mutex<Vec<CleanupEntry>>>,
    delay: Duration,
}

impl CleanupQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            delay,
        }
    }

    /// The fixed post-delivery interval before an artifact is deleted.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule a path for deletion `delay` from now.
    pub fn schedule(&self, path: PathBuf) {
        let due_at = Instant::now() + self.delay;
        debug!(path = %path.display(), delay_secs = self.delay.as_secs(), "artifact scheduled for cleanup");
        self.entries.lock().unwrap().push(CleanupEntry { path, due_at });
    }

    /// Number of artifacts still waiting to be swept.
    pub fn pending(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Remove and return every entry due at or before `now`.
    ///
    /// This is the cleanup-due predicate: tests drive it with a chosen
    /// instant, the sweep loop drives it with the wall clock.
    pub fn drain_due(&self, now: Instant) -> Vec<PathBuf> {
        let mut entries = self.entries.lock().unwrap();
        let mut due = Vec::new();
        entries.retain(|entry| {
            if entry.due_at <= now {
                due.push(entry.path.clone());
                false
            } else {
                true
            }
        });
        due
    }

    /// Delete every due artifact. Returns how many entries were processed.
    ///
    /// Deletion is idempotent and best-effort; see [`remove_artifact`].
    pub async fn sweep(&self, now: Instant) -> usize {
        let due = self.drain_due(now);
        let count = due.len();
        for path in due {
            remove_artifact(&path).await;
        }
        count
    }

    /// Background sweep loop, spawned once at startup.
    ///
    /// Runs for the lifetime of the process; ticks once a second so an
    /// artifact is removed within about a second of becoming due.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tick.tick().await;
            self.sweep(Instant::now()).await;
        }
    }
}

/// Delete one artifact, swallowing every failure.
///
/// A missing file is the expected case after a double schedule or a manual
/// cleanup and logs at debug; anything else logs a warning. Nothing here
/// can reach a client.
async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "artifact removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "artifact already removed");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "artifact cleanup failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_become_due_after_delay() {
        let queue = CleanupQueue::new(Duration::from_secs(60));
        queue.schedule(PathBuf::from("a.wav"));

        let now = Instant::now();
        assert!(queue.drain_due(now).is_empty(), "nothing due before the delay");
        assert_eq!(queue.pending(), 1);

        let later = now + Duration::from_secs(61);
        let due = queue.drain_due(later);
        assert_eq!(due, vec![PathBuf::from("a.wav")]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_drain_only_takes_due_entries() {
        let queue = CleanupQueue::new(Duration::from_secs(0));
        queue.schedule(PathBuf::from("due.wav"));

        let slow = CleanupQueue {
            entries: queue.entries.clone(),
            delay: Duration::from_secs(600),
        };
        slow.schedule(PathBuf::from("later.wav"));

        let due = queue.drain_due(Instant::now());
        assert_eq!(due, vec![PathBuf::from("due.wav")]);
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_files_idempotently() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("upload.wav");
        tokio::fs::write(&file, b"pcm").await.unwrap();

        let queue = CleanupQueue::new(Duration::from_secs(0));
        queue.schedule(file.clone());
        // Scheduling the same path twice must not make the second sweep fail
        queue.schedule(file.clone());

        assert_eq!(queue.sweep(Instant::now()).await, 2);
        assert!(!file.exists());

        // Sweeping an already-empty queue is a no-op
        assert_eq!(queue.sweep(Instant::now()).await, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let queue = CleanupQueue::new(Duration::from_secs(0));
        queue.schedule(PathBuf::from("/nonexistent/artifact.wav"));
        // Must not panic or propagate the io error
        assert_eq!(queue.sweep(Instant::now()).await, 1);
    }
}
