//! Deferred file deletion.
//!
//! Committing an upgrade scope retires the old segment's files, but the
//! physical unlink happens asynchronously on a background worker so commit
//! latency is not tied to filesystem unlink cost. The orchestrator calls
//! [`DeletionTracker::wait_for_pending`] before declaring completion so the
//! process never exits while stale files are still being cleaned up.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

#[derive(Default)]
struct DeletionState {
    queue: VecDeque<PathBuf>,
    in_flight: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<DeletionState>,
    condvar: Condvar,
}

/// Tracks files marked for removal and unlinks them on a background thread.
pub struct DeletionTracker {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl DeletionTracker {
    /// Creates a tracker and starts its worker thread.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(DeletionState::default()),
            condvar: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("strata-deletions".into())
            .spawn(move || Self::worker_loop(&worker_shared))
            .expect("failed to spawn deletion worker");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    fn worker_loop(shared: &Shared) {
        loop {
            let path = {
                let mut state = shared.state.lock();
                loop {
                    if let Some(path) = state.queue.pop_front() {
                        state.in_flight += 1;
                        break path;
                    }
                    if state.shutdown {
                        return;
                    }
                    shared.condvar.wait(&mut state);
                }
            };

            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "deleted retired file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "deferred deletion failed"),
            }

            let mut state = shared.state.lock();
            state.in_flight -= 1;
            shared.condvar.notify_all();
        }
    }

    /// Marks a file for asynchronous removal.
    pub fn defer(&self, path: PathBuf) {
        let mut state = self.shared.state.lock();
        state.queue.push_back(path);
        self.shared.condvar.notify_all();
    }

    /// Blocks until no deferred deletions remain.
    pub fn wait_for_pending(&self) {
        let mut state = self.shared.state.lock();
        while !state.queue.is_empty() || state.in_flight > 0 {
            self.shared.condvar.wait(&mut state);
        }
    }

    /// Number of deletions not yet performed.
    #[must_use]
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock();
        state.queue.len() + state.in_flight
    }
}

impl Default for DeletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeletionTracker {
    fn drop(&mut self) {
        self.wait_for_pending();
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.condvar.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for DeletionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionTracker")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
