//! Background compaction management.
//!
//! The upgrade orchestrator does not schedule compactions itself, but other
//! maintenance paths may have in-flight background work when an upgrade run
//! finishes. [`CompactionManager::drain_and_stop`] implements the shutdown
//! contract: stop accepting new work and wait, with a bounded timeout, for
//! everything in flight to complete.

use crate::error::{CoreError, CoreResult};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

type Job = Box<dyn FnOnce() + Send>;

/// Result of draining the compaction manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// All queued and in-flight work finished within the timeout.
    Drained,
    /// The timeout elapsed with work still outstanding.
    ///
    /// Not fatal for an upgrade: committed conversions are already durable.
    TimedOut,
}

#[derive(Default)]
struct CompactionState {
    queue: VecDeque<Job>,
    in_flight: usize,
    accepting: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<CompactionState>,
    condvar: Condvar,
}

/// Runs background compaction jobs on a single worker thread.
pub struct CompactionManager {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    /// Set when a drain timed out; the worker is then abandoned on drop
    /// rather than joined, so a stuck job cannot block the caller past
    /// the timeout it asked for.
    abandoned: AtomicBool,
}

impl CompactionManager {
    /// Creates a manager and starts its worker thread.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(CompactionState {
                accepting: true,
                ..CompactionState::default()
            }),
            condvar: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("strata-compaction".into())
            .spawn(move || Self::worker_loop(&worker_shared))
            .expect("failed to spawn compaction worker");

        Self {
            shared,
            worker: Some(worker),
            abandoned: AtomicBool::new(false),
        }
    }

    fn worker_loop(shared: &Shared) {
        loop {
            let job = {
                let mut state = shared.state.lock();
                loop {
                    if let Some(job) = state.queue.pop_front() {
                        state.in_flight += 1;
                        break job;
                    }
                    if state.shutdown {
                        return;
                    }
                    shared.condvar.wait(&mut state);
                }
            };

            job();

            let mut state = shared.state.lock();
            state.in_flight -= 1;
            shared.condvar.notify_all();
        }
    }

    /// Submits a background job.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] once the manager has been drained.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> CoreResult<()> {
        let mut state = self.shared.state.lock();
        if !state.accepting {
            return Err(CoreError::invalid_operation(
                "compaction manager is no longer accepting work",
            ));
        }
        state.queue.push_back(Box::new(job));
        self.shared.condvar.notify_all();
        Ok(())
    }

    /// Stops accepting work and waits for in-flight work, up to `timeout`.
    pub fn drain_and_stop(&self, timeout: Duration) -> DrainOutcome {
        let deadline = Instant::now() + timeout;

        let mut state = self.shared.state.lock();
        state.accepting = false;
        state.shutdown = true;
        self.shared.condvar.notify_all();

        while !state.queue.is_empty() || state.in_flight > 0 {
            if self
                .shared
                .condvar
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                if state.queue.is_empty() && state.in_flight == 0 {
                    break;
                }
                self.abandoned.store(true, Ordering::Release);
                return DrainOutcome::TimedOut;
            }
        }

        debug!("compaction manager drained");
        DrainOutcome::Drained
    }

    /// Number of jobs queued or running.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        let state = self.shared.state.lock();
        state.queue.len() + state.in_flight
    }
}

impl Default for CompactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CompactionManager {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.accepting = false;
            state.shutdown = true;
            self.shared.condvar.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if self.abandoned.load(Ordering::Acquire) {
                // Joining would block on the stuck job the drain already
                // timed out on. The worker exits on its own once the job
                // finishes, or dies with the process.
                drop(worker);
            } else {
                let _ = worker.join();
            }
        }
    }
}

impl std::fmt::Debug for CompactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionManager")
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}
