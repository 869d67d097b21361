//! Single-flight background task slots
//!
//! A [`TaskSlot`] holds at most one in-flight background operation. Starting
//! while busy is a no-op (not a queue), and the finished outcome is handed
//! out exactly once through [`TaskSlot::poll_result`]. The main loop never
//! waits on a slot, it only polls.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Error, Result};

/// Boxed unit of background work handed to a [`Spawner`]
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes background jobs
///
/// Production code runs jobs on the tokio blocking pool; tests run them
/// inline so a slot completes synchronously inside `try_start`.
pub trait Spawner: Send + Sync {
    /// Run `job` on a background execution context
    fn spawn(&self, name: &'static str, job: Job);
}

/// Runs jobs on a tokio runtime's blocking thread pool
#[derive(Debug, Clone)]
pub struct RuntimeSpawner {
    handle: tokio::runtime::Handle,
}

impl RuntimeSpawner {
    /// Create a spawner bound to a runtime handle
    #[must_use]
    pub const fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Spawner for RuntimeSpawner {
    fn spawn(&self, name: &'static str, job: Job) {
        tracing::trace!(task = name, "spawning background task");
        // Completion is observed through the slot, not the join handle
        drop(self.handle.spawn_blocking(job));
    }
}

/// Runs jobs synchronously on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineSpawner;

impl Spawner for InlineSpawner {
    fn spawn(&self, _name: &'static str, job: Job) {
        job();
    }
}

struct SlotState<T> {
    running: bool,
    outcome: Option<Result<T>>,
    launches: u64,
}

/// Reusable single-task-at-a-time executor with a pollable result
pub struct TaskSlot<T> {
    name: &'static str,
    state: Arc<Mutex<SlotState<T>>>,
    spawner: Arc<dyn Spawner>,
}

impl<T: Send + 'static> TaskSlot<T> {
    /// Create an idle slot
    #[must_use]
    pub fn new(name: &'static str, spawner: Arc<dyn Spawner>) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(SlotState {
                running: false,
                outcome: None,
                launches: 0,
            })),
            spawner,
        }
    }

    /// Launch `work` unless a task is already running
    ///
    /// Returns `false` and does nothing when busy. A panic inside `work` is
    /// stored as [`Error::Task`].
    pub fn try_start<F>(&self, work: F) -> bool
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        {
            let mut state = lock(&self.state);
            if state.running {
                return false;
            }
            if state.outcome.take().is_some() {
                tracing::debug!(task = self.name, "discarding unpolled result");
            }
            state.running = true;
            state.launches += 1;
        }

        let name = self.name;
        let state = Arc::clone(&self.state);
        self.spawner.spawn(
            name,
            Box::new(move || {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(work))
                    .unwrap_or_else(|panic| {
                        Err(Error::Task(format!(
                            "{name} task panicked: {}",
                            panic_message(panic.as_ref())
                        )))
                    });

                if let Err(e) = &outcome {
                    tracing::warn!(task = name, error = %e, "background task failed");
                }

                let mut state = lock(&state);
                state.outcome = Some(outcome);
                state.running = false;
            }),
        );

        true
    }

    /// Take the last completed outcome, if any
    ///
    /// Each outcome is returned exactly once.
    pub fn poll_result(&self) -> Option<Result<T>> {
        lock(&self.state).outcome.take()
    }

    /// Check whether a task is in flight
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    /// Number of tasks ever launched on this slot
    #[must_use]
    pub fn launches(&self) -> u64 {
        lock(&self.state).launches
    }
}

impl<T> std::fmt::Debug for TaskSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("TaskSlot")
            .field("name", &self.name)
            .field("running", &state.running)
            .field("has_outcome", &state.outcome.is_some())
            .finish_non_exhaustive()
    }
}

fn lock<T>(state: &Mutex<SlotState<T>>) -> MutexGuard<'_, SlotState<T>> {
    // A poisoned slot still holds consistent flags: they are only written
    // after `work` has returned or unwound.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
