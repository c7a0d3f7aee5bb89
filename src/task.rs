//! Background task scheduling.
//!
//! Long-running work (batch ingest, validation sweeps, the merge) runs on
//! the blocking pool. Workers talk back through channels only: progress
//! events while running, exactly one outcome at the end. At most one
//! merge task is live at a time, and a merge excludes batches; a
//! conflicting submit fails fast with [`Error::TaskAlreadyRunning`]
//! without spawning anything.
//!
//! Cancellation is cooperative. Workers receive a [`CancelToken`] through
//! their [`TaskContext`] and are expected to check it at step boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Clonable cancellation flag shared between a task and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What kind of task a submit is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// The merge. Exclusive against everything.
    Merge,
    /// Ingest or validation batch. Excluded only by a live merge.
    Batch,
}

/// A progress tick from a running task.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Steps finished so far.
    pub done: usize,
    /// Total steps, when known.
    pub total: usize,
    /// Human-readable note, usually the current file.
    pub note: String,
}

/// Terminal state of a task.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The task ran to completion.
    Completed(T),
    /// The task observed its cancel token and stopped.
    Cancelled,
    /// The task failed.
    Failed(Error),
}

/// Handed to the worker closure; its only line back to the owner.
#[derive(Debug, Clone)]
pub struct TaskContext {
    cancel: CancelToken,
    progress: mpsc::UnboundedSender<Progress>,
}

impl TaskContext {
    /// Report progress. Dropped silently if the owner went away.
    pub fn progress(&self, done: usize, total: usize, note: impl Into<String>) {
        let _ = self.progress.send(Progress {
            done,
            total,
            note: note.into(),
        });
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Bail out with [`Error::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> (Self, mpsc::UnboundedReceiver<Progress>) {
        Self::for_tests_with_token(CancelToken::new())
    }

    #[cfg(test)]
    pub(crate) fn for_tests_with_token(
        cancel: CancelToken,
    ) -> (Self, mpsc::UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { cancel, progress: tx }, rx)
    }
}

/// Owner-side handle of a running task.
pub struct TaskHandle<T> {
    progress: mpsc::UnboundedReceiver<Progress>,
    outcome: oneshot::Receiver<TaskOutcome<T>>,
    cancel: CancelToken,
}

impl<T> TaskHandle<T> {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the task's cancel token, for cancelling from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Non-blocking poll for the next progress tick.
    pub fn try_progress(&mut self) -> Option<Progress> {
        self.progress.try_recv().ok()
    }

    /// Await the next progress tick; `None` once the task stopped sending.
    pub async fn next_progress(&mut self) -> Option<Progress> {
        self.progress.recv().await
    }

    /// Await the task's terminal state, consuming the handle.
    pub async fn join(self) -> TaskOutcome<T> {
        match self.outcome.await {
            Ok(outcome) => outcome,
            // Worker dropped the sender without an outcome: it panicked.
            Err(_) => TaskOutcome::Failed(Error::other("background task panicked")),
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    merge_active: bool,
    batches: usize,
}

fn lock_state(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Releases the scheduler slot when the worker finishes, however it finishes.
struct SlotGuard {
    state: Arc<Mutex<SlotState>>,
    kind: TaskKind,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        match self.kind {
            TaskKind::Merge => state.merge_active = false,
            TaskKind::Batch => state.batches = state.batches.saturating_sub(1),
        }
    }
}

/// Schedules background tasks with merge exclusivity.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    state: Arc<Mutex<SlotState>>,
}

impl TaskScheduler {
    /// Create a scheduler with no live tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a merge task is currently live.
    pub fn merge_active(&self) -> bool {
        lock_state(&self.state).merge_active
    }

    /// Submit a task. The closure runs on the blocking pool.
    ///
    /// Fails with [`Error::TaskAlreadyRunning`] when the slot rules are
    /// violated; in that case nothing is spawned and existing tasks are
    /// untouched.
    pub fn submit<T, F>(&self, kind: TaskKind, op: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T> + Send + 'static,
    {
        {
            let mut state = lock_state(&self.state);
            let conflict = match kind {
                TaskKind::Merge => state.merge_active || state.batches > 0,
                TaskKind::Batch => state.merge_active,
            };
            if conflict {
                warn!(?kind, "rejected task submit, a conflicting task is live");
                return Err(Error::TaskAlreadyRunning);
            }
            match kind {
                TaskKind::Merge => state.merge_active = true,
                TaskKind::Batch => state.batches += 1,
            }
        }

        let guard = SlotGuard {
            state: Arc::clone(&self.state),
            kind,
        };
        let cancel = CancelToken::new();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let ctx = TaskContext {
            cancel: cancel.clone(),
            progress: progress_tx,
        };

        task::spawn_blocking(move || {
            debug!(?kind, "background task started");
            let outcome = match op(&ctx) {
                Ok(value) => TaskOutcome::Completed(value),
                Err(Error::Cancelled) => TaskOutcome::Cancelled,
                Err(e) => TaskOutcome::Failed(e),
            };
            // Free the slot before the outcome is observable, so a
            // submit right after join() never races the guard.
            drop(guard);
            let _ = outcome_tx.send(outcome);
        });

        Ok(TaskHandle {
            progress: progress_rx,
            outcome: outcome_rx,
            cancel,
        })
    }
}
