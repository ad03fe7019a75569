//! Digest Scheduler
//!
//! Coalesces any number of digest requests into a single deferred digest.
//!
//! # State Machine
//!
//! ```text
//!            request()                    close_window()
//!   Idle ─────────────────► DigestScheduled ─────────────► Idle
//!     ▲                        │  request() is a no-op here
//!     └────────────────────────┘
//! ```
//!
//! The first request in a window enqueues exactly one deferred task. Every
//! further request before that task runs is absorbed. The task closes the
//! window once it has drained the changed set, so requests made while the
//! digest runs open the next window instead of re-entering this one.

use std::cell::Cell;
use std::fmt;

use tracing::trace;

use super::defer::Defer;

/// Where the scheduler is in its window cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No digest is pending.
    Idle,

    /// A deferred digest is queued and has not started yet.
    DigestScheduled,
}

/// Debounces digest requests onto a [`Defer`] primitive.
pub struct DigestScheduler {
    state: Cell<SchedulerState>,
    defer: Box<dyn Defer>,

    /// Number of windows opened so far.
    windows: Cell<usize>,
}

impl DigestScheduler {
    pub fn new(defer: Box<dyn Defer>) -> Self {
        Self {
            state: Cell::new(SchedulerState::Idle),
            defer,
            windows: Cell::new(0),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state.get()
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.get() == SchedulerState::DigestScheduled
    }

    /// Number of windows opened so far.
    pub fn windows(&self) -> usize {
        self.windows.get()
    }

    /// Open a window and defer `task`, unless a window is already open.
    ///
    /// Returns whether a task was deferred.
    pub fn request<F>(&self, task: F) -> bool
    where
        F: FnOnce() + 'static,
    {
        if self.is_scheduled() {
            return false;
        }
        self.state.set(SchedulerState::DigestScheduled);
        self.windows.set(self.windows.get() + 1);
        trace!(window = self.windows.get(), "digest scheduled");
        self.defer.defer(Box::new(task));
        true
    }

    /// Return to `Idle` so the next request opens a new window.
    pub fn close_window(&self) {
        self.state.set(SchedulerState::Idle);
    }
}

impl fmt::Debug for DigestScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestScheduler")
            .field("state", &self.state.get())
            .field("windows", &self.windows.get())
            .finish()
    }
}
