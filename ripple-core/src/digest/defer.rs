//! Deferred execution.
//!
//! The scheduler never runs a digest synchronously. It hands a task to a
//! [`Defer`] implementation, which runs it at the next scheduling
//! opportunity: the next frame of a host loop, or the next turn of a tokio
//! `LocalSet`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Runs tasks later than the current call stack.
///
/// There is no guarantee on the exact delay.
pub trait Defer {
    fn defer(&self, task: Task);
}

/// A queue of tasks drained by the host once per frame.
///
/// This is the "next animation frame" primitive: the host loop calls
/// [`run_frame`](Self::run_frame) whenever it is ready to show new state.
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct FrameQueue {
    pending: Rc<RefCell<VecDeque<Task>>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the tasks that were pending when the frame started.
    ///
    /// Tasks deferred while the frame runs wait for the next frame. Returns
    /// the number of tasks taken from the queue.
    ///
    /// If a task panics, the tasks after it go back to the front of the queue
    /// before the panic propagates, so they still run on the next frame.
    pub fn run_frame(&self) -> usize {
        let tasks: Vec<Task> = self.pending.borrow_mut().drain(..).collect();
        let count = tasks.len();
        let mut frame = FrameGuard {
            pending: &self.pending,
            remaining: tasks.into_iter(),
        };
        while let Some(task) = frame.remaining.next() {
            task();
        }
        count
    }

    /// Run frames until nothing is pending or `max_frames` were run.
    ///
    /// Returns the number of frames that ran at least one task.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.run_frame() > 0 {
            frames += 1;
        }
        frames
    }

    /// Number of tasks waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Puts the tasks a frame did not reach back at the front of the queue.
struct FrameGuard<'a> {
    pending: &'a RefCell<VecDeque<Task>>,
    remaining: std::vec::IntoIter<Task>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.borrow_mut();
        for task in self.remaining.by_ref().rev() {
            pending.push_front(task);
        }
    }
}

impl Defer for FrameQueue {
    fn defer(&self, task: Task) {
        self.pending.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Defers tasks to the current tokio [`LocalSet`](tokio::task::LocalSet).
///
/// Each task is spawned with [`tokio::task::spawn_local`] and runs on a later
/// turn of the local set. Deferring outside of a `LocalSet` panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDefer;

impl Defer for TokioDefer {
    fn defer(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }
}
