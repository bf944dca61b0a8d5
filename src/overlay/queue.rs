//! Deferred-work queue standing in for the host loop's idle scheduling.
//!
//! Match attempts are never run synchronously inside the window-created
//! signal, because a window's class hint may not be populated yet at that
//! point. The handler only enqueues a task here; the host drives
//! `run_pending` at the next idle turn of its single-threaded loop. There is
//! no cancellation: a task that outlives the fixer must check the enabled
//! flag itself and become a no-op.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

pub type Task = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct TaskQueue {
    pending: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&self, task: Task) {
        self.pending.lock().push_back(task);
    }

    /// Runs every task queued so far and returns how many ran. Tasks
    /// deferred while draining land in the next batch, matching one idle
    /// turn of the host loop.
    pub fn run_pending(&self) -> usize {
        let batch: VecDeque<Task> = std::mem::take(&mut *self.pending.lock());
        let count = batch.len();
        if count > 0 {
            trace!("running {count} deferred task(s)");
        }
        for task in batch {
            task();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
