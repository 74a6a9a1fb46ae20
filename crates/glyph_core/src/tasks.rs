//! Phase-indexed deferred callbacks
//!
//! Any thread may queue work for a named point of the tick lifecycle; the
//! thread that owns that phase drains it at the right moment. Buckets are FIFO.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point in the tick lifecycle at which a bucket runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Logic thread, before entities update.
    BeforeUpdate,
    /// Logic thread, after every entity updated and before the layout syncs.
    AfterUpdate,
    /// Render thread, after clearing and before painting.
    BeforeRender,
    /// Render thread, after painting and before the buffer flip.
    AfterRender,
    /// Logic thread, at the end of a tick that will continue.
    AfterLogic,
}

impl Phase {
    pub const COUNT: usize = 5;

    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::BeforeUpdate,
        Phase::AfterUpdate,
        Phase::BeforeRender,
        Phase::AfterRender,
        Phase::AfterLogic,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the phase belongs to the logic thread (otherwise render).
    pub const fn is_logic(self) -> bool {
        matches!(
            self,
            Phase::BeforeUpdate | Phase::AfterUpdate | Phase::AfterLogic
        )
    }
}

/// Identity of a queued task, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

type TaskFn = Box<dyn FnMut() + Send>;

struct Task {
    id: TaskId,
    // Locked only while running; a reusable task is never run concurrently.
    run: Mutex<TaskFn>,
}

impl Task {
    fn invoke(&self) {
        let mut run = self.run.lock();
        (*run)();
    }
}

type Bucket = Mutex<VecDeque<Arc<Task>>>;

/// Thread-safe FIFO buckets of zero-argument callbacks, one per [`Phase`].
pub struct TaskQueue {
    buckets: [Bucket; Phase::COUNT],
    next_id: AtomicU64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| Mutex::new(VecDeque::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn bucket(&self, phase: Phase) -> &Bucket {
        &self.buckets[phase.index()]
    }

    /// Queue `task` at the back of `phase`. Safe from any thread.
    pub fn add<F>(&self, phase: Phase, task: F) -> TaskId
    where
        F: FnMut() + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.bucket(phase).lock().push_back(Arc::new(Task {
            id,
            run: Mutex::new(Box::new(task)),
        }));
        id
    }

    /// Run and remove every task queued at call time, in FIFO order.
    ///
    /// The bucket lock is released before any task runs, so a task that
    /// queues more work (including itself) only affects the next call.
    /// Returns the number of tasks run.
    pub fn run_task_list(&self, phase: Phase) -> usize {
        let tasks = std::mem::take(&mut *self.bucket(phase).lock());
        let count = tasks.len();
        for task in tasks {
            task.invoke();
        }
        count
    }

    /// Run every queued task but keep them queued.
    pub fn run_task_list_no_remove(&self, phase: Phase) -> usize {
        let tasks: Vec<Arc<Task>> = self.bucket(phase).lock().iter().cloned().collect();
        let count = tasks.len();
        for task in tasks {
            task.invoke();
        }
        count
    }

    /// Cancel a queued task. Returns `false` if it was not in the bucket.
    pub fn remove_task(&self, phase: Phase, id: TaskId) -> bool {
        let mut bucket = self.bucket(phase).lock();
        match bucket.iter().position(|task| task.id == id) {
            Some(index) => {
                bucket.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self, phase: Phase) -> usize {
        self.bucket(phase).lock().len()
    }

    pub fn is_empty(&self, phase: Phase) -> bool {
        self.bucket(phase).lock().is_empty()
    }

    pub fn clear(&self) {
        for bucket in &self.buckets {
            bucket.lock().clear();
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for phase in Phase::ALL {
            map.entry(&phase, &self.len(phase));
        }
        map.finish()
    }
}
