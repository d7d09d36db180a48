use crate::queue::SchedulePriority;
use crate::scheduler::NodePlacement;
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::error;

pub const INVALID_TASK_ID: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Built, not yet handed to a scheduler.
    Created,
    /// Handed to a scheduler, still waiting on predecessors.
    Scheduled,
    /// All predecessors finished; in a queue or about to be.
    Ready,
    /// A worker is executing it.
    Running,
    Done,
}

impl TaskState {
    fn from_u8(v: u8) -> TaskState {
        match v {
            0 => TaskState::Created,
            1 => TaskState::Scheduled,
            2 => TaskState::Ready,
            3 => TaskState::Running,
            _ => TaskState::Done,
        }
    }
}

/// Where a task asked to be placed, remembered so that the worker finishing
/// its last predecessor can enqueue it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placement {
    pub node: NodePlacement,
    pub priority: SchedulePriority,
}

/// A schedulable unit of work wrapping a closure.
///
/// Tasks form a DAG through [`set_as_predecessor_of`]: a task holds a count of
/// unfinished predecessors and becomes ready when it reaches zero. The closure
/// runs exactly once; panics are caught and logged so that a failing task
/// never takes its worker thread down with it.
///
/// [`set_as_predecessor_of`]: Task::set_as_predecessor_of
pub struct Task {
    description: String,
    work: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    id: AtomicU64,
    state: AtomicU8,
    pending_predecessors: AtomicUsize,
    successors: Mutex<Vec<Arc<Task>>>,
    placement: Mutex<Option<Placement>>,
    /// Claimed by whichever thread pushes the task into a queue, so that a
    /// racing `schedule` call and predecessor completion enqueue it once.
    enqueue_claimed: AtomicBool,
    done_mutex: Mutex<bool>,
    done_condvar: Condvar,
}

impl Task {
    pub fn new(description: impl Into<String>, work: impl FnOnce() + Send + 'static) -> Arc<Task> {
        Arc::new(Task {
            description: description.into(),
            work: Mutex::new(Some(Box::new(work))),
            id: AtomicU64::new(INVALID_TASK_ID),
            state: AtomicU8::new(TaskState::Created as u8),
            pending_predecessors: AtomicUsize::new(0),
            successors: Mutex::new(Vec::new()),
            placement: Mutex::new(None),
            enqueue_claimed: AtomicBool::new(false),
            done_mutex: Mutex::new(false),
            done_condvar: Condvar::new(),
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Link `self` before `successor`: the successor will not run until this
    /// task (and all of its other predecessors) finished.
    ///
    /// Must be called before either task is scheduled.
    pub fn set_as_predecessor_of(self: &Arc<Self>, successor: &Arc<Task>) {
        assert_eq!(TaskState::Created, self.state());
        assert_eq!(TaskState::Created, successor.state());

        successor
            .pending_predecessors
            .fetch_add(1, Ordering::AcqRel);
        self.successors.lock().push(successor.clone());
    }

    pub fn id(&self) -> u64 {
        self.id.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.pending_predecessors.load(Ordering::Acquire) == 0
    }

    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Done
    }

    /// Block the calling thread until the task finished.
    pub fn join(&self) {
        let mut done = self.done_mutex.lock();
        while !*done {
            self.done_condvar.wait(&mut done);
        }
    }

    pub(crate) fn assign_id(&self, id: u64) {
        self.id.store(id, Ordering::Release);
    }

    pub(crate) fn mark_scheduled(&self, placement: Placement) {
        *self.placement.lock() = Some(placement);
        // A ready task goes straight to Ready, skipping the Scheduled state.
        let next = if self.is_ready() {
            TaskState::Ready
        } else {
            TaskState::Scheduled
        };
        self.state.store(next as u8, Ordering::Release);
    }

    pub(crate) fn placement(&self) -> Option<Placement> {
        *self.placement.lock()
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.placement.lock().is_some()
    }

    /// Returns true exactly once, for the thread that gets to enqueue the
    /// task.
    pub(crate) fn try_claim_enqueue(&self) -> bool {
        self.enqueue_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Called by the worker that finished one of this task's predecessors.
    /// Returns true if that was the last outstanding predecessor.
    pub(crate) fn on_predecessor_done(&self) -> bool {
        let before = self.pending_predecessors.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "predecessor counter underflow");
        if before == 1 {
            self.state.store(TaskState::Ready as u8, Ordering::Release);
            true
        } else {
            false
        }
    }

    pub(crate) fn successors(&self) -> Vec<Arc<Task>> {
        self.successors.lock().clone()
    }

    /// Run the closure and mark the task done. Panics are contained here.
    pub(crate) fn execute(&self) {
        self.state.store(TaskState::Running as u8, Ordering::Release);

        let work = self.work.lock().take();
        if let Some(work) = work {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(task = %self.description, %message, "task panicked");
            }
        }

        self.state.store(TaskState::Done as u8, Ordering::Release);
        let mut done = self.done_mutex.lock();
        *done = true;
        self.done_condvar.notify_all();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("description", &self.description)
            .field("id", &self.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predecessor_links() {
        let a = Task::new("a", || {});
        let b = Task::new("b", || {});
        a.set_as_predecessor_of(&b);

        assert!(a.is_ready());
        assert!(!b.is_ready());

        a.execute();
        assert!(a.is_done());
        assert!(b.on_predecessor_done());
        assert!(b.is_ready());
    }

    #[test]
    fn panicking_task_still_finishes() {
        let t = Task::new("boom", || panic!("boom"));
        t.execute();
        assert!(t.is_done());
    }

    #[test]
    fn enqueue_claimed_once() {
        let t = Task::new("t", || {});
        assert!(t.try_claim_enqueue());
        assert!(!t.try_claim_enqueue());
    }
}
