use crate::queue::TaskQueue;
use crate::scheduler::SchedulerShared;
use crate::task::Task;
use crate::topology::NodeId;
use std::cell::Cell;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

thread_local! {
    static WORKER_NODE: Cell<Option<NodeId>> = const { Cell::new(None) };
}

/// Node of the worker running the current thread, if any. Used to resolve
/// `NodePlacement::Current` for tasks scheduled from inside a task.
pub(crate) fn current_worker_node() -> Option<NodeId> {
    WORKER_NODE.with(|node| node.get())
}

const PARK_TIMEOUT: Duration = Duration::from_millis(10);

/// A worker owns one CPU: it is pinned to it, pops from its node's queue and
/// falls back to stealing from peer queues before parking.
pub(crate) struct Worker {
    pub id: usize,
    pub queue: Arc<TaskQueue>,
    pub core: Option<core_affinity::CoreId>,
    pub shared: Arc<SchedulerShared>,
}

impl Worker {
    pub fn run(self) {
        if let Some(core) = self.core {
            core_affinity::set_for_current(core);
        }
        WORKER_NODE.with(|node| node.set(Some(self.queue.node_id())));

        loop {
            if self.shared.is_shut_down() {
                break;
            }

            let task = self
                .queue
                .try_pop()
                .or_else(|| self.steal())
                .or_else(|| self.queue.pop_timeout(PARK_TIMEOUT));

            if let Some(task) = task {
                self.process(task);
            }
        }
    }

    /// One pass over the peer queues, starting after our own node so that
    /// steal pressure spreads instead of hammering node 0.
    fn steal(&self) -> Option<Arc<Task>> {
        let queues = self.shared.queues();
        let own = self.queue.node_id();
        let num = queues.len();
        for offset in 1..num {
            let queue = &queues[(own + offset) % num];
            if let Some(task) = queue.try_pop() {
                return Some(task);
            }
        }
        None
    }

    fn process(&self, task: Arc<Task>) {
        task.execute();
        self.shared.finished_counts()[self.id].fetch_add(1, Ordering::AcqRel);
        self.shared
            .enqueue_ready_successors(&task, self.queue.node_id());
    }
}
