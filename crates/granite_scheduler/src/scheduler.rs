use crate::queue::{SchedulePriority, TaskQueue};
use crate::task::{Placement, Task};
use crate::topology::{NodeId, Topology};
use crate::worker::{current_worker_node, Worker};
use granite_error::{GraniteError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Which node queue a task would like to land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePlacement {
    /// The node of the worker calling `schedule`, or node 0 when scheduling
    /// from a non-worker thread.
    Current,
    /// The least-loaded queue.
    Any,
    Node(NodeId),
}

/// State shared between the scheduler handle and its workers.
pub(crate) struct SchedulerShared {
    queues: Vec<Arc<TaskQueue>>,
    finished_counts: Vec<AtomicU64>,
    task_counter: AtomicU64,
    shut_down: AtomicBool,
}

impl SchedulerShared {
    pub fn queues(&self) -> &[Arc<TaskQueue>] {
        &self.queues
    }

    pub fn finished_counts(&self) -> &[AtomicU64] {
        &self.finished_counts
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn resolve_node(&self, placement: NodePlacement) -> NodeId {
        match placement {
            NodePlacement::Current => current_worker_node().unwrap_or(0),
            NodePlacement::Any => self
                .queues
                .iter()
                .enumerate()
                .min_by_key(|(_, queue)| queue.len())
                .map(|(node, _)| node)
                .unwrap_or(0),
            NodePlacement::Node(node) => {
                assert!(node < self.queues.len(), "node id out of range");
                node
            }
        }
    }

    /// Decrement the predecessor counters of `task`'s successors and enqueue
    /// every successor that just became ready. Called by the worker that
    /// finished `task`; `Current` placements resolve to that worker's node so
    /// dependent work stays local.
    pub fn enqueue_ready_successors(&self, task: &Task, current_node: NodeId) {
        for successor in task.successors() {
            if successor.on_predecessor_done()
                && successor.is_scheduled()
                && successor.try_claim_enqueue()
            {
                let placement = successor.placement().expect("scheduled task has placement");
                let node = match placement.node {
                    NodePlacement::Current => current_node,
                    other => self.resolve_node(other),
                };
                self.queues[node].push(successor, placement.priority);
            }
        }
    }
}

/// Scheduler with one task queue per NUMA node and one pinned worker per CPU.
pub struct NodeQueueScheduler {
    shared: Arc<SchedulerShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeQueueScheduler {
    /// Build queues and spawn the worker pool described by `topology`.
    pub fn try_new(topology: &Topology) -> Result<Arc<NodeQueueScheduler>> {
        let queues: Vec<_> = (0..topology.num_nodes())
            .map(|node| Arc::new(TaskQueue::new(node)))
            .collect();

        let shared = Arc::new(SchedulerShared {
            queues,
            finished_counts: (0..topology.num_cpus()).map(|_| AtomicU64::new(0)).collect(),
            task_counter: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
        });

        debug!(
            num_nodes = topology.num_nodes(),
            num_cpus = topology.num_cpus(),
            "starting node queue scheduler"
        );

        let mut workers = Vec::with_capacity(topology.num_cpus());
        let mut worker_id = 0;
        for (node, topology_node) in topology.nodes().iter().enumerate() {
            for cpu in &topology_node.cpus {
                let worker = Worker {
                    id: worker_id,
                    queue: shared.queues[node].clone(),
                    core: cpu.core,
                    shared: shared.clone(),
                };
                let handle = std::thread::Builder::new()
                    .name(format!("granite-worker-{worker_id}"))
                    .spawn(move || worker.run())
                    .map_err(|e| {
                        GraniteError::with_source("Failed to spawn worker thread", Box::new(e))
                    })?;
                workers.push(handle);
                worker_id += 1;
            }
        }

        Ok(Arc::new(NodeQueueScheduler {
            shared,
            workers: Mutex::new(workers),
        }))
    }

    /// Hand a task to the scheduler.
    ///
    /// The task gets a monotonic id. If it still has unfinished predecessors
    /// it is only registered; the worker finishing its last predecessor will
    /// enqueue it with the placement recorded here.
    pub fn schedule(
        &self,
        task: Arc<Task>,
        node: NodePlacement,
        priority: SchedulePriority,
    ) -> Result<()> {
        if self.shared.is_shut_down() {
            return Err(GraniteError::scheduler_shutdown());
        }

        let id = self.shared.task_counter.fetch_add(1, Ordering::AcqRel);
        task.assign_id(id);
        task.mark_scheduled(Placement { node, priority });

        if task.is_ready() && task.try_claim_enqueue() {
            let node = self.shared.resolve_node(node);
            self.shared.queues[node].push(task, priority);
        }

        Ok(())
    }

    /// Schedule a batch anywhere and block until each task finished.
    pub fn schedule_and_wait(&self, tasks: &[Arc<Task>]) -> Result<()> {
        for task in tasks {
            self.schedule(task.clone(), NodePlacement::Any, SchedulePriority::Default)?;
        }
        for task in tasks {
            task.join();
        }
        Ok(())
    }

    /// Drain and shut down: wait until every scheduled task finished, stop the
    /// workers and join them. The queues must be empty at that point.
    pub fn finish(&self) {
        loop {
            let finished: u64 = self
                .shared
                .finished_counts
                .iter()
                .map(|c| c.load(Ordering::Acquire))
                .sum();
            if finished == self.shared.task_counter.load(Ordering::Acquire) {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        for queue in self.shared.queues() {
            assert!(
                queue.is_empty(),
                "task queue {} not empty after all tasks finished",
                queue.node_id()
            );
        }

        self.shared.shut_down.store(true, Ordering::Release);
        for queue in self.shared.queues() {
            queue.wake_all();
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        debug!(num_workers = workers.len(), "joining scheduler workers");
        for worker in workers {
            let _ = worker.join();
        }
    }

    pub fn queues(&self) -> &[Arc<TaskQueue>] {
        self.shared.queues()
    }

    pub fn num_finished_tasks(&self) -> u64 {
        self.shared
            .finished_counts
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .sum()
    }

    pub fn num_scheduled_tasks(&self) -> u64 {
        self.shared.task_counter.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for NodeQueueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeQueueScheduler")
            .field("num_nodes", &self.shared.queues.len())
            .field("scheduled", &self.num_scheduled_tasks())
            .field("finished", &self.num_finished_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_independent_tasks() {
        let scheduler = NodeQueueScheduler::try_new(&Topology::fake(2, 2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let counter = counter.clone();
                Task::new(format!("t{i}"), move || {
                    counter.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();

        scheduler.schedule_and_wait(&tasks).unwrap();
        assert_eq!(64, counter.load(Ordering::Acquire));

        scheduler.finish();
        assert_eq!(64, scheduler.num_finished_tasks());
    }

    #[test]
    fn predecessors_run_first() {
        let scheduler = NodeQueueScheduler::try_new(&Topology::fake(1, 2)).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let push = |name: &'static str| {
            let log = log.clone();
            Task::new(name, move || {
                // Give successors a chance to be popped out of order if
                // predecessor tracking were broken.
                std::thread::sleep(Duration::from_millis(2));
                log.lock().push(name);
            })
        };

        let a = push("a");
        let b = push("b");
        let c = push("c");
        a.set_as_predecessor_of(&c);
        b.set_as_predecessor_of(&c);

        // Schedule the successor first; it must wait for both predecessors.
        scheduler
            .schedule(c.clone(), NodePlacement::Any, SchedulePriority::Default)
            .unwrap();
        scheduler
            .schedule(a.clone(), NodePlacement::Any, SchedulePriority::Default)
            .unwrap();
        scheduler
            .schedule(b.clone(), NodePlacement::Any, SchedulePriority::Default)
            .unwrap();
        c.join();

        let log = log.lock();
        assert_eq!(3, log.len());
        assert_eq!("c", *log.last().unwrap());

        scheduler.finish();
    }

    #[test]
    fn work_stealing_drains_foreign_queue() {
        // Two nodes; everything is pinned to node 1's queue, yet node 0's
        // workers may steal. Either way all tasks finish.
        let scheduler = NodeQueueScheduler::try_new(&Topology::fake(2, 1)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let counter = counter.clone();
                Task::new(format!("pinned{i}"), move || {
                    std::thread::sleep(Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();

        for task in &tasks {
            scheduler
                .schedule(task.clone(), NodePlacement::Node(1), SchedulePriority::Default)
                .unwrap();
        }
        for task in &tasks {
            task.join();
        }
        assert_eq!(32, counter.load(Ordering::Acquire));

        scheduler.finish();
        for queue in scheduler.queues() {
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn schedule_after_finish_is_rejected() {
        let scheduler = NodeQueueScheduler::try_new(&Topology::fake(1, 1)).unwrap();
        scheduler.finish();

        let err = scheduler
            .schedule(
                Task::new("too late", || {}),
                NodePlacement::Any,
                SchedulePriority::Default,
            )
            .unwrap_err();
        assert_eq!(granite_error::ErrorKind::SchedulerShutdown, err.kind());
    }

    #[test]
    fn finish_waits_for_deferred_tasks() {
        let scheduler = NodeQueueScheduler::try_new(&Topology::fake(1, 2)).unwrap();

        let a = Task::new("slow", || std::thread::sleep(Duration::from_millis(20)));
        let b = Task::new("after", || {});
        a.set_as_predecessor_of(&b);

        scheduler
            .schedule(b.clone(), NodePlacement::Any, SchedulePriority::Default)
            .unwrap();
        scheduler
            .schedule(a, NodePlacement::Any, SchedulePriority::Default)
            .unwrap();

        scheduler.finish();
        assert!(b.is_done());
        assert_eq!(2, scheduler.num_finished_tasks());
    }
}
