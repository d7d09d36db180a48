use crate::task::Task;
use crate::topology::NodeId;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePriority {
    Default,
    /// Popped before any default-priority task.
    High,
}

#[derive(Default)]
struct QueueInner {
    high: VecDeque<Arc<Task>>,
    default: VecDeque<Arc<Task>>,
}

/// Ready-task queue bound to one NUMA node.
///
/// MPMC: any worker of the node pops from it, any thread may push, and
/// foreign workers steal from the same end. First-come within a priority;
/// the high-priority queue always empties first.
pub struct TaskQueue {
    node: NodeId,
    inner: Mutex<QueueInner>,
    new_work: Condvar,
    /// Kept outside the lock so load balancing can compare queues cheaply.
    len: AtomicUsize,
}

impl TaskQueue {
    pub fn new(node: NodeId) -> TaskQueue {
        TaskQueue {
            node,
            inner: Mutex::new(QueueInner::default()),
            new_work: Condvar::new(),
            len: AtomicUsize::new(0),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn push(&self, task: Arc<Task>, priority: SchedulePriority) {
        {
            let mut inner = self.inner.lock();
            match priority {
                SchedulePriority::High => inner.high.push_back(task),
                SchedulePriority::Default => inner.default.push_back(task),
            }
        }
        self.len.fetch_add(1, Ordering::Release);
        self.new_work.notify_one();
    }

    pub fn try_pop(&self) -> Option<Arc<Task>> {
        let mut inner = self.inner.lock();
        let task = inner.high.pop_front().or_else(|| inner.default.pop_front());
        if task.is_some() {
            self.len.fetch_sub(1, Ordering::Release);
        }
        task
    }

    /// Pop, parking the caller for up to `timeout` if the queue is empty.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Arc<Task>> {
        let mut inner = self.inner.lock();
        if inner.high.is_empty() && inner.default.is_empty() {
            self.new_work.wait_for(&mut inner, timeout);
        }
        let task = inner.high.pop_front().or_else(|| inner.default.pop_front());
        if task.is_some() {
            self.len.fetch_sub(1, Ordering::Release);
        }
        task
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake every parked worker, used during shutdown.
    pub fn wake_all(&self) {
        self.new_work.notify_all();
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("node", &self.node)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_pops_first() {
        let queue = TaskQueue::new(0);
        queue.push(Task::new("d1", || {}), SchedulePriority::Default);
        queue.push(Task::new("h1", || {}), SchedulePriority::High);
        queue.push(Task::new("d2", || {}), SchedulePriority::Default);
        queue.push(Task::new("h2", || {}), SchedulePriority::High);

        let order: Vec<String> = std::iter::from_fn(|| queue.try_pop())
            .map(|t| t.description().to_string())
            .collect();
        assert_eq!(vec!["h1", "h2", "d1", "d2"], order);
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_timeout_returns_pushed_task() {
        let queue = Arc::new(TaskQueue::new(0));
        let pusher = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                queue.push(Task::new("late", || {}), SchedulePriority::Default);
            })
        };
        let task = queue.pop_timeout(Duration::from_secs(1));
        pusher.join().unwrap();
        assert_eq!("late", task.expect("task").description());
    }
}
