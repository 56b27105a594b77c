//! Fixed worker pool draining a [`TaskQueue`], plus the settle gauge
//! that backs freshness-barrier waits.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::queue::{Priority, TaskQueue};

/// Executes one task on a worker thread. A failed task is logged and
/// never tears down the pool.
pub trait TaskExecutor<T>: Send + Sync {
    fn run(&self, task: T) -> Result<(), PipelineError>;
}

/// Counts queued plus in-flight tasks. `wait_settled` blocks until the
/// count reaches zero: the queues are empty and no task is mid-flight.
#[derive(Default)]
pub struct SettleGauge {
    pending: Mutex<usize>,
    settled: Condvar,
}

impl SettleGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_added(&self) {
        let mut guard = self.pending.lock().expect("settle gauge lock poisoned");
        *guard += 1;
    }

    pub fn task_done(&self) {
        let mut guard = self.pending.lock().expect("settle gauge lock poisoned");
        *guard = guard.saturating_sub(1);
        if *guard == 0 {
            self.settled.notify_all();
        }
    }

    pub fn pending(&self) -> usize {
        *self.pending.lock().expect("settle gauge lock poisoned")
    }

    /// Block until all submitted tasks have been fully applied.
    pub fn wait_settled(&self) {
        let mut guard = self.pending.lock().expect("settle gauge lock poisoned");
        while *guard > 0 {
            guard = self
                .settled
                .wait(guard)
                .expect("settle gauge lock poisoned");
        }
    }
}

/// Handle for enqueueing tasks from inside the pool's own workers.
/// Uses the unbounded push: a worker parked on the capacity bound of
/// a queue only it can drain would deadlock the pool.
pub struct TaskSubmitter<T> {
    queue: Arc<TaskQueue<T>>,
    gauge: Arc<SettleGauge>,
}

impl<T> Clone for TaskSubmitter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            gauge: Arc::clone(&self.gauge),
        }
    }
}

impl<T> TaskSubmitter<T> {
    pub fn submit(&self, task: T, priority: Priority) -> Result<(), PipelineError> {
        self.gauge.task_added();
        match self.queue.push_unbounded(task, priority) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.gauge.task_done();
                Err(err)
            }
        }
    }
}

pub struct WorkerPool<T> {
    queue: Arc<TaskQueue<T>>,
    gauge: Arc<SettleGauge>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn spawn(
        worker_count: usize,
        queue_capacity: usize,
        executor: Arc<dyn TaskExecutor<T>>,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new(queue_capacity));
        let gauge = Arc::new(SettleGauge::new());
        let count = worker_count.max(1);

        let mut workers = Vec::with_capacity(count);
        for worker_id in 0..count {
            let queue = Arc::clone(&queue);
            let gauge = Arc::clone(&gauge);
            let executor = Arc::clone(&executor);
            let handle = std::thread::Builder::new()
                .name(format!("symdex-worker-{worker_id}"))
                .spawn(move || {
                    while let Some(task) = queue.pop() {
                        if let Err(err) = executor.run(task) {
                            warn!(worker_id, "task failed: {err}");
                        }
                        gauge.task_done();
                    }
                    debug!(worker_id, "worker draining complete");
                })
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        Self {
            queue,
            gauge,
            workers,
        }
    }

    /// Submit a task. Blocks when the queue is at capacity.
    pub fn submit(&self, task: T, priority: Priority) -> Result<(), PipelineError> {
        self.gauge.task_added();
        match self.queue.push(task, priority) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.gauge.task_done();
                Err(err)
            }
        }
    }

    pub fn gauge(&self) -> Arc<SettleGauge> {
        Arc::clone(&self.gauge)
    }

    /// Handle tasks can use to enqueue follow-up work. The settle
    /// gauge covers follow-ups submitted while their parent task is
    /// still running, so `wait_settled` sees the whole chain.
    pub fn submitter(&self) -> TaskSubmitter<T> {
        TaskSubmitter {
            queue: Arc::clone(&self.queue),
            gauge: Arc::clone(&self.gauge),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Block until every submitted task has been executed and applied.
    pub fn wait_settled(&self) {
        self.gauge.wait_settled();
    }

    /// Close the queue and join all workers; queued tasks still run.
    pub fn shutdown(mut self) {
        self.queue.close();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.queue.close();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        ran: AtomicUsize,
        failed: AtomicUsize,
    }

    impl TaskExecutor<u32> for Counting {
        fn run(&self, task: u32) -> Result<(), PipelineError> {
            if task == u32::MAX {
                self.failed.fetch_add(1, Ordering::SeqCst);
                return Err(PipelineError::Execution("poison task".to_string()));
            }
            self.ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn wait_settled_observes_all_submissions() {
        let exec = Arc::new(Counting {
            ran: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });
        let pool = WorkerPool::spawn(4, 8, Arc::clone(&exec) as Arc<dyn TaskExecutor<u32>>);
        for i in 0..200 {
            pool.submit(i, Priority::Background).unwrap();
        }
        pool.wait_settled();
        assert_eq!(exec.ran.load(Ordering::SeqCst), 200);
        pool.shutdown();
    }

    #[test]
    fn follow_up_submissions_run_and_do_not_deadlock_a_tiny_queue() {
        use std::sync::OnceLock;

        struct Chaining {
            submitter: OnceLock<TaskSubmitter<u32>>,
            ran: AtomicUsize,
        }

        impl TaskExecutor<u32> for Chaining {
            fn run(&self, task: u32) -> Result<(), PipelineError> {
                self.ran.fetch_add(1, Ordering::SeqCst);
                if task > 0
                    && let Some(submitter) = self.submitter.get()
                {
                    submitter.submit(task - 1, Priority::Background)?;
                }
                Ok(())
            }
        }

        let exec = Arc::new(Chaining {
            submitter: OnceLock::new(),
            ran: AtomicUsize::new(0),
        });
        // Capacity 1 with a single worker: the chain only completes
        // if follow-up submission never parks on the bound.
        let pool = WorkerPool::spawn(1, 1, Arc::clone(&exec) as Arc<dyn TaskExecutor<u32>>);
        let _ = exec.submitter.set(pool.submitter());

        pool.submit(10, Priority::Interactive).unwrap();
        pool.wait_settled();
        assert_eq!(exec.ran.load(Ordering::SeqCst), 11);
        pool.shutdown();
    }

    #[test]
    fn failed_tasks_do_not_stop_the_pool() {
        let exec = Arc::new(Counting {
            ran: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });
        let pool = WorkerPool::spawn(2, 4, Arc::clone(&exec) as Arc<dyn TaskExecutor<u32>>);
        pool.submit(u32::MAX, Priority::Interactive).unwrap();
        pool.submit(7, Priority::Interactive).unwrap();
        pool.wait_settled();
        assert_eq!(exec.failed.load(Ordering::SeqCst), 1);
        assert_eq!(exec.ran.load(Ordering::SeqCst), 1);
        pool.shutdown();
    }
}
