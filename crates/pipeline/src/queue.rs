//! Bounded multi-producer/multi-consumer task queue with two priority
//! classes. Interactive items are always dequeued before background
//! items; within a class, FIFO order. A full queue blocks producers
//! instead of dropping: the bound caps memory, it does not shed load.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Explicit client request; served first.
    Interactive,
    /// Tracker-driven catch-up work.
    Background,
}

struct QueueInner<T> {
    interactive: VecDeque<T>,
    background: VecDeque<T>,
    closed: bool,
}

impl<T> QueueInner<T> {
    fn len(&self) -> usize {
        self.interactive.len() + self.background.len()
    }

    fn pop(&mut self) -> Option<(T, Priority)> {
        if let Some(item) = self.interactive.pop_front() {
            return Some((item, Priority::Interactive));
        }
        self.background.pop_front().map(|i| (i, Priority::Background))
    }
}

pub struct TaskQueue<T> {
    inner: Mutex<QueueInner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> TaskQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                interactive: VecDeque::new(),
                background: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue an item, blocking while the queue is at capacity.
    pub fn push(&self, item: T, priority: Priority) -> Result<(), PipelineError> {
        let mut guard = self.inner.lock().expect("task queue lock poisoned");
        while guard.len() >= self.capacity && !guard.closed {
            guard = self
                .not_full
                .wait(guard)
                .expect("task queue lock poisoned");
        }
        if guard.closed {
            return Err(PipelineError::Closed);
        }
        match priority {
            Priority::Interactive => guard.interactive.push_back(item),
            Priority::Background => guard.background.push_back(item),
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue without waiting on the capacity bound. Worker threads
    /// spawning follow-up tasks use this: blocking them on a full
    /// queue they are also responsible for draining would deadlock
    /// the pool against itself.
    pub fn push_unbounded(&self, item: T, priority: Priority) -> Result<(), PipelineError> {
        let mut guard = self.inner.lock().expect("task queue lock poisoned");
        if guard.closed {
            return Err(PipelineError::Closed);
        }
        match priority {
            Priority::Interactive => guard.interactive.push_back(item),
            Priority::Background => guard.background.push_back(item),
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue the next item, blocking while the queue is empty.
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("task queue lock poisoned");
        loop {
            if let Some((item, _)) = guard.pop() {
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            guard = self
                .not_empty
                .wait(guard)
                .expect("task queue lock poisoned");
        }
    }

    /// Close the queue: already-queued items remain poppable, new
    /// pushes fail, and blocked poppers wake with `None` once drained.
    pub fn close(&self) {
        let mut guard = self.inner.lock().expect("task queue lock poisoned");
        guard.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().expect("task queue lock poisoned").len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("task queue lock poisoned").closed
    }
}
