//! Bounded-concurrency admission window.
//!
//! A counting semaphore with a FIFO overflow queue, owned by one engine and
//! mutated only from its update thread. The window never runs work itself: it
//! tells the caller whether a job may start now, and hands back the next
//! queued job each time a slot is released.

use std::collections::VecDeque;

/// Outcome of submitting a job to the window.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    /// A slot was free; the caller must start the job and later call
    /// [`FetchWindow::release`].
    Start(T),
    /// All slots are busy; the job was queued.
    Queued,
}

/// Semaphore + FIFO queue of pending jobs.
#[derive(Debug)]
pub struct FetchWindow<T> {
    capacity: usize,
    in_flight: usize,
    queue: VecDeque<T>,
}

impl<T> FetchWindow<T> {
    /// Creates a window admitting at most `capacity` jobs at once.
    ///
    /// A zero capacity is treated as one; callers validate their config first.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_flight: 0,
            queue: VecDeque::new(),
        }
    }

    /// Admits `job` if a slot is free, otherwise appends it to the queue.
    pub fn submit(&mut self, job: T) -> Admission<T> {
        if self.in_flight < self.capacity {
            self.in_flight += 1;
            Admission::Start(job)
        } else {
            self.queue.push_back(job);
            Admission::Queued
        }
    }

    /// Frees one slot and returns the next queued job, which now holds it.
    ///
    /// At most one job is started per release. Releasing with nothing in
    /// flight is a no-op.
    pub fn release(&mut self) -> Option<T> {
        if self.in_flight == 0 {
            return None;
        }
        self.in_flight -= 1;

        let next = self.queue.pop_front()?;
        self.in_flight += 1;
        Some(next)
    }

    /// Drops queued jobs matching `pred`, returning how many were removed.
    pub fn remove_queued(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.queue.len();
        self.queue.retain(|job| !pred(job));
        before - self.queue.len()
    }

    /// Removes and returns every queued job.
    pub fn drain_queue(&mut self) -> Vec<T> {
        self.queue.drain(..).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when nothing is running or waiting.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.queue.is_empty()
    }
}
