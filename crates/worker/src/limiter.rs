//! Process-wide bound on simultaneous generations.
//!
//! Backed by a fair `tokio::sync::Semaphore`, so waiters are admitted in
//! arrival order. A slot is held by a guard and released when the guard drops,
//! which also covers tasks that fail or panic.

use bolty_core::error::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
    capacity: usize,
    in_flight: AtomicUsize,
    waiting: AtomicUsize,
}

/// An admitted slot. Dropping it frees the slot for the next waiter.
pub struct Slot<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// A limiter admitting at most `capacity` tasks at once (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            in_flight: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<Slot<'_>> {
        let permit = {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let _waiting = Waiting(&self.waiting);
            self.semaphore
                .acquire()
                .await
                .map_err(|e| Error::Internal(format!("Concurrency limiter closed: {e}")))?
        };
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(in_flight, capacity = self.capacity, waiting = self.waiting(), "Generation slot acquired");
        Ok(Slot {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    /// Run `task` once a slot is free and release the slot when it finishes.
    pub async fn submit<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _slot = self.acquire().await?;
        Ok(task.await)
    }
}
