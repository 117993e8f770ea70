//! Admission control: a hard ceiling on concurrent upstream calls.
//!
//! # Responsibilities
//! - Grant a slot immediately when one is free
//! - Queue for at most the configured timeout otherwise
//! - Reject with [`ProxyError::CapacityExceeded`] when the wait elapses
//!
//! # Design Decisions
//! - Backed by a Tokio semaphore; no FIFO guarantee beyond what it provides
//! - A slot is an owned permit, released when [`AdmissionSlot`] is dropped,
//!   so every exit path (error, panic, client disconnect) gives it back
//! - A zero timeout never queues

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{AdmissionConfig, ValidationError};
use crate::error::ProxyError;
use crate::observability::metrics;

/// Bounds the number of requests concurrently in flight to the upstream.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

impl AdmissionController {
    /// Create a controller with `capacity` slots. Zero capacity is refused.
    pub fn new(capacity: usize, queue_timeout: Duration) -> Result<Self, ValidationError> {
        if capacity == 0 {
            return Err(ValidationError::ZeroCapacity);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        })
    }

    pub fn from_config(config: &AdmissionConfig) -> Result<Self, ValidationError> {
        Self::new(config.max_concurrent_requests, config.queue_timeout())
    }

    /// Acquire a slot, queueing for at most the configured timeout.
    pub async fn acquire(&self) -> Result<AdmissionSlot, ProxyError> {
        self.acquire_within(self.queue_timeout).await
    }

    /// Acquire a slot, queueing for at most `timeout`.
    ///
    /// Dropping the returned future abandons the wait without consuming a slot.
    pub async fn acquire_within(&self, timeout: Duration) -> Result<AdmissionSlot, ProxyError> {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(AdmissionSlot::new(permit));
        }
        if timeout.is_zero() {
            return Err(ProxyError::CapacityExceeded {
                waited: Duration::ZERO,
            });
        }

        let started = Instant::now();
        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(permit)) => {
                tracing::trace!(waited = ?started.elapsed(), "Admission slot granted after queueing");
                Ok(AdmissionSlot::new(permit))
            }
            // The semaphore is never closed; treat it like an exhausted queue.
            Ok(Err(_)) | Err(_) => Err(ProxyError::CapacityExceeded {
                waited: started.elapsed(),
            }),
        }
    }

    /// Configured maximum number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn queue_timeout(&self) -> Duration {
        self.queue_timeout
    }
}

/// The right to have one request in flight to the upstream.
///
/// The slot is returned to the controller when this value is dropped.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
    acquired_at: Instant,
}

impl AdmissionSlot {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        metrics::slot_acquired();
        Self {
            _permit: permit,
            acquired_at: Instant::now(),
        }
    }

    /// How long this slot has been held.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        metrics::slot_released();
        tracing::trace!(held_for = ?self.acquired_at.elapsed(), "Admission slot released");
    }
}
