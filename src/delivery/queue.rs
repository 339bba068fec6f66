use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

use crate::report::Report;

/// Bounded report FIFO between the acquisition worker and the transport sender
///
/// `enqueue` never waits: when the queue is full every queued report is
/// purged and the new one takes the front. Under backpressure the consumer
/// therefore always sees the freshest state rather than a backlog.
#[derive(Debug)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<Report>>,
    capacity: usize,
    available: Notify,
    purges: AtomicU64,
    dropped: AtomicU64,
}

impl DeliveryQueue {
    pub const DEFAULT_CAPACITY: usize = 5;

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        debug!("Created delivery queue with capacity {}", capacity);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            available: Notify::new(),
            purges: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Report>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, report: Report) {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            let stale = items.len();
            items.clear();
            self.purges.fetch_add(1, Ordering::Relaxed);
            self.dropped.fetch_add(stale as u64, Ordering::Relaxed);
            debug!("Delivery queue full, purged {} stale reports", stale);
        }
        items.push_back(report);
        drop(items);

        self.available.notify_one();
    }

    /// Waits until a report is available. Single consumer.
    pub async fn dequeue(&self) -> Report {
        loop {
            let next = self.lock().pop_front();
            if let Some(report) = next {
                return report;
            }
            self.available.notified().await;
        }
    }

    pub fn try_dequeue(&self) -> Option<Report> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of times a full queue was purged
    pub fn purges(&self) -> u64 {
        self.purges.load(Ordering::Relaxed)
    }

    /// Reports discarded by purges
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::with_capacity(NonZeroUsize::new(Self::DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}
