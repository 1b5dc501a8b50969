//! Write-Behind Queue
//!
//! Per-region durable-ordering FIFO between the fast path and the queue
//! consumers. Every write publishes a change event here after the cache
//! write is already visible to readers.
//!
//! ## GLOBAL Fan-Out
//!
//! Duplication to GLOBAL is decided in exactly one place: `publish`
//! appends the event to its region queue and, when the region is not
//! GLOBAL, appends a synthetic GLOBAL copy to the GLOBAL queue. Nothing
//! else in the system re-invokes the write path to mirror a score.
//!
//! ## Transport
//!
//! Events cross the queue as JSON payloads, so consumers own decoding
//! and a malformed payload is a per-event failure (logged and skipped),
//! not a queue failure.
//!
//! ## Ordering
//!
//! Within one region's queue, events pop in enqueue order. GLOBAL
//! interleaves copies from all regions with no cross-region ordering
//! guarantee beyond each source's FIFO.

use podium_core::{ChangeEvent, PodiumError, Region, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

struct RegionQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl RegionQueue {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn push(&self, payload: String) {
        self.items
            .lock()
            .expect("queue mutex poisoned")
            .push_back(payload);
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<String> {
        self.items
            .lock()
            .expect("queue mutex poisoned")
            .pop_front()
    }

    fn depth(&self) -> usize {
        self.items.lock().expect("queue mutex poisoned").len()
    }
}

/// FIFO queues, one per region, GLOBAL included.
pub struct WriteBehindQueue {
    queues: HashMap<Region, RegionQueue>,
}

impl Default for WriteBehindQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBehindQueue {
    pub fn new() -> Self {
        let queues = Region::all()
            .into_iter()
            .map(|region| (region, RegionQueue::new()))
            .collect();
        Self { queues }
    }

    fn queue(&self, region: Region) -> &RegionQueue {
        // Constructed with every region; cannot miss.
        &self.queues[&region]
    }

    /// Append `event` to its region queue, fanning out a GLOBAL copy
    /// for non-GLOBAL events.
    pub fn publish(&self, event: &ChangeEvent) -> Result<()> {
        let payload =
            serde_json::to_string(event).map_err(|e| PodiumError::Unavailable(e.to_string()))?;

        self.queue(event.region).push(payload);
        debug!(user_id = %event.user_id, region = %event.region, "change event queued");

        if event.region != Region::Global {
            let mirror = event.for_global();
            let payload = serde_json::to_string(&mirror)
                .map_err(|e| PodiumError::Unavailable(e.to_string()))?;
            self.queue(Region::Global).push(payload);
            debug!(user_id = %event.user_id, "GLOBAL mirror event queued");
        }

        Ok(())
    }

    /// Append a raw payload without encoding, bypassing [`publish`]'s
    /// fan-out. Test seam for injecting malformed payloads and filler
    /// depth; production writes go through [`publish`].
    ///
    /// [`publish`]: WriteBehindQueue::publish
    #[doc(hidden)]
    pub fn publish_raw(&self, region: Region, payload: String) {
        self.queue(region).push(payload);
    }

    /// Blocking pop with a bounded wait. Returns `None` when `wait`
    /// elapses with the queue still empty, so callers can re-evaluate
    /// backpressure and shutdown between attempts.
    pub async fn pop_timeout(&self, region: Region, wait: Duration) -> Option<String> {
        let queue = self.queue(region);
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            if let Some(payload) = queue.try_pop() {
                return Some(payload);
            }
            if tokio::time::timeout_at(deadline, queue.notify.notified())
                .await
                .is_err()
            {
                return queue.try_pop();
            }
        }
    }

    /// Current depth of one region's queue.
    pub fn depth(&self, region: Region) -> usize {
        self.queue(region).depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_id: &str, region: Region, score: i64) -> ChangeEvent {
        ChangeEvent {
            user_id: user_id.to_string(),
            name: "Tester".to_string(),
            region,
            score,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = WriteBehindQueue::new();
        queue.publish(&event("u1", Region::Eu, 1)).unwrap();
        queue.publish(&event("u2", Region::Eu, 2)).unwrap();

        let first = queue
            .pop_timeout(Region::Eu, Duration::from_millis(50))
            .await
            .unwrap();
        let second = queue
            .pop_timeout(Region::Eu, Duration::from_millis(50))
            .await
            .unwrap();

        let first: ChangeEvent = serde_json::from_str(&first).unwrap();
        let second: ChangeEvent = serde_json::from_str(&second).unwrap();
        assert_eq!(first.user_id, "u1");
        assert_eq!(second.user_id, "u2");
    }

    #[tokio::test]
    async fn regional_publish_fans_out_to_global() {
        let queue = WriteBehindQueue::new();
        queue.publish(&event("u1", Region::Asia, 10)).unwrap();

        assert_eq!(queue.depth(Region::Asia), 1);
        assert_eq!(queue.depth(Region::Global), 1);
        assert_eq!(queue.depth(Region::Eu), 0);

        let mirror = queue
            .pop_timeout(Region::Global, Duration::from_millis(50))
            .await
            .unwrap();
        let mirror: ChangeEvent = serde_json::from_str(&mirror).unwrap();
        assert_eq!(mirror.region, Region::Global);
        assert_eq!(mirror.user_id, "u1");
        assert_eq!(mirror.score, 10);
    }

    #[tokio::test]
    async fn global_publish_is_not_duplicated() {
        let queue = WriteBehindQueue::new();
        queue.publish(&event("u1", Region::Global, 10)).unwrap();
        assert_eq!(queue.depth(Region::Global), 1);
    }

    #[tokio::test]
    async fn pop_times_out_on_empty_queue() {
        let queue = WriteBehindQueue::new();
        let popped = queue
            .pop_timeout(Region::Na, Duration::from_millis(20))
            .await;
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn pop_wakes_on_concurrent_publish() {
        let queue = std::sync::Arc::new(WriteBehindQueue::new());

        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue.pop_timeout(Region::Eu, Duration::from_secs(5)).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.publish(&event("u1", Region::Eu, 1)).unwrap();

        let popped = popper.await.unwrap();
        assert!(popped.is_some());
    }
}
