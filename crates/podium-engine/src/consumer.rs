//! Queue Consumers - Asynchronous Durable Propagation
//!
//! One long-lived consumer task per region drains that region's
//! write-behind queue into its durable shard. Consumers share nothing
//! but the GLOBAL shard; no cross-consumer coordination is taken.
//!
//! ## Loop Shape
//!
//! 1. Check the shutdown signal between blocking-wait iterations.
//! 2. Read queue depth: `>= high` pauses without draining, `>= medium`
//!    pauses briefly then continues, below that consumption runs at
//!    full rate. Thresholds come from configuration.
//! 3. Blocking pop with a bounded wait (default 5s) so backpressure and
//!    shutdown are re-evaluated even when the queue is idle.
//! 4. Upsert into the shard for the event's region; non-GLOBAL events
//!    additionally upsert a GLOBAL-tagged copy into the GLOBAL shard.
//!
//! ## Failure Policy
//!
//! Upsert failures are logged and the event is dropped — no retry
//! queue. The cache still holds the newer value, so the loss window is
//! durability only. Malformed payloads are logged and skipped. An
//! in-flight event is always finished before shutdown; each upsert is a
//! single atomic statement so no partial row is possible.

use crate::config::BackpressureConfig;
use crate::queue::WriteBehindQueue;
use podium_core::{ChangeEvent, Region};
use podium_store::{ScoreStore, ShardRouter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct QueueConsumer {
    region: Region,
    queue: Arc<WriteBehindQueue>,
    router: Arc<ShardRouter>,
    backpressure: BackpressureConfig,
    poll_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl QueueConsumer {
    pub fn new(
        region: Region,
        queue: Arc<WriteBehindQueue>,
        router: Arc<ShardRouter>,
        backpressure: BackpressureConfig,
        poll_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            region,
            queue,
            router,
            backpressure,
            poll_timeout,
            shutdown,
        }
    }

    /// Run until the shutdown signal flips, finishing any in-flight
    /// event before exiting.
    pub async fn run(mut self) {
        info!(region = %self.region, "queue consumer started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let depth = self.queue.depth(self.region);
            if depth >= self.backpressure.high {
                warn!(
                    region = %self.region,
                    depth,
                    high = self.backpressure.high,
                    "queue very large, backing off"
                );
                if self
                    .pause(Duration::from_millis(self.backpressure.long_pause_ms))
                    .await
                {
                    break;
                }
                continue;
            } else if depth >= self.backpressure.medium {
                warn!(
                    region = %self.region,
                    depth,
                    medium = self.backpressure.medium,
                    "queue large, slowing consumption"
                );
                if self
                    .pause(Duration::from_millis(self.backpressure.short_pause_ms))
                    .await
                {
                    break;
                }
            }

            let payload = tokio::select! {
                payload = self.queue.pop_timeout(self.region, self.poll_timeout) => payload,
                res = self.shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                    continue;
                }
            };

            if let Some(payload) = payload {
                self.apply(&payload).await;
            }
        }

        info!(region = %self.region, "queue consumer stopped");
    }

    /// Sleep, waking early on shutdown. Returns true when shutting down.
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.shutdown.changed() => true,
        }
    }

    /// Apply one queued payload to the durable store.
    async fn apply(&self, payload: &str) {
        let event: ChangeEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                error!(
                    region = %self.region,
                    error = %e,
                    "dropping malformed change event"
                );
                return;
            }
        };

        let entry = event.to_entry();
        match self.router.shard_for(event.region).upsert(&entry).await {
            Ok(()) => {
                debug!(
                    user_id = %event.user_id,
                    region = %event.region,
                    score = event.score,
                    "change event persisted"
                );
            }
            Err(e) => {
                error!(
                    user_id = %event.user_id,
                    region = %event.region,
                    error = %e,
                    "durable upsert failed, dropping event"
                );
            }
        }

        // Keep the GLOBAL shard a superset of every region.
        if event.region != Region::Global {
            let global_entry = event.for_global().to_entry();
            if let Err(e) = self
                .router
                .shard_for(Region::Global)
                .upsert(&global_entry)
                .await
            {
                error!(
                    user_id = %event.user_id,
                    error = %e,
                    "GLOBAL durable upsert failed, dropping copy"
                );
            }
        }
    }
}

/// Spawn one consumer per region, GLOBAL included.
pub fn spawn_consumers(
    queue: Arc<WriteBehindQueue>,
    router: Arc<ShardRouter>,
    backpressure: BackpressureConfig,
    poll_timeout: Duration,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    Region::all()
        .into_iter()
        .map(|region| {
            let consumer = QueueConsumer::new(
                region,
                queue.clone(),
                router.clone(),
                backpressure.clone(),
                poll_timeout,
                shutdown.clone(),
            );
            tokio::spawn(consumer.run())
        })
        .collect()
}
