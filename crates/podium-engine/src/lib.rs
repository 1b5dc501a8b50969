//! Podium Engine
//!
//! The in-process half of the leaderboard: ranked cache, write-behind
//! queue, queue consumers, token-bucket admission, and the
//! [`Leaderboard`] orchestrator that ties them to the durable shards.
//!
//! ## Data Flow
//!
//! ```text
//! write ──▶ admit (limiters + queue depth)
//!       ──▶ ranked cache (immediately visible to reads)
//!       ──▶ write-behind queue ──▶ per-region consumer ──▶ SQL shard
//!
//! read  ──▶ ranked cache ──miss──▶ SQL shard ──▶ backfill cache
//! ```
//!
//! A typical deployment builds a [`config::Config`] (usually
//! `Config::from_env`), connects a [`podium_store::ShardRouter`],
//! spawns [`consumer::spawn_consumers`], and serves traffic through a
//! shared [`Leaderboard`].

pub mod cache;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod limiter;
pub mod queue;

pub use cache::{MemoryRankedCache, RankedCache};
pub use config::{BackpressureConfig, Config, RateLimitConfig};
pub use consumer::{spawn_consumers, QueueConsumer};
pub use engine::{CreateOutcome, Leaderboard, LeaderboardRow, Neighborhood, RankInfo};
pub use limiter::{RateDecision, TokenBucketLimiter};
pub use queue::WriteBehindQueue;
