//! Podium Durable Store
//!
//! The relational side of the leaderboard: the system of record that
//! survives cache loss. One logical shard per region (ASIA, EU, NA)
//! plus a dedicated GLOBAL shard holding a mirrored row for every user.
//!
//! ## Architecture
//!
//! ```text
//! Queue Consumers ──upsert──▶ ShardRouter ──▶ SqliteScoreStore (ASIA)
//!                                         ──▶ SqliteScoreStore (EU)
//!                                         ──▶ SqliteScoreStore (NA)
//!                                         ──▶ SqliteScoreStore (GLOBAL)
//! Engine reads ────on cache miss──────────▲
//! ```
//!
//! In the steady state only queue consumers write here; the engine
//! reads on a cache miss and may opportunistically write back during
//! backfill.
//!
//! ## Backends
//!
//! `ScoreStore` is a trait so the SQLite shards can be swapped for a
//! server-backed database without touching the consumers or engine.

pub mod error;
pub mod router;
pub mod store;

pub use error::{Result, StoreError};
pub use router::{ShardPaths, ShardRouter};
pub use store::{ScoreStore, SqliteScoreStore};
