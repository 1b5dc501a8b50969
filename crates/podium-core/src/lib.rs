//! Podium Core Types
//!
//! Shared domain types for the Podium ranked-leaderboard platform.
//!
//! ## Types Overview
//!
//! ### Region
//! Shard identifier for the leaderboard. Every user has a home region
//! (ASIA, EU, NA); GLOBAL is a dedicated aggregate shard that mirrors
//! every user regardless of home region.
//!
//! ### ScoreEntry
//! The canonical durable row: one per user per shard. The GLOBAL shard
//! holds a mirrored entry for every user.
//!
//! ### ChangeEvent
//! The unit of work between the fast path and the durable store. Created
//! by every write operation, carried through the write-behind queue as
//! JSON, and discarded after a successful upsert.
//!
//! ### UserMeta
//! Cache-side metadata hash for a user (display name, home region, last
//! applied score). Read by top/rank/around queries to resolve names.
//!
//! ## Error Handling
//!
//! All engine-facing operations return `Result<T>` which is aliased to
//! `Result<T, PodiumError>`. The taxonomy distinguishes load shedding
//! (`RateLimited`, `RegionRateLimited`, `QueueFull`) from hard failures
//! (`InvalidPayload`, `NotFound`, `Unavailable`) so callers can attach a
//! retry hint instead of surfacing an error when the system is merely
//! under load.

pub mod error;
pub mod types;

pub use error::{PodiumError, Result};
pub use types::{ChangeEvent, Region, ScoreEntry, UserMeta};
