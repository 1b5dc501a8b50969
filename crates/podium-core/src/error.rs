//! Podium Error Taxonomy
//!
//! ## Error Categories
//!
//! ### Validation
//! - `InvalidPayload`: missing or malformed required fields, rejected
//!   before any store access
//!
//! ### Load Shedding (carry a retry hint, not a hard failure)
//! - `RateLimited`: per-user token bucket denied admission
//! - `RegionRateLimited`: per-region token bucket denied admission
//! - `QueueFull`: advisory backpressure rejection, carries current depth
//!
//! ### Lookup
//! - `NotFound`: entity absent in both the cache and the durable store
//!
//! ### Infrastructure
//! - `Unavailable`: a cache or durable-store call failed after all
//!   degrade-and-continue options were exhausted

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PodiumError>;

#[derive(Debug, Error)]
pub enum PodiumError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("region rate limit exceeded, retry after {retry_after_secs}s")]
    RegionRateLimited { retry_after_secs: u64 },

    #[error("write queue full (depth {depth})")]
    QueueFull { depth: usize },

    #[error("not found")]
    NotFound,

    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

impl PodiumError {
    /// True for admission rejections that should be reported to callers
    /// with a retry hint rather than as an error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PodiumError::RateLimited { .. }
                | PodiumError::RegionRateLimited { .. }
                | PodiumError::QueueFull { .. }
        )
    }
}
