//! Engine Configuration
//!
//! All values are environment-overridable (`PODIUM_*`), with defaults
//! suitable for local development:
//!
//! - `PODIUM_USER_RATE_TOKENS` / `PODIUM_USER_RATE_WINDOW_SECS`:
//!   per-user admission, N requests per window (default 20 per 60s)
//! - `PODIUM_REGION_RATE_BURST` / `PODIUM_REGION_RATE_PER_SEC`:
//!   per-region burst capacity and sustained refill (default 1000 / 500)
//! - `PODIUM_BACKPRESSURE_MEDIUM` / `PODIUM_BACKPRESSURE_HIGH`:
//!   consumer slow-down thresholds (default 50000 / 100000)
//! - `PODIUM_QUEUE_REJECT_CEILING`: advisory admission ceiling
//!   (default 150000)
//! - `PODIUM_CONSUMER_POLL_MS`: bounded blocking-pop wait (default 5000)
//! - `PODIUM_SHORT_PAUSE_MS` / `PODIUM_LONG_PAUSE_MS`: backpressure
//!   pauses (default 2000 / 5000)
//! - `PODIUM_SHARD_ASIA` / `_EU` / `_NA` / `_GLOBAL`: SQLite paths per
//!   shard (default `:memory:`)

use podium_core::Region;
use podium_store::ShardPaths;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity in tokens.
    pub capacity: f64,
    /// Sustained refill in tokens per second.
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackpressureConfig {
    /// Depth at which consumers slow down.
    pub medium: usize,
    /// Depth at which consumers stop draining and only poll depth.
    pub high: usize,
    /// Depth at which new writes are rejected with `QueueFull`.
    pub reject_ceiling: usize,
    /// Pause applied at `medium`.
    pub short_pause_ms: u64,
    /// Pause applied at `high`.
    pub long_pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub user_rate: RateLimitConfig,
    pub region_rate: RateLimitConfig,
    pub backpressure: BackpressureConfig,
    /// Bounded wait of the consumer blocking pop.
    pub consumer_poll_ms: u64,
    /// SQLite path per shard; missing regions run in-memory.
    pub shard_paths: ShardPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // 20 requests per 60s window per user.
            user_rate: RateLimitConfig {
                capacity: 20.0,
                refill_per_sec: 20.0 / 60.0,
            },
            region_rate: RateLimitConfig {
                capacity: 1000.0,
                refill_per_sec: 500.0,
            },
            backpressure: BackpressureConfig {
                medium: 50_000,
                high: 100_000,
                reject_ceiling: 150_000,
                short_pause_ms: 2_000,
                long_pause_ms: 5_000,
            },
            consumer_poll_ms: 5_000,
            shard_paths: ShardPaths::new(),
        }
    }
}

impl Config {
    /// Build from `PODIUM_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Some(tokens) = env_parse::<f64>("PODIUM_USER_RATE_TOKENS") {
            config.user_rate.capacity = tokens;
            let window = env_parse::<f64>("PODIUM_USER_RATE_WINDOW_SECS").unwrap_or(60.0);
            config.user_rate.refill_per_sec = tokens / window.max(f64::EPSILON);
        }
        if let Some(burst) = env_parse::<f64>("PODIUM_REGION_RATE_BURST") {
            config.region_rate.capacity = burst;
        }
        if let Some(rate) = env_parse::<f64>("PODIUM_REGION_RATE_PER_SEC") {
            config.region_rate.refill_per_sec = rate;
        }
        if let Some(v) = env_parse("PODIUM_BACKPRESSURE_MEDIUM") {
            config.backpressure.medium = v;
        }
        if let Some(v) = env_parse("PODIUM_BACKPRESSURE_HIGH") {
            config.backpressure.high = v;
        }
        if let Some(v) = env_parse("PODIUM_QUEUE_REJECT_CEILING") {
            config.backpressure.reject_ceiling = v;
        }
        if let Some(v) = env_parse("PODIUM_SHORT_PAUSE_MS") {
            config.backpressure.short_pause_ms = v;
        }
        if let Some(v) = env_parse("PODIUM_LONG_PAUSE_MS") {
            config.backpressure.long_pause_ms = v;
        }
        if let Some(v) = env_parse("PODIUM_CONSUMER_POLL_MS") {
            config.consumer_poll_ms = v;
        }

        for region in Region::all() {
            let var = format!("PODIUM_SHARD_{}", region.as_str());
            if let Ok(path) = std::env::var(&var) {
                config.shard_paths.insert(region, path);
            }
        }

        config
    }

    pub fn consumer_poll(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_ms)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_order_thresholds() {
        let config = Config::default();
        assert!(config.backpressure.medium < config.backpressure.high);
        assert!(config.backpressure.high < config.backpressure.reject_ceiling);
        assert!(config.user_rate.capacity > 0.0);
        assert!(config.region_rate.refill_per_sec > 0.0);
    }
}
