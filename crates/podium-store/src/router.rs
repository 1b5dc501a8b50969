//! Durable Store Router
//!
//! Maps a region to its backing shard. One long-lived store per
//! configured region, constructed once at startup and passed by
//! reference (`Arc`) to every component needing durable access — no
//! ambient or lazily-created connections.
//!
//! A GLOBAL shard always exists: regions without an explicit
//! configuration fall back to it, so routing never fails.

use crate::error::Result;
use crate::store::{ScoreStore, SqliteScoreStore};
use podium_core::Region;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Shard endpoint configuration: region to SQLite path.
///
/// The value `":memory:"` (or an absent region) selects an in-memory
/// shard. GLOBAL is created even when unconfigured.
pub type ShardPaths = HashMap<Region, String>;

pub struct ShardRouter {
    shards: HashMap<Region, Arc<dyn ScoreStore>>,
}

impl ShardRouter {
    /// Connect every configured shard. Called once at startup; each
    /// shard runs its idempotent schema bootstrap on connect.
    pub async fn connect(paths: &ShardPaths) -> Result<ShardRouter> {
        let mut shards: HashMap<Region, Arc<dyn ScoreStore>> = HashMap::new();

        for region in Region::all() {
            let store: Arc<dyn ScoreStore> = match paths.get(&region) {
                Some(path) if path != ":memory:" => {
                    info!(region = %region, path = %path, "connecting shard");
                    Arc::new(SqliteScoreStore::new(path).await?)
                }
                _ => {
                    info!(region = %region, "connecting in-memory shard");
                    Arc::new(SqliteScoreStore::new_in_memory().await?)
                }
            };
            shards.insert(region, store);
        }

        Ok(ShardRouter { shards })
    }

    /// All shards in-memory (tests and default config).
    pub async fn in_memory() -> Result<ShardRouter> {
        Self::connect(&ShardPaths::new()).await
    }

    /// The shard backing `region`.
    ///
    /// Every `Region` has a shard after `connect`, so this cannot miss;
    /// the GLOBAL fallback guards against a future partially-configured
    /// router.
    pub fn shard_for(&self, region: Region) -> Arc<dyn ScoreStore> {
        self.shards
            .get(&region)
            .or_else(|| self.shards.get(&Region::Global))
            .expect("router always holds a GLOBAL shard")
            .clone()
    }
}
