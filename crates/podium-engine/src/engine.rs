//! Leaderboard Engine
//!
//! Orchestrates the ranked cache, shard router, write-behind queue, and
//! rate limiters into the inbound operation surface: `create_user`,
//! `update_score`, `add_score`, `get_top`, `get_rank`, `get_around`,
//! plus `admit` as an independently callable pre-condition gate.
//!
//! ## Write Path
//!
//! admitted → cache applied (visible to all readers) → queued →
//! persisted by a queue consumer (or dropped on persist failure, with
//! the cache remaining the freshest copy until restart or backfill).
//! GLOBAL duplication is decided by the queue, not here; the engine
//! only mirrors the cache-side sets.
//!
//! ## Read Path
//!
//! Reads are cache-first. A miss for a queried user consults the
//! durable shard, backfills the cache (score into the ranked set, name
//! into metadata), then recomputes. Absent in both stores is
//! `NotFound`.
//!
//! ## Failure Policy
//!
//! | failure                           | policy                         |
//! |-----------------------------------|--------------------------------|
//! | rate limiter unavailable          | fail open, log                 |
//! | cache read fails on a query       | fall through to durable shard  |
//! | durable read fails after miss     | `Unavailable`                  |
//! | cache write fails on a mutation   | `Unavailable` (write not applied) |
//! | name lookup fails anywhere        | name reported as `None`        |

use crate::cache::RankedCache;
use crate::config::Config;
use crate::limiter::TokenBucketLimiter;
use crate::queue::WriteBehindQueue;
use podium_core::{ChangeEvent, PodiumError, Region, Result, ScoreEntry, UserMeta};
use podium_store::{ScoreStore, ShardRouter};
use std::sync::Arc;
use tracing::{debug, warn};

/// One row of a top/around listing. Rank is implied by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub name: Option<String>,
    pub score: i64,
}

/// Answer to a rank query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankInfo {
    /// 1-based, descending by score.
    pub rank: u64,
    pub score: i64,
    pub name: Option<String>,
}

/// Window of rows centered on a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighborhood {
    pub rows: Vec<LeaderboardRow>,
    /// Index of the queried user within `rows`.
    pub center_index: usize,
}

/// Outcome of `create_user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    /// True for the single caller whose create-if-absent won.
    pub created: bool,
    pub entry: ScoreEntry,
}

pub struct Leaderboard {
    cache: Arc<dyn RankedCache>,
    router: Arc<ShardRouter>,
    queue: Arc<WriteBehindQueue>,
    user_limiter: TokenBucketLimiter,
    region_limiter: TokenBucketLimiter,
    reject_ceiling: usize,
}

impl Leaderboard {
    pub fn new(
        cache: Arc<dyn RankedCache>,
        router: Arc<ShardRouter>,
        queue: Arc<WriteBehindQueue>,
        config: &Config,
    ) -> Self {
        Self {
            cache,
            router,
            queue,
            user_limiter: TokenBucketLimiter::new(
                config.user_rate.capacity,
                config.user_rate.refill_per_sec,
            ),
            region_limiter: TokenBucketLimiter::new(
                config.region_rate.capacity,
                config.region_rate.refill_per_sec,
            ),
            reject_ceiling: config.backpressure.reject_ceiling,
        }
    }

    /// Admission gate for writes: per-user bucket, per-region bucket,
    /// then the advisory queue-depth check. Callable on its own as a
    /// pre-condition for work the engine does not perform itself.
    pub async fn admit(&self, user_id: &str, region: Region) -> Result<()> {
        match self.user_limiter.consume(&format!("user:{user_id}"), 1.0).await {
            Ok(decision) if !decision.allowed => {
                return Err(PodiumError::RateLimited {
                    retry_after_secs: decision.retry_after_secs,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "user rate limiter unavailable, failing open");
            }
        }

        match self
            .region_limiter
            .consume(&format!("region:{region}"), 1.0)
            .await
        {
            Ok(decision) if !decision.allowed => {
                return Err(PodiumError::RegionRateLimited {
                    retry_after_secs: decision.retry_after_secs,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(region = %region, error = %e, "region rate limiter unavailable, failing open");
            }
        }

        let depth = self.queue.depth(region);
        if depth >= self.reject_ceiling {
            return Err(PodiumError::QueueFull { depth });
        }

        Ok(())
    }

    /// Create a user with an initial score, if absent.
    ///
    /// Exactly one concurrent caller wins the create-if-absent race and
    /// performs the side effects (GLOBAL mirror, metadata, change
    /// event). Losers get the pre-existing entry from the cache alone —
    /// no durable read, creation stays cheap.
    pub async fn create_user(
        &self,
        user_id: &str,
        name: &str,
        region: Region,
        initial_score: i64,
    ) -> Result<CreateOutcome> {
        validate_user_id(user_id)?;
        self.admit(user_id, region).await?;

        let now = now_rfc3339();
        let created = self
            .cache
            .upsert_if_absent(region, user_id, initial_score)
            .await?;

        if !created {
            let score = self
                .cache
                .score_of(region, user_id)
                .await
                .unwrap_or_default()
                .unwrap_or(0);
            let meta = self.cache.get_meta(user_id).await.unwrap_or_default();
            let entry = match meta {
                Some(meta) => ScoreEntry {
                    user_id: user_id.to_string(),
                    name: meta.name,
                    region: meta.region,
                    score,
                    updated_at: meta.updated_at,
                },
                None => ScoreEntry {
                    user_id: user_id.to_string(),
                    name: name.to_string(),
                    region,
                    score,
                    updated_at: now,
                },
            };
            return Ok(CreateOutcome {
                created: false,
                entry,
            });
        }

        // GLOBAL mirror is create-if-absent: a regional create must
        // never clobber a score GLOBAL already holds. Later explicit
        // updates and increments overwrite it; queue arrival order
        // decides the durable value.
        self.cache
            .upsert_if_absent(Region::Global, user_id, initial_score)
            .await?;

        let entry = ScoreEntry {
            user_id: user_id.to_string(),
            name: name.to_string(),
            region,
            score: initial_score,
            updated_at: now.clone(),
        };
        self.apply_meta_and_publish(&entry).await?;

        debug!(user_id = %user_id, region = %region, score = initial_score, "user created");
        Ok(CreateOutcome {
            created: true,
            entry,
        })
    }

    /// Unconditionally set a user's score in the region and GLOBAL
    /// ranked sets.
    pub async fn update_score(
        &self,
        user_id: &str,
        name: &str,
        region: Region,
        score: i64,
    ) -> Result<()> {
        validate_user_id(user_id)?;
        self.admit(user_id, region).await?;

        self.cache.upsert(region, user_id, score).await?;
        if region != Region::Global {
            self.cache.upsert(Region::Global, user_id, score).await?;
        }

        let entry = ScoreEntry {
            user_id: user_id.to_string(),
            name: name.to_string(),
            region,
            score,
            updated_at: now_rfc3339(),
        };
        self.apply_meta_and_publish(&entry).await?;

        debug!(user_id = %user_id, region = %region, score, "score updated");
        Ok(())
    }

    /// Increment a user's score, returning the resulting value so
    /// callers observe the post-increment score without a second read.
    pub async fn add_score(
        &self,
        user_id: &str,
        name: &str,
        region: Region,
        delta: i64,
    ) -> Result<i64> {
        validate_user_id(user_id)?;
        self.admit(user_id, region).await?;

        let new_score = self.cache.increment(region, user_id, delta).await?;
        if region != Region::Global {
            self.cache
                .upsert(Region::Global, user_id, new_score)
                .await?;
        }

        let entry = ScoreEntry {
            user_id: user_id.to_string(),
            name: name.to_string(),
            region,
            score: new_score,
            updated_at: now_rfc3339(),
        };
        self.apply_meta_and_publish(&entry).await?;

        debug!(user_id = %user_id, region = %region, score = new_score, "score incremented");
        Ok(new_score)
    }

    /// Top `limit` rows for a region, names resolved via metadata with
    /// a durable fallback per row.
    pub async fn get_top(&self, region: Region, limit: usize) -> Result<Vec<LeaderboardRow>> {
        let ranked = match self.cache.top(region, limit).await {
            Ok(ranked) => ranked,
            Err(e) => {
                // Cache down: serve directly from the durable shard via
                // the (region, score) index.
                warn!(region = %region, error = %e, "ranked cache unavailable, serving top from shard");
                let entries = self.router.shard_for(region).top(limit as u32).await?;
                return Ok(entries
                    .into_iter()
                    .map(|entry| LeaderboardRow {
                        user_id: entry.user_id,
                        name: Some(entry.name),
                        score: entry.score,
                    })
                    .collect());
            }
        };

        let mut rows = Vec::with_capacity(ranked.len());
        for (user_id, score) in ranked {
            let name = self.resolve_name(region, &user_id).await;
            rows.push(LeaderboardRow {
                user_id,
                name,
                score,
            });
        }
        Ok(rows)
    }

    /// Rank and score for a user, with cache-miss backfill from the
    /// durable shard.
    pub async fn get_rank(&self, region: Region, user_id: &str) -> Result<RankInfo> {
        validate_user_id(user_id)?;
        self.ensure_cached(region, user_id).await?;

        let (rank, score) = self
            .cache
            .rank_of(region, user_id)
            .await?
            .ok_or_else(|| PodiumError::Unavailable("ranked set backfill not visible".into()))?;

        Ok(RankInfo {
            rank,
            score,
            name: self.resolve_name(region, user_id).await,
        })
    }

    /// Window of `radius` rows on each side of a user's rank.
    pub async fn get_around(
        &self,
        region: Region,
        user_id: &str,
        radius: usize,
    ) -> Result<Neighborhood> {
        validate_user_id(user_id)?;
        self.ensure_cached(region, user_id).await?;

        let (rank, _) = self
            .cache
            .rank_of(region, user_id)
            .await?
            .ok_or_else(|| PodiumError::Unavailable("ranked set backfill not visible".into()))?;

        let index = (rank - 1) as usize;
        let start = index.saturating_sub(radius);
        let ranked = self.cache.range(region, start, index + radius).await?;

        let mut rows = Vec::with_capacity(ranked.len());
        for (member, score) in ranked {
            let name = self.resolve_name(region, &member).await;
            rows.push(LeaderboardRow {
                user_id: member,
                name,
                score,
            });
        }

        Ok(Neighborhood {
            rows,
            center_index: index - start,
        })
    }

    /// Make sure `user_id` is present in the region's ranked set,
    /// backfilling score and metadata from the durable shard on a miss.
    async fn ensure_cached(&self, region: Region, user_id: &str) -> Result<()> {
        let cached = match self.cache.score_of(region, user_id).await {
            Ok(score) => score,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "cache read failed, falling through to shard");
                None
            }
        };
        if cached.is_some() {
            return Ok(());
        }

        let entry = self
            .router
            .shard_for(region)
            .get(user_id)
            .await
            .map_err(PodiumError::from)?
            .ok_or(PodiumError::NotFound)?;

        self.cache.upsert(region, user_id, entry.score).await?;
        if self.cache.get_meta(user_id).await.unwrap_or_default().is_none() {
            let meta = UserMeta {
                name: entry.name.clone(),
                region: entry.region,
                score: entry.score,
                updated_at: entry.updated_at.clone(),
            };
            if let Err(e) = self.cache.put_meta(user_id, meta).await {
                warn!(user_id = %user_id, error = %e, "metadata backfill failed");
            }
        }

        debug!(user_id = %user_id, region = %region, score = entry.score, "cache backfilled from shard");
        Ok(())
    }

    /// Display name for a row: metadata first, durable shard second,
    /// `None` when both miss. Never a hard failure.
    async fn resolve_name(&self, region: Region, user_id: &str) -> Option<String> {
        if let Ok(Some(meta)) = self.cache.get_meta(user_id).await {
            if !meta.name.is_empty() {
                return Some(meta.name);
            }
        }

        match self.router.shard_for(region).get(user_id).await {
            Ok(Some(entry)) if !entry.name.is_empty() => {
                let meta = UserMeta {
                    name: entry.name.clone(),
                    region: entry.region,
                    score: entry.score,
                    updated_at: entry.updated_at,
                };
                if let Err(e) = self.cache.put_meta(user_id, meta).await {
                    warn!(user_id = %user_id, error = %e, "metadata backfill failed");
                }
                Some(entry.name)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "name lookup failed, reporting null");
                None
            }
        }
    }

    /// Write metadata and emit the change event for an applied write.
    async fn apply_meta_and_publish(&self, entry: &ScoreEntry) -> Result<()> {
        self.cache
            .put_meta(
                &entry.user_id,
                UserMeta {
                    name: entry.name.clone(),
                    region: entry.region,
                    score: entry.score,
                    updated_at: entry.updated_at.clone(),
                },
            )
            .await?;

        self.queue.publish(&ChangeEvent {
            user_id: entry.user_id.clone(),
            name: entry.name.clone(),
            region: entry.region,
            score: entry.score,
            timestamp: entry.updated_at.clone(),
        })
    }
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(PodiumError::InvalidPayload("user_id is required".into()));
    }
    Ok(())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
