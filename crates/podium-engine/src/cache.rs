//! Ranked Cache Store
//!
//! The fast path for all reads and writes: a per-region ordered set
//! (member → score) plus a side mapping of member metadata.
//!
//! ## Ordering Invariant
//!
//! Rank is 1-based and descending by score. Ties break by ascending
//! lexical user_id, so rank assignment is stable across identical
//! scores.
//!
//! ## Atomicity
//!
//! The store's own locking is the correctness boundary for concurrent
//! writers: every mutating operation on a region set completes under a
//! single write-lock acquisition, so no engine-level locking is taken
//! around multi-step score updates. `upsert_if_absent` is the
//! create-if-absent primitive `create_user` races on.
//!
//! ## Backends
//!
//! `RankedCache` is a trait so the in-memory implementation can be
//! swapped for a remote ordered-set store; that is why the methods are
//! async and fallible even though [`MemoryRankedCache`] never errors.

use async_trait::async_trait;
use podium_core::{Region, Result, UserMeta};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Per-region ordered set plus metadata side-mapping.
#[async_trait]
pub trait RankedCache: Send + Sync {
    /// Set a member's score, inserting if absent.
    async fn upsert(&self, region: Region, user_id: &str, score: i64) -> Result<()>;

    /// Set a member's score only if the member is not already present.
    /// Returns true if this call inserted the member.
    async fn upsert_if_absent(&self, region: Region, user_id: &str, score: i64) -> Result<bool>;

    /// Add `delta` to a member's score (0 if absent), saturating at the
    /// i64 bounds, returning the resulting score.
    async fn increment(&self, region: Region, user_id: &str, delta: i64) -> Result<i64>;

    /// Score lookup by member.
    async fn score_of(&self, region: Region, user_id: &str) -> Result<Option<i64>>;

    /// 1-based descending rank and score for a member.
    async fn rank_of(&self, region: Region, user_id: &str) -> Result<Option<(u64, i64)>>;

    /// Top `limit` members by descending rank order.
    async fn top(&self, region: Region, limit: usize) -> Result<Vec<(String, i64)>>;

    /// Members at 0-based rank indexes `start..=end`, descending.
    async fn range(&self, region: Region, start: usize, end: usize) -> Result<Vec<(String, i64)>>;

    /// Remove a member from a region set. Returns true if present.
    /// Metadata is left in place; eviction and metadata loss are
    /// independent failure modes.
    async fn remove(&self, region: Region, user_id: &str) -> Result<bool>;

    /// Replace a user's metadata hash.
    async fn put_meta(&self, user_id: &str, meta: UserMeta) -> Result<()>;

    /// Fetch a user's metadata hash.
    async fn get_meta(&self, user_id: &str) -> Result<Option<UserMeta>>;
}

/// One region's ordered set.
///
/// `order` holds `(Reverse(score), user_id)` so iteration order is the
/// rank order: descending score, ascending user_id on ties.
#[derive(Default)]
struct RankedSet {
    scores: HashMap<String, i64>,
    order: BTreeSet<(Reverse<i64>, String)>,
}

impl RankedSet {
    fn set(&mut self, user_id: &str, score: i64) {
        if let Some(old) = self.scores.insert(user_id.to_string(), score) {
            self.order.remove(&(Reverse(old), user_id.to_string()));
        }
        self.order.insert((Reverse(score), user_id.to_string()));
    }

    fn rank_of(&self, user_id: &str) -> Option<(u64, i64)> {
        let score = *self.scores.get(user_id)?;
        let key = (Reverse(score), user_id.to_string());
        let rank = self.order.range(..=key).count() as u64;
        Some((rank, score))
    }

    fn slice(&self, start: usize, end: usize) -> Vec<(String, i64)> {
        self.order
            .iter()
            .skip(start)
            .take(end.saturating_sub(start) + 1)
            .map(|(Reverse(score), user_id)| (user_id.clone(), *score))
            .collect()
    }

    fn remove(&mut self, user_id: &str) -> bool {
        match self.scores.remove(user_id) {
            Some(score) => {
                self.order.remove(&(Reverse(score), user_id.to_string()));
                true
            }
            None => false,
        }
    }
}

/// In-process ranked cache.
#[derive(Default)]
pub struct MemoryRankedCache {
    sets: RwLock<HashMap<Region, RankedSet>>,
    meta: RwLock<HashMap<String, UserMeta>>,
}

impl MemoryRankedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RankedCache for MemoryRankedCache {
    async fn upsert(&self, region: Region, user_id: &str, score: i64) -> Result<()> {
        let mut sets = self.sets.write().await;
        sets.entry(region).or_default().set(user_id, score);
        Ok(())
    }

    async fn upsert_if_absent(&self, region: Region, user_id: &str, score: i64) -> Result<bool> {
        let mut sets = self.sets.write().await;
        let set = sets.entry(region).or_default();
        if set.scores.contains_key(user_id) {
            return Ok(false);
        }
        set.set(user_id, score);
        Ok(true)
    }

    async fn increment(&self, region: Region, user_id: &str, delta: i64) -> Result<i64> {
        let mut sets = self.sets.write().await;
        let set = sets.entry(region).or_default();
        let new_score = set
            .scores
            .get(user_id)
            .copied()
            .unwrap_or(0)
            .saturating_add(delta);
        set.set(user_id, new_score);
        Ok(new_score)
    }

    async fn score_of(&self, region: Region, user_id: &str) -> Result<Option<i64>> {
        let sets = self.sets.read().await;
        Ok(sets.get(&region).and_then(|s| s.scores.get(user_id).copied()))
    }

    async fn rank_of(&self, region: Region, user_id: &str) -> Result<Option<(u64, i64)>> {
        let sets = self.sets.read().await;
        Ok(sets.get(&region).and_then(|s| s.rank_of(user_id)))
    }

    async fn top(&self, region: Region, limit: usize) -> Result<Vec<(String, i64)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let sets = self.sets.read().await;
        Ok(sets
            .get(&region)
            .map(|s| s.slice(0, limit - 1))
            .unwrap_or_default())
    }

    async fn range(&self, region: Region, start: usize, end: usize) -> Result<Vec<(String, i64)>> {
        let sets = self.sets.read().await;
        Ok(sets
            .get(&region)
            .map(|s| s.slice(start, end))
            .unwrap_or_default())
    }

    async fn remove(&self, region: Region, user_id: &str) -> Result<bool> {
        let mut sets = self.sets.write().await;
        Ok(sets.get_mut(&region).is_some_and(|s| s.remove(user_id)))
    }

    async fn put_meta(&self, user_id: &str, meta: UserMeta) -> Result<()> {
        self.meta.write().await.insert(user_id.to_string(), meta);
        Ok(())
    }

    async fn get_meta(&self, user_id: &str) -> Result<Option<UserMeta>> {
        Ok(self.meta.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rank_is_one_based_and_descending() {
        let cache = MemoryRankedCache::new();
        cache.upsert(Region::Eu, "low", 10).await.unwrap();
        cache.upsert(Region::Eu, "high", 100).await.unwrap();
        cache.upsert(Region::Eu, "mid", 50).await.unwrap();

        assert_eq!(cache.rank_of(Region::Eu, "high").await.unwrap(), Some((1, 100)));
        assert_eq!(cache.rank_of(Region::Eu, "mid").await.unwrap(), Some((2, 50)));
        assert_eq!(cache.rank_of(Region::Eu, "low").await.unwrap(), Some((3, 10)));
        assert_eq!(cache.rank_of(Region::Eu, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ties_break_by_ascending_user_id() {
        let cache = MemoryRankedCache::new();
        cache.upsert(Region::Na, "bravo", 100).await.unwrap();
        cache.upsert(Region::Na, "alpha", 100).await.unwrap();
        cache.upsert(Region::Na, "charlie", 100).await.unwrap();

        let top = cache.top(Region::Na, 10).await.unwrap();
        let ids: Vec<&str> = top.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "bravo", "charlie"]);

        assert_eq!(cache.rank_of(Region::Na, "alpha").await.unwrap().unwrap().0, 1);
        assert_eq!(cache.rank_of(Region::Na, "bravo").await.unwrap().unwrap().0, 2);
        assert_eq!(cache.rank_of(Region::Na, "charlie").await.unwrap().unwrap().0, 3);
    }

    #[tokio::test]
    async fn upsert_moves_member_to_new_rank() {
        let cache = MemoryRankedCache::new();
        cache.upsert(Region::Eu, "a", 10).await.unwrap();
        cache.upsert(Region::Eu, "b", 20).await.unwrap();

        cache.upsert(Region::Eu, "a", 30).await.unwrap();

        let top = cache.top(Region::Eu, 10).await.unwrap();
        assert_eq!(top, vec![("a".to_string(), 30), ("b".to_string(), 20)]);
        // The stale order entry must be gone.
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn upsert_if_absent_never_clobbers() {
        let cache = MemoryRankedCache::new();
        assert!(cache.upsert_if_absent(Region::Eu, "u1", 100).await.unwrap());
        assert!(!cache.upsert_if_absent(Region::Eu, "u1", 999).await.unwrap());
        assert_eq!(cache.score_of(Region::Eu, "u1").await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn increment_starts_from_zero_for_absent_member() {
        let cache = MemoryRankedCache::new();
        assert_eq!(cache.increment(Region::Asia, "u1", 5).await.unwrap(), 5);
        assert_eq!(cache.increment(Region::Asia, "u1", -2).await.unwrap(), 3);
        assert_eq!(cache.score_of(Region::Asia, "u1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn increment_saturates_at_i64_bounds() {
        let cache = MemoryRankedCache::new();
        cache.upsert(Region::Eu, "u1", i64::MAX - 1).await.unwrap();

        assert_eq!(
            cache.increment(Region::Eu, "u1", i64::MAX).await.unwrap(),
            i64::MAX
        );

        cache.upsert(Region::Eu, "u2", i64::MIN + 1).await.unwrap();
        assert_eq!(
            cache.increment(Region::Eu, "u2", i64::MIN).await.unwrap(),
            i64::MIN
        );
    }

    #[tokio::test]
    async fn range_returns_inclusive_window() {
        let cache = MemoryRankedCache::new();
        for (user, score) in [("a", 50), ("b", 40), ("c", 30), ("d", 20), ("e", 10)] {
            cache.upsert(Region::Eu, user, score).await.unwrap();
        }

        let window = cache.range(Region::Eu, 1, 3).await.unwrap();
        let ids: Vec<&str> = window.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);

        // Window past the end truncates.
        let tail = cache.range(Region::Eu, 3, 10).await.unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[tokio::test]
    async fn regions_are_independent() {
        let cache = MemoryRankedCache::new();
        cache.upsert(Region::Eu, "u1", 100).await.unwrap();

        assert_eq!(cache.score_of(Region::Asia, "u1").await.unwrap(), None);
        assert!(cache.top(Region::Global, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_evicts_member_but_keeps_meta() {
        let cache = MemoryRankedCache::new();
        cache.upsert(Region::Eu, "u1", 100).await.unwrap();
        cache
            .put_meta(
                "u1",
                UserMeta {
                    name: "Alice".to_string(),
                    region: Region::Eu,
                    score: 100,
                    updated_at: "2026-01-01T00:00:00Z".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(cache.remove(Region::Eu, "u1").await.unwrap());
        assert!(!cache.remove(Region::Eu, "u1").await.unwrap());
        assert_eq!(cache.score_of(Region::Eu, "u1").await.unwrap(), None);
        assert!(cache.get_meta("u1").await.unwrap().is_some());
    }
}
