use serde::{Deserialize, Serialize};

/// Leaderboard shard identifier.
///
/// `Global` is a real shard, not a pseudo-region: it has its own ranked
/// set, queue, and durable partition, and converges to the most recently
/// applied score for every user across all home regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Asia,
    Eu,
    Na,
    Global,
}

impl Region {
    /// All configured shards, GLOBAL last.
    pub fn all() -> [Region; 4] {
        [Region::Asia, Region::Eu, Region::Na, Region::Global]
    }

    /// Uppercase wire form, matching the durable `region` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Asia => "ASIA",
            Region::Eu => "EU",
            Region::Na => "NA",
            Region::Global => "GLOBAL",
        }
    }

    /// Parse a region code, case-insensitively.
    ///
    /// Unknown or empty input routes to GLOBAL rather than failing: an
    /// unrecognized region on a read is a query against the aggregate,
    /// and on a write it keeps the row visible somewhere sensible.
    pub fn from_code(code: &str) -> Region {
        match code.trim().to_ascii_uppercase().as_str() {
            "ASIA" => Region::Asia,
            "EU" => Region::Eu,
            "NA" => Region::Na,
            _ => Region::Global,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical durable leaderboard row, keyed by `user_id` within a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub user_id: String,
    pub name: String,
    pub region: Region,
    pub score: i64,
    /// RFC 3339 timestamp of the last applied write.
    pub updated_at: String,
}

/// Change event emitted by every write operation.
///
/// Immutable once enqueued. Consumed by exactly one region consumer in
/// the steady state (at-least-once under failure; upserts are
/// idempotent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub user_id: String,
    pub name: String,
    pub region: Region,
    pub score: i64,
    pub timestamp: String,
}

impl ChangeEvent {
    /// The synthetic GLOBAL mirror of this event. Identical payload,
    /// retagged so the GLOBAL consumer lands it in the GLOBAL shard.
    pub fn for_global(&self) -> ChangeEvent {
        ChangeEvent {
            region: Region::Global,
            ..self.clone()
        }
    }

    /// The durable row this event resolves to.
    pub fn to_entry(&self) -> ScoreEntry {
        ScoreEntry {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            region: self.region,
            score: self.score,
            updated_at: self.timestamp.clone(),
        }
    }
}

/// Cache-side metadata for a user, stored next to the ranked sets.
///
/// A miss here is never a hard failure: queries report the name as
/// `None` rather than failing the whole read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMeta {
    pub name: String,
    pub region: Region,
    pub score: i64,
    pub updated_at: String,
}
