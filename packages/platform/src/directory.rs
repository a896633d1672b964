use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Point-in-time view of an externally managed profile. The eligibility
/// filter works purely over these snapshots, so callers fetch them fresh
/// for every decision instead of caching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub id: i32,

    pub is_manager: bool,
    pub is_moderator: bool,

    pub is_active: bool,
    pub is_suspended: bool,
    /// Scheduled for deactivation but not yet purged.
    pub pending_deactivation: bool,

    /// Stable account-creation timestamp, used as a selection tie-breaker.
    pub created_at: DateTime<Utc>,

    /// Profiles this profile has blocked. Directional: membership here says
    /// nothing about who blocked this profile.
    pub blocked: HashSet<i32>,
}

impl ProfileSnapshot {
    pub fn has_blocked(&self, other: i32) -> bool {
        self.blocked.contains(&other)
    }
}

/// Lookup contract over the externally persisted profile store.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Resolve profiles by id. Unknown ids are silently omitted from the
    /// result, so the caller decides whether a short result is an error.
    async fn find_by_ids(&self, ids: &[i32]) -> anyhow::Result<Vec<ProfileSnapshot>>;

    /// All profiles currently holding the moderator role flag.
    async fn moderators(&self) -> anyhow::Result<Vec<ProfileSnapshot>>;
}

/// Existence-only lookup contract over the externally persisted topic store.
#[async_trait]
pub trait TopicCatalog: Send + Sync {
    /// Return the subset of `ids` that name existing topics.
    async fn existing(&self, ids: &[i32]) -> anyhow::Result<Vec<i32>>;
}
