use std::collections::{HashMap, HashSet};

use crate::directory::ProfileSnapshot;
use crate::eligibility::{WorkerRole, is_eligible_worker};

/// Pick the moderator to receive new work.
///
/// Fewest currently-unresolved assignments wins; ties break by earliest
/// account creation, then lowest id, so repeated calls over the same inputs
/// are deterministic. Candidates failing the eligibility filter never win,
/// whatever their load.
pub fn select_moderator(
    candidates: &[ProfileSnapshot],
    loads: &HashMap<i32, i64>,
    excluding: &HashSet<i32>,
    blocked_by: Option<i32>,
) -> Option<i32> {
    candidates
        .iter()
        .filter(|c| is_eligible_worker(c, WorkerRole::Moderator, excluding, blocked_by))
        .min_by_key(|c| (loads.get(&c.id).copied().unwrap_or(0), c.created_at, c.id))
        .map(|c| c.id)
}
