use std::collections::HashSet;

use crate::directory::ProfileSnapshot;

/// Role a candidate is being considered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerRole {
    /// Requires the `is_moderator` flag.
    Moderator,
    /// No role flag beyond an account in good standing.
    Judge,
}

/// Decide whether `candidate` may take on work in `role`.
///
/// Pure predicate over snapshots supplied by the caller. It is re-evaluated
/// at every call site because eligibility can change between the
/// provisioning decision and the moderation decision.
///
/// `excluding` skips candidates the caller already ruled out (a moderator
/// being replaced, reviewers already assigned). `blocked_by` rejects
/// candidates who have blocked that profile (directional check).
pub fn is_eligible_worker(
    candidate: &ProfileSnapshot,
    role: WorkerRole,
    excluding: &HashSet<i32>,
    blocked_by: Option<i32>,
) -> bool {
    if role == WorkerRole::Moderator && !candidate.is_moderator {
        return false;
    }
    if !candidate.is_active || candidate.is_suspended || candidate.pending_deactivation {
        return false;
    }
    if excluding.contains(&candidate.id) {
        return false;
    }
    if let Some(profile) = blocked_by
        && candidate.has_blocked(profile)
    {
        return false;
    }
    true
}
