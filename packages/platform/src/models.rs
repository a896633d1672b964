use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::PlatformError;

/// Scalar fields of a competition to be provisioned. Topics, judges and
/// perks travel separately because they resolve against collaborators.
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionDraft {
    pub title: String,
    pub tagline: String,
    pub short_description: String,
    pub long_description: String,
    pub task_summary: String,
    pub task_detail: String,
    pub task_sample: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub each_topic_max_point: i32,
    pub max_grouping: i32,
    /// Registration fee in minor currency units.
    pub reg_fee: i64,
    pub fee_id: Option<i32>,
    pub qualifier_id: Option<i32>,
    pub qualifying_rank: Option<i32>,
}

/// Validate a trimmed title (1-256 Unicode characters).
pub fn validate_title(title: &str) -> Result<(), PlatformError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 256 {
        return Err(PlatformError::validation(
            "title",
            "Title must be 1-256 characters",
        ));
    }
    Ok(())
}

/// Field-level validation of a draft. Fails fast with the first offending
/// field; nothing here touches storage.
pub fn validate_draft(draft: &CompetitionDraft) -> Result<(), PlatformError> {
    validate_title(&draft.title)?;
    if draft.end_at <= draft.start_at {
        return Err(PlatformError::validation(
            "start_at",
            "start_at must be before end_at",
        ));
    }
    if draft.each_topic_max_point < 1 {
        return Err(PlatformError::validation(
            "each_topic_max_point",
            "each_topic_max_point must be at least 1",
        ));
    }
    if draft.max_grouping < 1 {
        return Err(PlatformError::validation(
            "max_grouping",
            "max_grouping must be at least 1",
        ));
    }
    if draft.reg_fee < 0 {
        return Err(PlatformError::validation(
            "reg_fee",
            "reg_fee must not be negative",
        ));
    }
    match (draft.qualifier_id, draft.qualifying_rank) {
        (Some(_), Some(rank)) if rank < 1 => {
            return Err(PlatformError::validation(
                "qualifying_rank",
                "qualifying_rank must be at least 1",
            ));
        }
        (Some(_), None) => {
            return Err(PlatformError::validation(
                "qualifying_rank",
                "qualifying_rank is required when a qualifier is set",
            ));
        }
        (None, Some(_)) => {
            return Err(PlatformError::validation(
                "qualifier_id",
                "qualifying_rank requires a qualifier competition",
            ));
        }
        _ => {}
    }
    Ok(())
}
