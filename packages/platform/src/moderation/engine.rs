use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use tracing::{debug, info, instrument, warn};

use crate::directory::ProfileDirectory;
use crate::eligibility::{WorkerRole, is_eligible_worker};
use crate::entity::moderation_assignment::{self, ModeratedKind};
use crate::entity::competition;
use crate::error::PlatformError;

use super::policy::select_moderator;

/// Owns moderation-assignment records: attaches moderation work to an
/// eligible moderator and redistributes the open work of a departing one.
pub struct AssignmentEngine<'a, C: ConnectionTrait> {
    conn: &'a C,
    profiles: &'a dyn ProfileDirectory,
}

impl<'a, C: ConnectionTrait> AssignmentEngine<'a, C> {
    pub fn new(conn: &'a C, profiles: &'a dyn ProfileDirectory) -> Self {
        Self { conn, profiles }
    }

    /// Attach a moderator to the given object.
    ///
    /// Idempotent: an unresolved assignment already covering the object is
    /// returned unchanged. With `explicit` the candidate is validated
    /// through the eligibility filter; otherwise the least-loaded eligible
    /// moderator is selected. The object's owning profile (when the
    /// platform stores one) feeds the directional block check.
    #[instrument(skip(self), fields(kind = %kind, object_ref))]
    pub async fn assign(
        &self,
        kind: ModeratedKind,
        object_ref: i32,
        explicit: Option<i32>,
    ) -> Result<moderation_assignment::Model, PlatformError> {
        if let Some(existing) = self.find_unresolved(kind, object_ref).await? {
            debug!(
                assignment_id = existing.id,
                "Unresolved assignment already exists"
            );
            return Ok(existing);
        }

        let owner = self.object_owner(kind, object_ref).await?;

        let moderator_id = match explicit {
            Some(candidate_id) => {
                let snapshot = self
                    .profiles
                    .find_by_ids(&[candidate_id])
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        PlatformError::InvalidModerator(format!(
                            "Profile {candidate_id} not found"
                        ))
                    })?;
                if !is_eligible_worker(&snapshot, WorkerRole::Moderator, &HashSet::new(), owner) {
                    return Err(PlatformError::InvalidModerator(format!(
                        "Profile {candidate_id} cannot moderate this object"
                    )));
                }
                candidate_id
            }
            None => {
                let candidates = self.profiles.moderators().await?;
                let loads = self.unresolved_loads().await?;
                select_moderator(&candidates, &loads, &HashSet::new(), owner)
                    .ok_or(PlatformError::NoEligibleModerator)?
            }
        };

        self.insert_assignment(kind, object_ref, moderator_id).await
    }

    /// Redistribute every unresolved assignment held by `departing`.
    ///
    /// Assignments keep their identity and object reference; only the
    /// moderator link moves. When no eligible replacement exists the
    /// moderator link is cleared (a valid terminal state pending
    /// availability), never handed back to `departing`. Returns all
    /// processed assignments so the caller can report outcomes.
    #[instrument(skip(self))]
    pub async fn reassign_all_for(
        &self,
        departing: i32,
    ) -> Result<Vec<moderation_assignment::Model>, PlatformError> {
        let open = moderation_assignment::Entity::find()
            .filter(moderation_assignment::Column::ModeratorId.eq(departing))
            .filter(moderation_assignment::Column::Resolved.eq(false))
            .order_by_asc(moderation_assignment::Column::Id)
            .all(self.conn)
            .await?;

        if open.is_empty() {
            debug!("No unresolved assignments to redistribute");
            return Ok(Vec::new());
        }

        let candidates = self.profiles.moderators().await?;
        let mut loads = self.unresolved_loads().await?;
        let excluding = HashSet::from([departing]);

        let mut processed = Vec::with_capacity(open.len());
        for assignment in open {
            let owner = self
                .object_owner(assignment.object_kind, assignment.object_ref)
                .await?;
            let replacement = select_moderator(&candidates, &loads, &excluding, owner);

            let assignment_id = assignment.id;
            let mut active: moderation_assignment::ActiveModel = assignment.into();
            active.moderator_id = Set(replacement);
            active.updated_at = Set(Utc::now());
            let updated = active.update(self.conn).await?;

            match replacement {
                Some(moderator_id) => {
                    *loads.entry(moderator_id).or_insert(0) += 1;
                    info!(assignment_id, moderator_id, "Assignment rebound");
                }
                None => {
                    warn!(
                        assignment_id,
                        "No eligible replacement; assignment left unassigned"
                    );
                }
            }
            processed.push(updated);
        }

        Ok(processed)
    }

    /// The unresolved assignment covering `(kind, object_ref)`, if any.
    async fn find_unresolved(
        &self,
        kind: ModeratedKind,
        object_ref: i32,
    ) -> Result<Option<moderation_assignment::Model>, DbErr> {
        moderation_assignment::Entity::find()
            .filter(moderation_assignment::Column::ObjectKind.eq(kind))
            .filter(moderation_assignment::Column::ObjectRef.eq(object_ref))
            .filter(moderation_assignment::Column::Resolved.eq(false))
            .one(self.conn)
            .await
    }

    /// Unresolved assignment counts per moderator.
    async fn unresolved_loads(&self) -> Result<HashMap<i32, i64>, DbErr> {
        let rows: Vec<(Option<i32>, i64)> = moderation_assignment::Entity::find()
            .select_only()
            .column(moderation_assignment::Column::ModeratorId)
            .column_as(moderation_assignment::Column::Id.count(), "load")
            .filter(moderation_assignment::Column::Resolved.eq(false))
            .filter(moderation_assignment::Column::ModeratorId.is_not_null())
            .group_by(moderation_assignment::Column::ModeratorId)
            .into_tuple()
            .all(self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(moderator_id, load)| moderator_id.map(|id| (id, load)))
            .collect())
    }

    /// Owning profile of the moderated object, for the block check. Kinds
    /// whose owner the platform does not store resolve to None.
    async fn object_owner(
        &self,
        kind: ModeratedKind,
        object_ref: i32,
    ) -> Result<Option<i32>, DbErr> {
        match kind {
            ModeratedKind::Competition => Ok(competition::Entity::find_by_id(object_ref)
                .one(self.conn)
                .await?
                .map(|c| c.creator_id)),
            ModeratedKind::Report => Ok(None),
        }
    }

    /// Insert a new unresolved assignment, re-checking for a concurrent
    /// attach immediately before the write. A unique-violation race on the
    /// partial index resolves to the row the other writer created.
    async fn insert_assignment(
        &self,
        kind: ModeratedKind,
        object_ref: i32,
        moderator_id: i32,
    ) -> Result<moderation_assignment::Model, PlatformError> {
        if let Some(existing) = self.find_unresolved(kind, object_ref).await? {
            debug!(
                assignment_id = existing.id,
                "Concurrent attach won; returning existing assignment"
            );
            return Ok(existing);
        }

        let now = Utc::now();
        let model = moderation_assignment::ActiveModel {
            object_kind: Set(kind),
            object_ref: Set(object_ref),
            moderator_id: Set(Some(moderator_id)),
            resolved: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(self.conn).await {
            Ok(inserted) => {
                info!(
                    assignment_id = inserted.id,
                    moderator_id, "Moderator assigned"
                );
                Ok(inserted)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => self
                .find_unresolved(kind, object_ref)
                .await?
                .ok_or_else(|| {
                    PlatformError::Database(DbErr::Custom(
                        "UniqueConstraintViolation but existing unresolved assignment not found"
                            .to_string(),
                    ))
                }),
            Err(e) => Err(e.into()),
        }
    }
}
