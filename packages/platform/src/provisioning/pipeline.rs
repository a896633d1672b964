use std::collections::HashSet;

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, Func, OnConflict};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use tracing::{debug, error, info, instrument, warn};

use common::channel_job::ChannelProvisionJob;
use common::mq::Message;
use common::task::Task;
use mq::Mq;

use crate::directory::{ProfileDirectory, ProfileSnapshot, TopicCatalog};
use crate::eligibility::{WorkerRole, is_eligible_worker};
use crate::entity::moderation_assignment::{self, ModeratedKind};
use crate::entity::{competition, competition_judge, competition_topic, perk};
use crate::error::PlatformError;
use crate::models::{CompetitionDraft, validate_draft};
use crate::moderation::AssignmentEngine;

use super::compensation::{Compensation, UndoAction};

/// Build ranked perk rows from raw texts: blanks dropped, labels trimmed,
/// ranks contiguous 1..N in input order.
pub fn ranked_perks(texts: &[String]) -> Vec<(String, i32)> {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(i, t)| (t.to_string(), i as i32 + 1))
        .collect()
}

/// Orchestrates creation of a competition aggregate (row + topics + judges
/// + perks) under an all-or-nothing guarantee, then enqueues the deferred
/// channel-provisioning task once the aggregate is durable.
pub struct ProvisioningPipeline<'a, C: ConnectionTrait> {
    conn: &'a C,
    profiles: &'a dyn ProfileDirectory,
    topics: &'a dyn TopicCatalog,
    mq: Option<&'a Mq>,
    queue_name: &'a str,
}

impl<'a, C: ConnectionTrait> ProvisioningPipeline<'a, C> {
    pub fn new(
        conn: &'a C,
        profiles: &'a dyn ProfileDirectory,
        topics: &'a dyn TopicCatalog,
    ) -> Self {
        Self {
            conn,
            profiles,
            topics,
            mq: None,
            queue_name: "deferred_tasks",
        }
    }

    /// Attach the deferred-task queue. Without it the pipeline still
    /// provisions; the side task is simply skipped.
    pub fn with_queue(mut self, mq: &'a Mq, queue_name: &'a str) -> Self {
        self.mq = Some(mq);
        self.queue_name = queue_name;
        self
    }

    /// Create the full competition aggregate.
    ///
    /// Validation failures before the first write return immediately; a
    /// failure after it (business rule or storage fault) replays the undo
    /// list so no trace of the attempt remains. Callers only ever observe a
    /// fully valid competition or no competition at all.
    #[instrument(
        skip(self, creator, draft, topic_ids, judge_ids, perk_texts),
        fields(title = %draft.title, creator_id = creator.id)
    )]
    pub async fn provision(
        &self,
        creator: &ProfileSnapshot,
        draft: CompetitionDraft,
        topic_ids: &[i32],
        judge_ids: &[i32],
        perk_texts: &[String],
    ) -> Result<competition::Model, PlatformError> {
        if !creator.is_manager {
            return Err(PlatformError::Unauthorized(
                "manager role required to provision competitions".into(),
            ));
        }
        validate_draft(&draft)?;
        if ranked_perks(perk_texts).is_empty() {
            return Err(PlatformError::validation(
                "perks",
                "at least one non-blank perk is required",
            ));
        }
        self.reject_duplicate_title(&draft.title).await?;
        if let Some(qualifier_id) = draft.qualifier_id {
            competition::Entity::find_by_id(qualifier_id)
                .one(self.conn)
                .await?
                .ok_or_else(|| {
                    PlatformError::NotFound(format!("Qualifier competition {qualifier_id}"))
                })?;
        }

        let mut undo = Compensation::new();
        match self
            .create_aggregate(creator, draft, topic_ids, judge_ids, perk_texts, &mut undo)
            .await
        {
            Ok((model, attached_judges)) => {
                self.enqueue_channel_provision(&model, attached_judges).await;
                info!(competition_id = model.id, "Competition provisioned");
                Ok(model)
            }
            Err(e) => {
                undo.run(self.conn).await;
                Err(e)
            }
        }
    }

    /// Provision and then bind a moderator through the assignment engine.
    ///
    /// A moderator-selection failure here is surfaced as-is and does NOT
    /// delete the already-committed competition; the caller decides how to
    /// recover (typically by re-prompting for a moderator).
    pub async fn provision_with_moderator(
        &self,
        creator: &ProfileSnapshot,
        draft: CompetitionDraft,
        topic_ids: &[i32],
        judge_ids: &[i32],
        perk_texts: &[String],
        moderator: Option<i32>,
    ) -> Result<(competition::Model, moderation_assignment::Model), PlatformError> {
        let model = self
            .provision(creator, draft, topic_ids, judge_ids, perk_texts)
            .await?;

        let engine = AssignmentEngine::new(self.conn, self.profiles);
        let assignment = engine
            .assign(ModeratedKind::Competition, model.id, moderator)
            .await?;

        Ok((model, assignment))
    }

    /// Steps 1-4 of the creation sequence. Pushes an undo action after each
    /// successful write so the caller can compensate on any later failure.
    async fn create_aggregate(
        &self,
        creator: &ProfileSnapshot,
        draft: CompetitionDraft,
        topic_ids: &[i32],
        judge_ids: &[i32],
        perk_texts: &[String],
        undo: &mut Compensation,
    ) -> Result<(competition::Model, Vec<i32>), PlatformError> {
        let now = Utc::now();
        let model = competition::ActiveModel {
            title: Set(draft.title.trim().to_string()),
            tagline: Set(draft.tagline),
            short_description: Set(draft.short_description),
            long_description: Set(draft.long_description),
            task_summary: Set(draft.task_summary),
            task_detail: Set(draft.task_detail),
            task_sample: Set(draft.task_sample),
            start_at: Set(draft.start_at),
            end_at: Set(draft.end_at),
            each_topic_max_point: Set(draft.each_topic_max_point),
            max_grouping: Set(draft.max_grouping),
            reg_fee: Set(draft.reg_fee),
            fee_id: Set(draft.fee_id),
            qualifier_id: Set(draft.qualifier_id),
            qualifying_rank: Set(draft.qualifying_rank),
            result_declared: Set(false),
            creator_id: Set(creator.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;
        undo.push(UndoAction::DeleteCompetition(model.id));

        self.attach_topics(model.id, topic_ids, undo).await?;
        let attached_judges = self.attach_judges(&model, creator, judge_ids, undo).await?;
        self.insert_perks(model.id, perk_texts, undo).await?;

        Ok((model, attached_judges))
    }

    /// Step 2: resolve topics against the catalog and link the survivors.
    async fn attach_topics(
        &self,
        competition_id: i32,
        topic_ids: &[i32],
        undo: &mut Compensation,
    ) -> Result<(), PlatformError> {
        let resolved = self.topics.existing(topic_ids).await?;
        let mut seen = HashSet::new();
        let rows: Vec<competition_topic::ActiveModel> = resolved
            .into_iter()
            .filter(|id| seen.insert(*id))
            .map(|topic_id| competition_topic::ActiveModel {
                competition_id: Set(competition_id),
                topic_id: Set(topic_id),
            })
            .collect();

        if rows.is_empty() {
            return Err(PlatformError::validation(
                "topic_ids",
                "at least one existing topic is required",
            ));
        }

        competition_topic::Entity::insert_many(rows)
            .exec_without_returning(self.conn)
            .await?;
        undo.push(UndoAction::DeleteTopicLinks(competition_id));
        Ok(())
    }

    /// Step 3: resolve judges through the directory, keep the ones passing
    /// the eligibility filter (judges who blocked the creator are out), and
    /// link them. Returns the attached profile ids.
    async fn attach_judges(
        &self,
        model: &competition::Model,
        creator: &ProfileSnapshot,
        judge_ids: &[i32],
        undo: &mut Compensation,
    ) -> Result<Vec<i32>, PlatformError> {
        let snapshots = self.profiles.find_by_ids(judge_ids).await?;
        let excluding = HashSet::new();
        let mut seen = HashSet::new();
        let attached: Vec<i32> = snapshots
            .iter()
            .filter(|s| is_eligible_worker(s, WorkerRole::Judge, &excluding, Some(creator.id)))
            .map(|s| s.id)
            .filter(|id| seen.insert(*id))
            .collect();

        if attached.is_empty() {
            return Err(PlatformError::validation(
                "judge_ids",
                "at least one eligible judge is required",
            ));
        }

        let now = Utc::now();
        let rows: Vec<competition_judge::ActiveModel> = attached
            .iter()
            .map(|&profile_id| competition_judge::ActiveModel {
                competition_id: Set(model.id),
                profile_id: Set(profile_id),
                attached_at: Set(now),
            })
            .collect();

        competition_judge::Entity::insert_many(rows)
            .exec_without_returning(self.conn)
            .await?;
        undo.push(UndoAction::DeleteJudgeLinks(model.id));
        Ok(attached)
    }

    /// Step 4: bulk-insert ranked perks, ignoring duplicate-label conflicts.
    async fn insert_perks(
        &self,
        competition_id: i32,
        perk_texts: &[String],
        undo: &mut Compensation,
    ) -> Result<(), PlatformError> {
        let rows: Vec<perk::ActiveModel> = ranked_perks(perk_texts)
            .into_iter()
            .map(|(label, rank)| perk::ActiveModel {
                competition_id: Set(competition_id),
                label: Set(label),
                rank: Set(rank),
                ..Default::default()
            })
            .collect();

        let inserted = match perk::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([perk::Column::CompetitionId, perk::Column::Label])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await
        {
            Ok(count) => count,
            Err(DbErr::RecordNotInserted) => 0,
            Err(e) => return Err(e.into()),
        };

        if inserted == 0 {
            return Err(PlatformError::validation(
                "perks",
                "no perks could be inserted",
            ));
        }
        undo.push(UndoAction::DeletePerks(competition_id));
        Ok(())
    }

    /// Case-insensitive duplicate-title precondition, checked before any
    /// row is created.
    async fn reject_duplicate_title(&self, title: &str) -> Result<(), PlatformError> {
        let title = title.trim();
        let existing = competition::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(competition::Column::Title)))
                    .eq(title.to_lowercase()),
            )
            .one(self.conn)
            .await?;
        if existing.is_some() {
            return Err(PlatformError::Conflict(format!(
                "A competition titled '{title}' already exists"
            )));
        }
        Ok(())
    }

    /// Step 6: fire-and-forget dispatch of the channel-provisioning task.
    /// Runs only after the aggregate is durable; a publish failure is
    /// logged and never rolls anything back (redelivery belongs to the
    /// queue, not this pipeline).
    #[instrument(skip(self, model, judge_ids), fields(competition_id = model.id))]
    async fn enqueue_channel_provision(&self, model: &competition::Model, judge_ids: Vec<i32>) {
        let Some(mq) = self.mq else {
            debug!("MQ unavailable, skipping channel provisioning enqueue");
            return;
        };

        let job =
            ChannelProvisionJob::new(model.id, model.title.clone(), model.creator_id, judge_ids);
        let job_id = job.job_id.clone();

        let task = Task {
            id: job.job_id.clone(),
            task_type: ChannelProvisionJob::message_type().into(),
            executor_name: "native".into(),
            payload: match serde_json::to_value(&job) {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "Failed to serialize ChannelProvisionJob");
                    return;
                }
            },
        };

        match mq.publish(self.queue_name, None, &task, None).await {
            Ok(_) => {
                info!(job_id = %job_id, "Channel provisioning enqueued");
            }
            Err(e) => {
                warn!(error = %e, "Failed to enqueue channel provisioning");
            }
        }
    }
}
