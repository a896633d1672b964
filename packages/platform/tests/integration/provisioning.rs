use crate::common::{
    StaticDirectory, StaticTopics, manager, moderator, perk_texts, profile, test_db, valid_draft,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use platform::PlatformError;
use platform::entity::{competition, competition_judge, competition_topic, perk};
use platform::provisioning::ProvisioningPipeline;

/// Directory with a manager (id 1) and two plain judges (ids 20, 21).
fn default_directory() -> StaticDirectory {
    StaticDirectory::new(vec![manager(1), profile(20), profile(21)])
}

async fn assert_no_rows_remain(db: &DatabaseConnection) {
    assert_eq!(competition::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(perk::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(
        competition_topic::Entity::find().count(db).await.unwrap(),
        0
    );
    assert_eq!(
        competition_judge::Entity::find().count(db).await.unwrap(),
        0
    );
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn non_manager_cannot_provision() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let err = pipeline
            .provision(
                &profile(2),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Unauthorized(_)));
        assert_no_rows_remain(&db).await;
    }

    #[tokio::test]
    async fn rejects_end_before_start_without_writing() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let mut draft = valid_draft("Winter Open");
        draft.end_at = draft.start_at;
        let err = pipeline
            .provision(&manager(1), draft, &[5], &[20], &perk_texts(&["Cash prize"]))
            .await
            .unwrap_err();

        match err {
            PlatformError::Validation { field, .. } => assert_eq!(field, "start_at"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_no_rows_remain(&db).await;
    }

    #[tokio::test]
    async fn rejects_all_blank_perks() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let err = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["", "   "]),
            )
            .await
            .unwrap_err();

        match err {
            PlatformError::Validation { field, .. } => assert_eq!(field, "perks"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_no_rows_remain(&db).await;
    }

    #[tokio::test]
    async fn rejects_unknown_qualifier() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let mut draft = valid_draft("Winter Open");
        draft.qualifier_id = Some(999);
        draft.qualifying_rank = Some(3);
        let err = pipeline
            .provision(&manager(1), draft, &[5], &[20], &perk_texts(&["Cash prize"]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::NotFound(_)));
        assert_no_rows_remain(&db).await;
    }
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn provisions_full_aggregate() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5, 6]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let model = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5, 6],
                &[20, 21],
                &perk_texts(&["Cash prize", "Certificate"]),
            )
            .await
            .unwrap();

        assert_eq!(model.title, "Winter Open");
        assert!(!model.result_declared);
        assert_eq!(model.creator_id, 1);

        let topic_links = competition_topic::Entity::find()
            .filter(competition_topic::Column::CompetitionId.eq(model.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(topic_links, 2);

        let judge_links = competition_judge::Entity::find()
            .filter(competition_judge::Column::CompetitionId.eq(model.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(judge_links, 2);

        let perks = perk::Entity::find()
            .filter(perk::Column::CompetitionId.eq(model.id))
            .order_by_asc(perk::Column::Rank)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(perks.len(), 2);
        assert_eq!((perks[0].label.as_str(), perks[0].rank), ("Cash prize", 1));
        assert_eq!((perks[1].label.as_str(), perks[1].rank), ("Certificate", 2));
    }

    #[tokio::test]
    async fn blank_perks_are_dropped_and_ranks_stay_contiguous() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let model = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["", "Cash prize", "Certificate", ""]),
            )
            .await
            .unwrap();

        let perks = perk::Entity::find()
            .filter(perk::Column::CompetitionId.eq(model.id))
            .order_by_asc(perk::Column::Rank)
            .all(&db)
            .await
            .unwrap();
        let rows: Vec<(&str, i32)> = perks.iter().map(|p| (p.label.as_str(), p.rank)).collect();
        assert_eq!(rows, vec![("Cash prize", 1), ("Certificate", 2)]);
    }

    #[tokio::test]
    async fn duplicate_perk_labels_are_ignored_not_errors() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let model = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize", "Cash prize", "Certificate"]),
            )
            .await
            .unwrap();

        let perks = perk::Entity::find()
            .filter(perk::Column::CompetitionId.eq(model.id))
            .order_by_asc(perk::Column::Rank)
            .all(&db)
            .await
            .unwrap();
        let labels: Vec<&str> = perks.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Cash prize", "Certificate"]);
    }

    #[tokio::test]
    async fn rejects_duplicate_title_case_insensitively_before_writing() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap();

        let err = pipeline
            .provision(
                &manager(1),
                valid_draft("WINTER open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Conflict(_)));
        assert_eq!(competition::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_topics_abort_and_compensate() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let err = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[98, 99],
                &[20],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap_err();

        match err {
            PlatformError::Validation { field, .. } => assert_eq!(field, "topic_ids"),
            other => panic!("expected validation error, got {other:?}"),
        }
        // The competition row created in step 1 must be gone again.
        assert_no_rows_remain(&db).await;
    }

    #[tokio::test]
    async fn judge_who_blocked_the_creator_is_never_attached() {
        let db = test_db().await;
        let mut blocked_judge = profile(20);
        blocked_judge.blocked.insert(1);
        let directory = StaticDirectory::new(vec![manager(1), blocked_judge, profile(21)]);
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let model = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20, 21],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap();

        let judges: Vec<i32> = competition_judge::Entity::find()
            .filter(competition_judge::Column::CompetitionId.eq(model.id))
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.profile_id)
            .collect();
        assert_eq!(judges, vec![21]);
    }

    #[tokio::test]
    async fn sole_blocked_judge_aborts_and_compensates() {
        let db = test_db().await;
        let mut blocked_judge = profile(20);
        blocked_judge.blocked.insert(1);
        let directory = StaticDirectory::new(vec![manager(1), blocked_judge]);
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let err = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap_err();

        match err {
            PlatformError::Validation { field, .. } => assert_eq!(field, "judge_ids"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_no_rows_remain(&db).await;
    }

    #[tokio::test]
    async fn suspended_judges_are_filtered_out() {
        let db = test_db().await;
        let mut suspended = profile(20);
        suspended.is_suspended = true;
        let directory = StaticDirectory::new(vec![manager(1), suspended, profile(21)]);
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let model = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20, 21],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap();

        let judges: Vec<i32> = competition_judge::Entity::find()
            .filter(competition_judge::Column::CompetitionId.eq(model.id))
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.profile_id)
            .collect();
        assert_eq!(judges, vec![21]);
    }

    #[tokio::test]
    async fn status_keys_follow_the_cache_contract() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let model = pipeline
            .provision(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap();

        let id = model.id;
        assert_eq!(
            model.result_status_key(),
            format!("competition:{id}:result_declaration")
        );
        assert_eq!(
            model.certificate_status_key(),
            format!("competition:{id}:certificates")
        );
        // Must match the key the worker writes under (ChannelProvisionJob::status_key).
        assert_eq!(
            model.channel_status_key(),
            format!("competition:{id}:channel")
        );
    }

    #[tokio::test]
    async fn qualifier_reference_is_persisted() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let qualifier = pipeline
            .provision(
                &manager(1),
                valid_draft("Qualifier Round"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
            )
            .await
            .unwrap();

        let mut draft = valid_draft("Grand Final");
        draft.qualifier_id = Some(qualifier.id);
        draft.qualifying_rank = Some(10);
        let final_round = pipeline
            .provision(&manager(1), draft, &[5], &[20], &perk_texts(&["Trophy"]))
            .await
            .unwrap();

        assert_eq!(final_round.qualifier_id, Some(qualifier.id));
        assert_eq!(final_round.qualifying_rank, Some(10));
    }
}

mod moderator_attach {
    use super::*;
    use platform::entity::moderation_assignment::{self, ModeratedKind};

    #[tokio::test]
    async fn attaches_moderator_after_provisioning() {
        let db = test_db().await;
        let directory =
            StaticDirectory::new(vec![manager(1), profile(20), moderator(30), moderator(31)]);
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let (model, assignment) = pipeline
            .provision_with_moderator(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
                None,
            )
            .await
            .unwrap();

        assert_eq!(assignment.object_kind, ModeratedKind::Competition);
        assert_eq!(assignment.object_ref, model.id);
        // Equal loads: the earliest-created moderator wins.
        assert_eq!(assignment.moderator_id, Some(30));
        assert!(!assignment.resolved);
    }

    #[tokio::test]
    async fn ineligible_explicit_moderator_fails_but_keeps_competition() {
        let db = test_db().await;
        let directory = StaticDirectory::new(vec![manager(1), profile(20), moderator(30)]);
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        // Profile 20 exists but holds no moderator flag.
        let err = pipeline
            .provision_with_moderator(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
                Some(20),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::InvalidModerator(_)));
        // The committed aggregate stays; only the attach failed.
        assert_eq!(competition::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(
            moderation_assignment::Entity::find()
                .count(&db)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn no_eligible_moderator_fails_but_keeps_competition() {
        let db = test_db().await;
        let directory = default_directory();
        let topics = StaticTopics::of(&[5]);
        let pipeline = ProvisioningPipeline::new(&db, &directory, &topics);

        let err = pipeline
            .provision_with_moderator(
                &manager(1),
                valid_draft("Winter Open"),
                &[5],
                &[20],
                &perk_texts(&["Cash prize"]),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::NoEligibleModerator));
        assert_eq!(competition::Entity::find().count(&db).await.unwrap(), 1);
    }
}
