use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub title: String,
    pub tagline: String,
    pub short_description: String,
    pub long_description: String, // in Markdown
    pub task_summary: String,
    pub task_detail: String,
    pub task_sample: String,

    pub start_at: DateTimeUtc,
    pub end_at: DateTimeUtc,

    pub each_topic_max_point: i32,
    pub max_grouping: i32,
    /// Registration fee in minor currency units.
    pub reg_fee: i64,
    /// Externally managed fee record, if registration is paid.
    pub fee_id: Option<i32>,

    /// Competition one must place in to enter this one.
    pub qualifier_id: Option<i32>,
    /// Rank required in the qualifier. Set iff `qualifier_id` is.
    pub qualifying_rank: Option<i32>,

    pub result_declared: bool,

    /// Owning profile (externally managed). The competition belongs to its
    /// creator until explicitly deleted.
    pub creator_id: i32,

    #[sea_orm(has_many)]
    pub perks: HasMany<super::perk::Entity>,

    #[sea_orm(has_many)]
    pub topic_links: HasMany<super::competition_topic::Entity>,

    #[sea_orm(has_many)]
    pub judge_links: HasMany<super::competition_judge::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Status-cache key for the asynchronous result-declaration job.
    pub fn result_status_key(&self) -> String {
        format!("competition:{}:result_declaration", self.id)
    }

    /// Status-cache key for the asynchronous certificate-generation job.
    pub fn certificate_status_key(&self) -> String {
        format!("competition:{}:certificates", self.id)
    }

    /// Status-cache key for the deferred channel-provisioning job.
    pub fn channel_status_key(&self) -> String {
        format!("competition:{}:channel", self.id)
    }
}
