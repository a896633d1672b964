use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Link from a competition to an externally managed topic. Only the id is
/// carried; topic content lives in the catalog collaborator.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition_topic")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub competition_id: i32,
    #[sea_orm(primary_key)]
    pub topic_id: i32,

    #[sea_orm(belongs_to, from = "competition_id", to = "id")]
    pub competition: HasOne<super::competition::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
