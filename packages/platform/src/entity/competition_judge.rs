use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Link from a competition to a judging profile. Profiles are externally
/// managed; eligibility is checked at attach time, not here.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition_judge")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub competition_id: i32,
    #[sea_orm(primary_key)]
    pub profile_id: i32,

    #[sea_orm(belongs_to, from = "competition_id", to = "id")]
    pub competition: HasOne<super::competition::Entity>,

    pub attached_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
