use sea_orm::entity::prelude::*;
use sea_orm::prelude::StringLen;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of object a moderation assignment covers.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "PascalCase")]
pub enum ModeratedKind {
    #[sea_orm(string_value = "Competition")]
    Competition,
    #[sea_orm(string_value = "Report")]
    Report,
}

impl ModeratedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Competition => "Competition",
            Self::Report => "Report",
        }
    }
}

impl fmt::Display for ModeratedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "moderation_assignment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub object_kind: ModeratedKind,
    /// Opaque reference to the moderated object (e.g. a competition id).
    pub object_ref: i32,

    /// NULL when reassignment found no eligible replacement; such
    /// assignments await manual attention.
    pub moderator_id: Option<i32>,

    /// Set once by the moderation workflow; a resolved assignment is never
    /// mutated again. At most one unresolved assignment exists per
    /// (object_kind, object_ref); see `database::ensure_indexes`.
    pub resolved: bool,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
