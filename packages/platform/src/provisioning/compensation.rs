use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use tracing::error;

use crate::entity::{competition, competition_judge, competition_topic, perk};

/// A single undo step recorded while the pipeline writes its aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoAction {
    DeletePerks(i32),
    DeleteJudgeLinks(i32),
    DeleteTopicLinks(i32),
    DeleteCompetition(i32),
}

/// Undo list for a multi-step creation. The underlying store gives no
/// multi-table transaction across all four relations, so each successful
/// step pushes its inverse here and an abort replays them newest-first.
#[derive(Debug, Default)]
pub struct Compensation {
    actions: Vec<UndoAction>,
}

impl Compensation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    /// Run all recorded undo actions in reverse order.
    ///
    /// Best-effort: a failing action is logged loudly and the remaining
    /// actions still run, since a skipped delete leaves an orphaned partial
    /// aggregate for operators to clean up.
    pub async fn run<C: ConnectionTrait>(self, conn: &C) {
        for action in self.actions.into_iter().rev() {
            if let Err(e) = Self::apply(conn, action).await {
                error!(
                    ?action,
                    error = %e,
                    "Compensating delete failed; orphaned rows remain"
                );
            }
        }
    }

    async fn apply<C: ConnectionTrait>(conn: &C, action: UndoAction) -> Result<(), DbErr> {
        match action {
            UndoAction::DeletePerks(competition_id) => {
                perk::Entity::delete_many()
                    .filter(perk::Column::CompetitionId.eq(competition_id))
                    .exec(conn)
                    .await?;
            }
            UndoAction::DeleteJudgeLinks(competition_id) => {
                competition_judge::Entity::delete_many()
                    .filter(competition_judge::Column::CompetitionId.eq(competition_id))
                    .exec(conn)
                    .await?;
            }
            UndoAction::DeleteTopicLinks(competition_id) => {
                competition_topic::Entity::delete_many()
                    .filter(competition_topic::Column::CompetitionId.eq(competition_id))
                    .exec(conn)
                    .await?;
            }
            UndoAction::DeleteCompetition(competition_id) => {
                competition::Entity::delete_by_id(competition_id)
                    .exec(conn)
                    .await?;
            }
        }
        Ok(())
    }
}
