use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("platform::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support partial or expression indexes, so
/// we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    const INDEXES: &[(&str, &str)] = &[
        // At most one unresolved assignment per moderated object; the
        // assignment engine's insert relies on this racing correctly.
        (
            "idx_assignment_open",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_assignment_open \
             ON moderation_assignment (object_kind, object_ref) WHERE resolved = FALSE",
        ),
        // Perk labels are unique per competition; the pipeline's bulk
        // insert targets this index with ON CONFLICT DO NOTHING.
        (
            "idx_perk_competition_label",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_perk_competition_label \
             ON perk (competition_id, label)",
        ),
        // Case-insensitive title uniqueness behind the pipeline's
        // duplicate-title precondition.
        (
            "idx_competition_title_lower",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_competition_title_lower \
             ON competition (LOWER(title))",
        ),
    ];

    for (name, stmt) in INDEXES {
        match db.execute_unprepared(stmt).await {
            Ok(_) => {
                info!("Ensured index {} exists", name);
            }
            Err(e) => {
                warn!("Failed to create index {}: {}", name, e);
            }
        }
    }

    Ok(())
}
