// Notification log repository implementation

use super::queries::notification_log_queries::SELECT_ALL_COLUMNS;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{NotificationHistoryEntry, NotificationLog};
use tracing::instrument;
use uuid::Uuid;

/// Number of entries the history view returns
pub const HISTORY_LIMIT: i64 = 50;

/// Repository for the append-only delivery log
pub struct NotificationLogRepository {
    pool: DbPool,
}

impl NotificationLogRepository {
    /// Create a new NotificationLogRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append one delivery attempt
    #[instrument(skip(self, log), fields(medicine_id = %log.medicine_id, channel = %log.channel, status = %log.status))]
    pub async fn append(&self, log: &NotificationLog) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO notification_logs (
                id, medicine_id, category, channel, status, message, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(log.medicine_id)
        .bind(log.category.to_string())
        .bind(log.channel.to_string())
        .bind(log.status.to_string())
        .bind(&log.message)
        .bind(log.sent_at)
        .execute(self.pool.pool())
        .await?;

        tracing::debug!(log_id = %log.id, "Notification log appended");
        Ok(())
    }

    /// Most recent entries, newest first, with the medicine's name
    #[instrument(skip(self))]
    pub async fn recent_history(
        &self,
        limit: i64,
    ) -> Result<Vec<NotificationHistoryEntry>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}, m.name AS medicine_name
            FROM notification_logs l
            INNER JOIN medicines m ON m.id = l.medicine_id
            ORDER BY l.sent_at DESC
            LIMIT $1
            "#,
            SELECT_ALL_COLUMNS
        );

        let entries = sqlx::query_as::<_, NotificationHistoryEntry>(&query)
            .bind(limit)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(entries)
    }

    /// All entries of one medicine, oldest first
    #[instrument(skip(self))]
    pub async fn find_by_medicine(
        &self,
        medicine_id: Uuid,
    ) -> Result<Vec<NotificationLog>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM notification_logs l
            WHERE l.medicine_id = $1
            ORDER BY l.sent_at ASC
            "#,
            SELECT_ALL_COLUMNS
        );

        let logs = sqlx::query_as::<_, NotificationLog>(&query)
            .bind(medicine_id)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(logs)
    }
}
