// Medicine repository implementation

use super::queries::medicine_queries::SELECT_ALL_COLUMNS;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::Medicine;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

/// Repository for medicine inventory operations
pub struct MedicineRepository {
    pool: DbPool,
}

impl MedicineRepository {
    /// Create a new MedicineRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new medicine
    #[instrument(skip(self, medicine), fields(medicine_id = %medicine.id))]
    pub async fn create(&self, medicine: &Medicine) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO medicines (
                id, name, expiry_date, quantity, batch_number,
                notified, last_notification_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(medicine.id)
        .bind(&medicine.name)
        .bind(medicine.expiry_date)
        .bind(medicine.quantity)
        .bind(&medicine.batch_number)
        .bind(medicine.notified)
        .bind(medicine.last_notification_date)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(
            medicine_id = %medicine.id,
            name = %medicine.name,
            expiry_date = %medicine.expiry_date,
            "Medicine created"
        );
        Ok(())
    }

    /// Find a medicine by ID
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Medicine>, DatabaseError> {
        let query = format!("SELECT {} FROM medicines WHERE id = $1", SELECT_ALL_COLUMNS);

        let medicine = sqlx::query_as::<_, Medicine>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(medicine)
    }

    /// All medicines, soonest expiry first
    #[instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<Medicine>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM medicines ORDER BY expiry_date ASC, created_at ASC",
            SELECT_ALL_COLUMNS
        );

        let medicines = sqlx::query_as::<_, Medicine>(&query)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(medicines)
    }

    /// Not yet notified medicines whose expiry falls in `[start, end]`
    #[instrument(skip(self))]
    pub async fn find_unnotified_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Medicine>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM medicines
            WHERE notified = false
              AND expiry_date >= $1
              AND expiry_date <= $2
            ORDER BY expiry_date ASC
            "#,
            SELECT_ALL_COLUMNS
        );

        let medicines = sqlx::query_as::<_, Medicine>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(medicines)
    }

    /// Not yet notified medicines expiring on or before `until`, already expired included
    #[instrument(skip(self))]
    pub async fn find_unnotified_expiring_before(
        &self,
        until: DateTime<Utc>,
    ) -> Result<Vec<Medicine>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM medicines
            WHERE notified = false
              AND expiry_date <= $1
            ORDER BY expiry_date ASC
            "#,
            SELECT_ALL_COLUMNS
        );

        let medicines = sqlx::query_as::<_, Medicine>(&query)
            .bind(until)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(medicines)
    }

    /// Flip the one-shot `notified` flag and stamp the notification time
    #[instrument(skip(self))]
    pub async fn mark_notified(
        &self,
        id: Uuid,
        notified_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET notified = true,
                last_notification_date = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(notified_at)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Medicine not found: {}", id)));
        }

        tracing::debug!(medicine_id = %id, "Medicine marked as notified");
        Ok(())
    }

    /// Delete a medicine; its notification logs go with it (ON DELETE CASCADE)
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM medicines WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Medicine not found: {}", id)));
        }

        tracing::info!(medicine_id = %id, "Medicine deleted");
        Ok(())
    }
}
