// PostgreSQL-backed NotificationStore

use super::NotificationStore;
use crate::db::repositories::{MedicineRepository, NotificationLogRepository, SettingsRepository};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Medicine, NotificationLog, NotificationSettings};
use crate::schedule::ExpiryWindow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Adapts the repositories to the reminder pipeline
pub struct PgNotificationStore {
    medicines: MedicineRepository,
    settings: SettingsRepository,
    logs: NotificationLogRepository,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            medicines: MedicineRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool.clone()),
            logs: NotificationLogRepository::new(pool),
        }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn load_settings(&self) -> Result<NotificationSettings, DatabaseError> {
        self.settings.get_or_default().await
    }

    async fn find_unnotified(&self, window: &ExpiryWindow) -> Result<Vec<Medicine>, DatabaseError> {
        self.medicines
            .find_unnotified_between(window.start, window.end)
            .await
    }

    async fn append_log(&self, log: &NotificationLog) -> Result<(), DatabaseError> {
        self.logs.append(log).await
    }

    async fn mark_notified(
        &self,
        medicine_id: Uuid,
        notified_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.medicines.mark_notified(medicine_id, notified_at).await
    }
}
