// Notification settings repository implementation

use super::queries::settings_queries::SELECT_ALL_COLUMNS;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{NotificationSettings, PushKeys, PushSubscription, SETTINGS_ID};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

/// Flat row shape; the push subscription is spread over three nullable columns
#[derive(Debug, FromRow)]
struct SettingsRow {
    email: Option<String>,
    enable_email_notifications: bool,
    enable_push_notifications: bool,
    enable_daily_notifications: bool,
    enable_weekly_notifications: bool,
    enable_monthly_notifications: bool,
    notification_time: String,
    push_endpoint: Option<String>,
    push_p256dh: Option<String>,
    push_auth: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for NotificationSettings {
    fn from(row: SettingsRow) -> Self {
        let push_subscription = match (row.push_endpoint, row.push_p256dh, row.push_auth) {
            (Some(endpoint), Some(p256dh), Some(auth)) => Some(PushSubscription {
                endpoint,
                keys: PushKeys { p256dh, auth },
            }),
            _ => None,
        };

        Self {
            email: row.email,
            enable_email_notifications: row.enable_email_notifications,
            enable_push_notifications: row.enable_push_notifications,
            enable_daily_notifications: row.enable_daily_notifications,
            enable_weekly_notifications: row.enable_weekly_notifications,
            enable_monthly_notifications: row.enable_monthly_notifications,
            notification_time: row.notification_time,
            push_subscription,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for the singleton notification settings row
pub struct SettingsRepository {
    pool: DbPool,
}

impl SettingsRepository {
    /// Create a new SettingsRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load the settings, creating the default row on first access
    #[instrument(skip(self))]
    pub async fn get_or_default(&self) -> Result<NotificationSettings, DatabaseError> {
        sqlx::query("INSERT INTO notification_settings (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(SETTINGS_ID)
            .execute(self.pool.pool())
            .await?;

        let query = format!(
            "SELECT {} FROM notification_settings WHERE id = $1",
            SELECT_ALL_COLUMNS
        );
        let row = sqlx::query_as::<_, SettingsRow>(&query)
            .bind(SETTINGS_ID)
            .fetch_one(self.pool.pool())
            .await?;

        Ok(row.into())
    }

    /// Write every field of `settings` to the singleton row
    #[instrument(skip(self, settings))]
    pub async fn upsert(
        &self,
        settings: &NotificationSettings,
    ) -> Result<NotificationSettings, DatabaseError> {
        let (endpoint, p256dh, auth) = match &settings.push_subscription {
            Some(sub) => (
                Some(sub.endpoint.as_str()),
                Some(sub.keys.p256dh.as_str()),
                Some(sub.keys.auth.as_str()),
            ),
            None => (None, None, None),
        };

        let query = format!(
            r#"
            INSERT INTO notification_settings (
                id, email, enable_email_notifications, enable_push_notifications,
                enable_daily_notifications, enable_weekly_notifications,
                enable_monthly_notifications, notification_time,
                push_endpoint, push_p256dh, push_auth, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                enable_email_notifications = EXCLUDED.enable_email_notifications,
                enable_push_notifications = EXCLUDED.enable_push_notifications,
                enable_daily_notifications = EXCLUDED.enable_daily_notifications,
                enable_weekly_notifications = EXCLUDED.enable_weekly_notifications,
                enable_monthly_notifications = EXCLUDED.enable_monthly_notifications,
                notification_time = EXCLUDED.notification_time,
                push_endpoint = EXCLUDED.push_endpoint,
                push_p256dh = EXCLUDED.push_p256dh,
                push_auth = EXCLUDED.push_auth,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_ALL_COLUMNS
        );

        let row = sqlx::query_as::<_, SettingsRow>(&query)
            .bind(SETTINGS_ID)
            .bind(&settings.email)
            .bind(settings.enable_email_notifications)
            .bind(settings.enable_push_notifications)
            .bind(settings.enable_daily_notifications)
            .bind(settings.enable_weekly_notifications)
            .bind(settings.enable_monthly_notifications)
            .bind(&settings.notification_time)
            .bind(endpoint)
            .bind(p256dh)
            .bind(auth)
            .fetch_one(self.pool.pool())
            .await?;

        tracing::info!(
            notification_time = %row.notification_time,
            email_enabled = row.enable_email_notifications,
            push_enabled = row.enable_push_notifications,
            "Notification settings updated"
        );
        Ok(row.into())
    }

    /// Store a browser push subscription verbatim and switch push on
    #[instrument(skip(self, subscription), fields(endpoint = %subscription.endpoint))]
    pub async fn save_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<NotificationSettings, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO notification_settings (
                id, push_endpoint, push_p256dh, push_auth, enable_push_notifications, updated_at
            )
            VALUES ($1, $2, $3, $4, true, NOW())
            ON CONFLICT (id) DO UPDATE SET
                push_endpoint = EXCLUDED.push_endpoint,
                push_p256dh = EXCLUDED.push_p256dh,
                push_auth = EXCLUDED.push_auth,
                enable_push_notifications = true,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_ALL_COLUMNS
        );

        let row = sqlx::query_as::<_, SettingsRow>(&query)
            .bind(SETTINGS_ID)
            .bind(&subscription.endpoint)
            .bind(&subscription.keys.p256dh)
            .bind(&subscription.keys.auth)
            .fetch_one(self.pool.pool())
            .await?;

        tracing::info!("Push subscription saved");
        Ok(row.into())
    }
}
