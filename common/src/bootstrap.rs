// Bootstrap utilities shared by the api and scheduler binaries

use crate::channels::{ResendMailer, WebPushSender};
use crate::config::Settings;
use crate::db::DbPool;
use crate::extraction::{GeminiExtractor, ImageExtractor};
use crate::notifications::{NotificationService, PgNotificationStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Connect to PostgreSQL and apply migrations when enabled
///
/// # Errors
/// Returns error if the pool cannot connect or a migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    if settings.database.run_migrations {
        db_pool
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Web Push sender; kept separately so the API can serve its public key
#[tracing::instrument(skip(settings))]
pub fn init_push_sender(settings: &Settings) -> Result<Arc<WebPushSender>> {
    let sender = WebPushSender::new(&settings.push).context("Failed to initialize push sender")?;
    Ok(Arc::new(sender))
}

/// Wire the reminder pipeline onto PostgreSQL, the email API and Web Push
#[tracing::instrument(skip(settings, db_pool, push_sender))]
pub fn init_notification_service(
    settings: &Settings,
    db_pool: DbPool,
    push_sender: Arc<WebPushSender>,
) -> Result<Arc<NotificationService>> {
    if settings.email.api_key.is_empty() {
        tracing::warn!("Email api_key not configured, email reminders will fail");
    }

    let mailer = ResendMailer::new(&settings.email).context("Failed to initialize mailer")?;
    let store = PgNotificationStore::new(db_pool);

    let service = NotificationService::new(Arc::new(store), Arc::new(mailer), push_sender);

    info!("Notification service initialized");
    Ok(Arc::new(service))
}

/// Vision model client used for package photo extraction
#[tracing::instrument(skip(settings))]
pub fn init_image_extractor(settings: &Settings) -> Result<Arc<dyn ImageExtractor>> {
    let extractor =
        GeminiExtractor::new(&settings.vision).context("Failed to initialize image extractor")?;

    info!(model = %settings.vision.model, "Image extractor initialized");
    Ok(Arc::new(extractor))
}
