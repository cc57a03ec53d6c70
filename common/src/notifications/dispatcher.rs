// Channel fan-out for a single medicine

use super::{Mailer, NotificationStore, PushSender};
use crate::errors::NotificationError;
use crate::models::{
    DeliveryStatus, Medicine, NotificationCategory, NotificationChannel, NotificationLog,
    NotificationSettings,
};
use crate::telemetry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What happened to one medicine during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every enabled channel succeeded and the medicine is now `notified`
    Delivered(Vec<NotificationChannel>),
    /// No channel is enabled and configured; the medicine stays eligible
    NoActiveChannel,
}

pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    mailer: Arc<dyn Mailer>,
    push: Arc<dyn PushSender>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mailer: Arc<dyn Mailer>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            store,
            mailer,
            push,
        }
    }

    /// Send `message` on every enabled channel, email first, then push.
    ///
    /// Each attempt appends one log entry. The first channel failure is
    /// logged as `failed` and returned; later channels are not attempted and
    /// the medicine is left unmarked so a later tick retries it. Only when
    /// all attempted channels succeed is the medicine marked notified, at
    /// the tick instant `now`.
    #[instrument(skip(self, medicine, message, settings, now), fields(medicine_id = %medicine.id, category = %category))]
    pub async fn dispatch(
        &self,
        medicine: &Medicine,
        category: NotificationCategory,
        message: &str,
        settings: &NotificationSettings,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, NotificationError> {
        if !settings.has_active_channel() {
            warn!(
                medicine = %medicine.name,
                "No notification channel enabled, medicine left eligible"
            );
            return Ok(DispatchOutcome::NoActiveChannel);
        }

        let mut delivered = Vec::new();

        if let Some(to) = settings.email_recipient() {
            if let Err(e) = self.mailer.send_expiry_alert(to, medicine, message).await {
                self.record_failure(medicine, category, NotificationChannel::Email, &e.to_string())
                    .await;
                return Err(NotificationError::Email(e));
            }
            self.record_success(medicine, category, NotificationChannel::Email, message)
                .await?;
            delivered.push(NotificationChannel::Email);
        }

        if let Some(subscription) = settings.push_target() {
            if let Err(e) = self.push.send(subscription, message).await {
                self.record_failure(medicine, category, NotificationChannel::Push, &e.to_string())
                    .await;
                return Err(NotificationError::Push(e));
            }
            self.record_success(medicine, category, NotificationChannel::Push, message)
                .await?;
            delivered.push(NotificationChannel::Push);
        }

        self.store.mark_notified(medicine.id, now).await?;

        info!(
            medicine = %medicine.name,
            channels = ?delivered,
            "Expiry reminder delivered"
        );
        Ok(DispatchOutcome::Delivered(delivered))
    }

    async fn record_success(
        &self,
        medicine: &Medicine,
        category: NotificationCategory,
        channel: NotificationChannel,
        message: &str,
    ) -> Result<(), NotificationError> {
        telemetry::record_notification_sent(category, channel);
        let log = NotificationLog::new(
            medicine.id,
            category,
            channel,
            DeliveryStatus::Success,
            message,
        );
        self.store.append_log(&log).await?;
        Ok(())
    }

    // The send error is what the caller returns; a log write failure here only gets traced
    async fn record_failure(
        &self,
        medicine: &Medicine,
        category: NotificationCategory,
        channel: NotificationChannel,
        reason: &str,
    ) {
        telemetry::record_notification_failed(category, channel);
        error!(
            medicine = %medicine.name,
            channel = %channel,
            error = reason,
            "Reminder delivery failed"
        );

        let log = NotificationLog::new(
            medicine.id,
            category,
            channel,
            DeliveryStatus::Failed,
            reason,
        );
        if let Err(e) = self.store.append_log(&log).await {
            warn!(error = %e, "Failed to record failed delivery");
        }
    }
}
