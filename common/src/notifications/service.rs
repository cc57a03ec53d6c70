// Notification tick: time gate, window classification, dispatch

use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::{Mailer, NotificationStore, PushSender};
use crate::errors::NotificationError;
use crate::models::NotificationCategory;
use crate::schedule::{compose_message, is_notification_time, ExpiryWindow};
use crate::telemetry;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Result of one invocation of [`NotificationService::check_and_send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Wall clock did not match the configured notification time
    Skipped,
    Completed(TickSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Enabled categories whose window was queried
    pub categories_checked: usize,
    pub notified: usize,
    pub failed: usize,
    /// Eligible medicines that had no channel to go to
    pub undeliverable: usize,
}

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    dispatcher: Dispatcher,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mailer: Arc<dyn Mailer>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        let dispatcher = Dispatcher::new(store.clone(), mailer, push);
        Self { store, dispatcher }
    }

    /// Run one notification tick as of `now`.
    ///
    /// Without `force`, nothing beyond the settings read happens unless the
    /// `HH:MM` of `now` equals the configured notification time. Categories
    /// are evaluated monthly, weekly, daily; a medicine is attempted at most
    /// once per tick, under the first category that matches it. A failed
    /// window query aborts the tick; a failed delivery only affects its own
    /// medicine.
    #[instrument(skip(self, now))]
    pub async fn check_and_send<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        force: bool,
    ) -> Result<TickOutcome, NotificationError> {
        let settings = self.store.load_settings().await.inspect_err(|_| {
            telemetry::record_tick("failed");
        })?;

        if !force && !is_notification_time(&settings.notification_time, now) {
            debug!(
                notification_time = %settings.notification_time,
                "Outside notification time, skipping tick"
            );
            telemetry::record_tick("skipped");
            return Ok(TickOutcome::Skipped);
        }

        let notified_at = now.with_timezone(&Utc);
        let mut summary = TickSummary::default();
        let mut attempted: HashSet<Uuid> = HashSet::new();

        for category in NotificationCategory::PROCESSING_ORDER {
            if !settings.is_category_enabled(category) {
                debug!(category = %category, "Category disabled");
                continue;
            }

            let window = ExpiryWindow::for_category(category, now);
            let medicines = self.store.find_unnotified(&window).await.inspect_err(|e| {
                error!(category = %category, error = %e, "Failed to query expiring medicines");
                telemetry::record_tick("failed");
            })?;
            summary.categories_checked += 1;

            debug!(category = %category, count = medicines.len(), "Medicines in window");

            for medicine in medicines {
                if !attempted.insert(medicine.id) {
                    continue;
                }

                let message =
                    compose_message(category, &medicine.name, &medicine.expiry_date, now);

                match self
                    .dispatcher
                    .dispatch(&medicine, category, &message, &settings, notified_at)
                    .await
                {
                    Ok(DispatchOutcome::Delivered(_)) => summary.notified += 1,
                    Ok(DispatchOutcome::NoActiveChannel) => summary.undeliverable += 1,
                    Err(e) => {
                        error!(
                            medicine_id = %medicine.id,
                            medicine = %medicine.name,
                            error = %e,
                            "Failed to notify medicine"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }

        telemetry::record_tick("completed");
        info!(
            categories_checked = summary.categories_checked,
            notified = summary.notified,
            failed = summary.failed,
            undeliverable = summary.undeliverable,
            "Notification tick completed"
        );

        Ok(TickOutcome::Completed(summary))
    }
}
