// Scheduler engine: drives the notification tick from a cron schedule

use crate::config::SchedulerConfig;
use crate::errors::ScheduleError;
use crate::notifications::{NotificationService, TickOutcome};
use crate::schedule::{next_tick_after, parse_tick_schedule};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use cron::Schedule as CronSchedule;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

/// Scheduler trait for the periodic reminder tick
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run the tick loop until [`Scheduler::stop`] is called
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop the loop, waiting for an in-flight tick up to the grace period
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Run one tick as of `now`
    async fn process_tick(
        &self,
        now: DateTime<Local>,
    ) -> Result<TickOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

/// Main scheduler engine implementation
pub struct SchedulerEngine {
    expression: String,
    schedule: CronSchedule,
    shutdown_grace: Duration,
    service: Arc<NotificationService>,
    shutdown_tx: watch::Sender<bool>,
    // Held for the duration of a tick so stop() can wait for it
    in_flight: Mutex<()>,
}

impl SchedulerEngine {
    /// Create a new scheduler engine
    ///
    /// # Errors
    /// Returns `ScheduleError::InvalidCronExpression` for a bad `tick_schedule`
    pub fn new(
        config: &SchedulerConfig,
        service: Arc<NotificationService>,
    ) -> Result<Self, ScheduleError> {
        let schedule = parse_tick_schedule(&config.tick_schedule)?;
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        Ok(Self {
            expression: config.tick_schedule.clone(),
            schedule,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_seconds),
            service,
            shutdown_tx,
            in_flight: Mutex::new(()),
        })
    }
}

/// Time to sleep from `now` until `next`; zero when already due
fn sleep_duration(now: DateTime<Local>, next: DateTime<Local>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(tick_schedule = %self.expression, "Starting scheduler engine");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let now = Local::now();
            let next = next_tick_after(&self.schedule, &now)?;
            debug!(next_tick = %next, "Waiting for next tick");

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration(now, next)) => {
                    // The scheduled instant, not the wake-up time, decides the minute
                    match self.process_tick(next).await {
                        Ok(TickOutcome::Skipped) => {}
                        Ok(TickOutcome::Completed(summary)) => {
                            debug!(?summary, "Tick processed");
                        }
                        Err(e) => {
                            error!(error = %e, "Notification tick failed");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Stopping scheduler engine");
        self.shutdown_tx.send_replace(true);

        match tokio::time::timeout(self.shutdown_grace, self.in_flight.lock()).await {
            Ok(_guard) => info!("Scheduler engine stopped gracefully"),
            Err(_) => warn!(
                grace_seconds = self.shutdown_grace.as_secs(),
                "In-flight tick did not finish within the grace period"
            ),
        }
        Ok(())
    }

    #[instrument(skip(self), fields(now = %now))]
    async fn process_tick(
        &self,
        now: DateTime<Local>,
    ) -> Result<TickOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.service.check_and_send(&now, false).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatabaseError;
    use crate::models::{Medicine, NotificationLog, NotificationSettings};
    use crate::notifications::{MockMailer, MockPushSender, NotificationStore};
    use crate::schedule::ExpiryWindow;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Never-matching notification time, so every tick is a settings read only
    #[derive(Default)]
    struct ClosedGateStore {
        settings_reads: AtomicUsize,
    }

    #[async_trait]
    impl NotificationStore for ClosedGateStore {
        async fn load_settings(&self) -> Result<NotificationSettings, DatabaseError> {
            self.settings_reads.fetch_add(1, Ordering::SeqCst);
            Ok(NotificationSettings {
                notification_time: "never".to_string(),
                ..Default::default()
            })
        }

        async fn find_unnotified(
            &self,
            _window: &ExpiryWindow,
        ) -> Result<Vec<Medicine>, DatabaseError> {
            panic!("gate is closed, no window query expected");
        }

        async fn append_log(&self, _log: &NotificationLog) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn mark_notified(
            &self,
            _medicine_id: Uuid,
            _notified_at: chrono::DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    fn engine(tick_schedule: &str, store: Arc<ClosedGateStore>) -> Result<SchedulerEngine, ScheduleError> {
        let service = NotificationService::new(
            store,
            Arc::new(MockMailer::new()),
            Arc::new(MockPushSender::new()),
        );
        let config = SchedulerConfig {
            tick_schedule: tick_schedule.to_string(),
            shutdown_grace_seconds: 1,
        };
        SchedulerEngine::new(&config, Arc::new(service))
    }

    #[test]
    fn test_invalid_schedule_is_rejected() {
        let store = Arc::new(ClosedGateStore::default());
        assert!(engine("every minute", store).is_err());
    }

    #[test]
    fn test_sleep_duration_never_negative() {
        let now = Local.with_ymd_and_hms(2025, 1, 1, 9, 0, 30).unwrap();
        let next = Local.with_ymd_and_hms(2025, 1, 1, 9, 1, 0).unwrap();
        assert_eq!(sleep_duration(now, next), Duration::from_secs(30));
        assert_eq!(sleep_duration(next, now), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_process_tick_outside_notification_time_is_skipped() {
        let store = Arc::new(ClosedGateStore::default());
        let engine = engine("0 * * * * *", store.clone()).unwrap();

        let outcome = engine.process_tick(Local::now()).await.unwrap();

        assert_eq!(outcome, TickOutcome::Skipped);
        assert_eq!(store.settings_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_before_start_returns_immediately() {
        let store = Arc::new(ClosedGateStore::default());
        let engine = engine("0 * * * * *", store).unwrap();

        engine.stop().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), engine.start())
            .await
            .expect("start should observe the earlier stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_loop_ticks_until_stopped() {
        let store = Arc::new(ClosedGateStore::default());
        let engine = Arc::new(engine("* * * * * *", store.clone()).unwrap());

        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start().await.map_err(|e| e.to_string()) })
        };

        tokio::time::sleep(Duration::from_millis(2500)).await;
        engine.stop().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("scheduler loop should exit after stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(store.settings_reads.load(Ordering::SeqCst) >= 1);
    }
}
