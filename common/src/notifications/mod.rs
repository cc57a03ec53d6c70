// Expiry reminder pipeline: gate, classify, dispatch, log

pub mod dispatcher;
pub mod service;
pub mod store;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use service::{NotificationService, TickOutcome, TickSummary};
pub use store::PgNotificationStore;

use crate::errors::{ChannelError, DatabaseError};
use crate::models::{Medicine, NotificationLog, NotificationSettings, PushSubscription};
use crate::schedule::ExpiryWindow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Sends the expiry alert email for one medicine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_expiry_alert(
        &self,
        to: &str,
        medicine: &Medicine,
        message: &str,
    ) -> Result<(), ChannelError>;
}

/// Delivers a Web Push message to a browser subscription
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &str)
        -> Result<(), ChannelError>;
}

/// Persistence the reminder pipeline needs
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn load_settings(&self) -> Result<NotificationSettings, DatabaseError>;

    /// Medicines with `notified = false` whose expiry lies inside `window`
    async fn find_unnotified(&self, window: &ExpiryWindow) -> Result<Vec<Medicine>, DatabaseError>;

    async fn append_log(&self, log: &NotificationLog) -> Result<(), DatabaseError>;

    async fn mark_notified(
        &self,
        medicine_id: Uuid,
        notified_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}
