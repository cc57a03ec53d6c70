use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Fixed identity of the singleton settings row
pub const SETTINGS_ID: i16 = 1;

/// Default time of day for reminders (server-local)
pub const DEFAULT_NOTIFICATION_TIME: &str = "09:00";

// ============================================================================
// Medicine Models
// ============================================================================

/// Medicine is one tracked package in the inventory
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    /// End of the expiry day (23:59:59.999 server-local)
    pub expiry_date: DateTime<Utc>,
    pub quantity: i32,
    pub batch_number: Option<String>,
    /// Set once by the dispatcher; never reset
    pub notified: bool,
    pub last_notification_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Create a new, not yet notified medicine
    ///
    /// # Arguments
    /// * `name` - Display name (product / brand / strength)
    /// * `expiry_date` - Already normalized end-of-day instant
    /// * `quantity` - Number of packages, must be positive
    /// * `batch_number` - Optional lot number; blank values are stored as `None`
    pub fn new(
        name: impl Into<String>,
        expiry_date: DateTime<Utc>,
        quantity: i32,
        batch_number: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            expiry_date,
            quantity,
            batch_number: batch_number.filter(|b| !b.trim().is_empty()),
            notified: false,
            last_notification_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Notification Settings Models
// ============================================================================

/// Browser push subscription as produced by `PushManager.subscribe()`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

/// Client keys of a push subscription (base64url, as sent by the browser)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Global notification configuration (one row)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub email: Option<String>,
    pub enable_email_notifications: bool,
    pub enable_push_notifications: bool,
    pub enable_daily_notifications: bool,
    pub enable_weekly_notifications: bool,
    pub enable_monthly_notifications: bool,
    /// `HH:MM`, compared against the server-local wall clock
    pub notification_time: String,
    pub push_subscription: Option<PushSubscription>,
    pub updated_at: DateTime<Utc>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: None,
            enable_email_notifications: true,
            enable_push_notifications: false,
            enable_daily_notifications: true,
            enable_weekly_notifications: true,
            enable_monthly_notifications: true,
            notification_time: DEFAULT_NOTIFICATION_TIME.to_string(),
            push_subscription: None,
            updated_at: Utc::now(),
        }
    }
}

impl NotificationSettings {
    /// Whether the given category should be evaluated on a tick
    pub fn is_category_enabled(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Monthly => self.enable_monthly_notifications,
            NotificationCategory::Weekly => self.enable_weekly_notifications,
            NotificationCategory::Daily => self.enable_daily_notifications,
        }
    }

    /// Recipient address when the email channel is usable
    pub fn email_recipient(&self) -> Option<&str> {
        if !self.enable_email_notifications {
            return None;
        }
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Subscription when the push channel is usable
    pub fn push_target(&self) -> Option<&PushSubscription> {
        if !self.enable_push_notifications {
            return None;
        }
        self.push_subscription.as_ref()
    }

    /// True when at least one channel would fire for a dispatch
    pub fn has_active_channel(&self) -> bool {
        self.email_recipient().is_some() || self.push_target().is_some()
    }
}

// ============================================================================
// Notification Log Models
// ============================================================================

/// Expiry window a reminder was raised for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationCategory {
    Monthly,
    Weekly,
    Daily,
}

impl NotificationCategory {
    /// Evaluation order on every tick
    pub const PROCESSING_ORDER: [NotificationCategory; 3] = [
        NotificationCategory::Monthly,
        NotificationCategory::Weekly,
        NotificationCategory::Daily,
    ];
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationCategory::Monthly => write!(f, "MONTHLY"),
            NotificationCategory::Weekly => write!(f, "WEEKLY"),
            NotificationCategory::Daily => write!(f, "DAILY"),
        }
    }
}

impl FromStr for NotificationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MONTHLY" => Ok(NotificationCategory::Monthly),
            "WEEKLY" => Ok(NotificationCategory::Weekly),
            "DAILY" => Ok(NotificationCategory::Daily),
            _ => Err(format!("Invalid notification category: {}", s)),
        }
    }
}

impl TryFrom<String> for NotificationCategory {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// Delivery channel of a reminder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationChannel {
    Email,
    Push,
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationChannel::Email => write!(f, "EMAIL"),
            NotificationChannel::Push => write!(f, "PUSH"),
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL" => Ok(NotificationChannel::Email),
            "PUSH" => Ok(NotificationChannel::Push),
            _ => Err(format!("Invalid notification channel: {}", s)),
        }
    }
}

impl TryFrom<String> for NotificationChannel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Success => write!(f, "success"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("Invalid delivery status: {}", s)),
        }
    }
}

impl TryFrom<String> for DeliveryStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// NotificationLog is one immutable delivery attempt record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLog {
    pub id: Uuid,
    pub medicine_id: Uuid,
    #[sqlx(try_from = "String")]
    pub category: NotificationCategory,
    #[sqlx(try_from = "String")]
    pub channel: NotificationChannel,
    #[sqlx(try_from = "String")]
    pub status: DeliveryStatus,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl NotificationLog {
    pub fn new(
        medicine_id: Uuid,
        category: NotificationCategory,
        channel: NotificationChannel,
        status: DeliveryStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            medicine_id,
            category,
            channel,
            status,
            message: message.into(),
            sent_at: Utc::now(),
        }
    }
}

/// History row: a log entry joined with its medicine's display name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHistoryEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub log: NotificationLog,
    pub medicine_name: String,
}

// ============================================================================
// Extraction Models
// ============================================================================

/// Best-effort fields read off a medicine package photo
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMedicine {
    #[serde(default)]
    pub name: Option<String>,
    /// `YYYY-MM-DD` when the model's answer could be parsed as a date
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
}

impl ExtractedMedicine {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.expiry_date.is_none() && self.batch_number.is_none()
    }
}
