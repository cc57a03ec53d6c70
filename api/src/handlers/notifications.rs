use axum::{extract::State, Json};
use chrono::{Duration, Local, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::db::repositories::notification_log::HISTORY_LIMIT;
use common::db::repositories::{MedicineRepository, NotificationLogRepository, SettingsRepository};
use common::errors::ValidationError;
use common::models::{
    Medicine, NotificationHistoryEntry, NotificationSettings, PushSubscription,
};
use common::notifications::{TickOutcome, TickSummary};
use common::schedule::parse_notification_time;

/// Partial settings update; absent fields keep their stored value
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    /// Empty string clears the address
    pub email: Option<String>,
    pub enable_email_notifications: Option<bool>,
    pub enable_push_notifications: Option<bool>,
    pub enable_daily_notifications: Option<bool>,
    pub enable_weekly_notifications: Option<bool>,
    pub enable_monthly_notifications: Option<bool>,
    pub notification_time: Option<String>,
    pub push_subscription: Option<PushSubscription>,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

impl UpdateSettingsRequest {
    /// Merge onto `current`, validating every provided field
    pub fn apply(
        self,
        mut current: NotificationSettings,
    ) -> Result<NotificationSettings, ValidationError> {
        if let Some(email) = self.email {
            let email = email.trim();
            if email.is_empty() {
                current.email = None;
            } else if email_pattern().is_match(email) {
                current.email = Some(email.to_string());
            } else {
                return Err(ValidationError::InvalidFieldValue {
                    field: "email".to_string(),
                    reason: format!("'{}' is not an email address", email),
                });
            }
        }

        if let Some(time) = self.notification_time {
            if parse_notification_time(&time).is_none() {
                return Err(ValidationError::InvalidFieldValue {
                    field: "notificationTime".to_string(),
                    reason: format!("'{}' is not a HH:MM time", time),
                });
            }
            current.notification_time = time;
        }

        if let Some(subscription) = self.push_subscription {
            validate_subscription(&subscription)?;
            current.push_subscription = Some(subscription);
        }

        if let Some(v) = self.enable_email_notifications {
            current.enable_email_notifications = v;
        }
        if let Some(v) = self.enable_push_notifications {
            current.enable_push_notifications = v;
        }
        if let Some(v) = self.enable_daily_notifications {
            current.enable_daily_notifications = v;
        }
        if let Some(v) = self.enable_weekly_notifications {
            current.enable_weekly_notifications = v;
        }
        if let Some(v) = self.enable_monthly_notifications {
            current.enable_monthly_notifications = v;
        }

        Ok(current)
    }
}

fn validate_subscription(subscription: &PushSubscription) -> Result<(), ValidationError> {
    if subscription.endpoint.trim().is_empty() {
        return Err(ValidationError::MissingField("endpoint".to_string()));
    }
    if subscription.keys.p256dh.is_empty() {
        return Err(ValidationError::MissingField("keys.p256dh".to_string()));
    }
    if subscription.keys.auth.is_empty() {
        return Err(ValidationError::MissingField("keys.auth".to_string()));
    }
    Ok(())
}

/// Result of a forced test run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationResponse {
    pub medicine_id: Uuid,
    pub categories_checked: usize,
    pub notified: usize,
    pub failed: usize,
    pub undeliverable: usize,
}

impl TestNotificationResponse {
    fn new(medicine_id: Uuid, summary: TickSummary) -> Self {
        Self {
            medicine_id,
            categories_checked: summary.categories_checked,
            notified: summary.notified,
            failed: summary.failed,
            undeliverable: summary.undeliverable,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    pub public_key: String,
}

/// Current settings, created with defaults on first access
#[tracing::instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<SuccessResponse<NotificationSettings>, ErrorResponse> {
    let repo = SettingsRepository::new(state.db_pool.clone());
    let settings = repo.get_or_default().await?;
    Ok(SuccessResponse::new(settings))
}

/// Update settings (POST and PUT)
#[tracing::instrument(skip(state, req))]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<SuccessResponse<NotificationSettings>, ErrorResponse> {
    let repo = SettingsRepository::new(state.db_pool.clone());
    let current = repo.get_or_default().await?;
    let updated = req.apply(current)?;
    let saved = repo.upsert(&updated).await?;
    Ok(SuccessResponse::new(saved))
}

/// Store the browser's push subscription and enable push
#[tracing::instrument(skip(state, subscription))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(subscription): Json<PushSubscription>,
) -> Result<SuccessResponse<NotificationSettings>, ErrorResponse> {
    validate_subscription(&subscription)?;

    let repo = SettingsRepository::new(state.db_pool.clone());
    let settings = repo.save_subscription(&subscription).await?;
    Ok(SuccessResponse::new(settings))
}

/// Most recent delivery attempts, newest first
#[tracing::instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
) -> Result<SuccessResponse<Vec<NotificationHistoryEntry>>, ErrorResponse> {
    let repo = NotificationLogRepository::new(state.db_pool.clone());
    let entries = repo.recent_history(HISTORY_LIMIT).await?;
    Ok(SuccessResponse::new(entries))
}

/// Create a medicine expiring in 24 hours and run the pipeline without the time gate
#[tracing::instrument(skip(state))]
pub async fn send_test_notification(
    State(state): State<AppState>,
) -> Result<SuccessResponse<TestNotificationResponse>, ErrorResponse> {
    let medicine = Medicine::new(
        "Test Medicine",
        Utc::now() + Duration::hours(24),
        1,
        Some("TEST-123".to_string()),
    );

    let repo = MedicineRepository::new(state.db_pool.clone());
    repo.create(&medicine).await?;
    tracing::info!(medicine_id = %medicine.id, "Test medicine created");

    let summary = match state
        .notification_service
        .check_and_send(&Local::now(), true)
        .await?
    {
        TickOutcome::Completed(summary) => summary,
        TickOutcome::Skipped => TickSummary::default(),
    };

    Ok(SuccessResponse::new(TestNotificationResponse::new(
        medicine.id,
        summary,
    )))
}

/// Application server key for `pushManager.subscribe`
#[tracing::instrument(skip(state))]
pub async fn vapid_public_key(
    State(state): State<AppState>,
) -> Result<SuccessResponse<VapidPublicKeyResponse>, ErrorResponse> {
    let public_key = state.push_sender.public_key().ok_or_else(|| {
        ErrorResponse::new(
            "service_unavailable",
            "Push notifications are not configured",
        )
    })?;
    Ok(SuccessResponse::new(VapidPublicKeyResponse { public_key }))
}
