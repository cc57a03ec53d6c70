// Error handling framework

use thiserror::Error;

/// Tick schedule errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("No upcoming tick after {0}")]
    NoUpcomingTick(String),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

impl ValidationError {
    /// Request field the error refers to
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField(field) => field,
            ValidationError::InvalidFieldValue { field, .. } => field,
        }
    }
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Delivery channel errors (email provider, push service)
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid push subscription: {0}")]
    InvalidSubscription(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("HTTP request failed: {0}")]
    HttpRequestFailed(String),

    #[error("Provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Push subscription expired or unsubscribed (status {0})")]
    SubscriptionGone(u16),
}

/// Errors raised while dispatching a notification for one medicine
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Email delivery failed: {0}")]
    Email(ChannelError),

    #[error("Push delivery failed: {0}")]
    Push(ChannelError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Image extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction service not configured")]
    NotConfigured,

    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    #[error("Image too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Vision service request failed: {0}")]
    RequestFailed(String),

    #[error("Vision service returned an unexpected response: {0}")]
    MalformedResponse(String),

    #[error("No information could be extracted from the image")]
    NothingExtracted,
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Check for specific database error codes
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::HttpRequestFailed(err.to_string())
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        ExtractionError::RequestFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_error_display() {
        let err = ScheduleError::InvalidCronExpression {
            expression: "* * * *".to_string(),
            reason: "invalid format".to_string(),
        };
        assert!(err.to_string().contains("Invalid cron expression"));
    }

    #[test]
    fn test_notification_error_wraps_channel_error() {
        let err = NotificationError::Email(ChannelError::Rejected {
            status: 422,
            body: "invalid to".to_string(),
        });
        let text = err.to_string();
        assert!(text.starts_with("Email delivery failed"));
        assert!(text.contains("422"));
    }

    #[test]
    fn test_database_error_converts_into_notification_error() {
        let err: NotificationError = DatabaseError::NotFound("medicine".to_string()).into();
        assert!(matches!(err, NotificationError::Store(_)));
        assert_eq!(err.to_string(), "Record not found: medicine");
    }

    #[test]
    fn test_image_too_large_display() {
        let err = ExtractionError::ImageTooLarge {
            size: 6_000_000,
            max: 5_242_880,
        };
        assert!(err.to_string().contains("6000000"));
    }
}
