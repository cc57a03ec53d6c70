pub mod health;
pub mod medicines;
pub mod metrics;
pub mod notifications;

// Common response types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::errors::{DatabaseError, ExtractionError, NotificationError, ValidationError};
use serde::Serialize;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            "unsupported_media_type" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "extraction_failed" => StatusCode::UNPROCESSABLE_ENTITY,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                error = %self.error,
                message = %self.message,
                trace_id = %self.trace_id,
                "Request failed"
            );
        }
        (status, Json(self)).into_response()
    }
}

impl From<DatabaseError> for ErrorResponse {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => {
                ErrorResponse::new("not_found", format!("Not found: {}", what))
            }
            DatabaseError::DuplicateKey(_) => ErrorResponse::new("conflict", err.to_string()),
            DatabaseError::ConnectionFailed(_) | DatabaseError::HealthCheckFailed(_) => {
                ErrorResponse::new("service_unavailable", err.to_string())
            }
            _ => ErrorResponse::new("database_error", err.to_string()),
        }
    }
}

impl From<ValidationError> for ErrorResponse {
    fn from(err: ValidationError) -> Self {
        let details = serde_json::json!({ "field": err.field() });
        ErrorResponse::new("validation_error", err.to_string()).with_details(details)
    }
}

impl From<ExtractionError> for ErrorResponse {
    fn from(err: ExtractionError) -> Self {
        let code = match &err {
            ExtractionError::NotConfigured => "service_unavailable",
            ExtractionError::UnsupportedImageType(_) => "unsupported_media_type",
            ExtractionError::ImageTooLarge { .. } => "payload_too_large",
            ExtractionError::RequestFailed(_) | ExtractionError::MalformedResponse(_) => {
                "upstream_error"
            }
            ExtractionError::NothingExtracted => "extraction_failed",
        };
        ErrorResponse::new(code, err.to_string())
    }
}

impl From<NotificationError> for ErrorResponse {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Store(db) => db.into(),
            other => ErrorResponse::new("notification_error", other.to_string()),
        }
    }
}

/// Standard API success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `201 Created` with the standard success body
pub struct Created<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(SuccessResponse::new(self.0))).into_response()
    }
}
