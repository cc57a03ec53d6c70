use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{Created, ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::db::repositories::MedicineRepository;
use common::errors::{ExtractionError, ValidationError};
use common::extraction::validate_image;
use common::models::{ExtractedMedicine, Medicine};
use common::schedule::end_of_day_local;
use common::telemetry;

/// Look-ahead of the expiring list when `days` is omitted
const DEFAULT_EXPIRING_DAYS: i64 = 7;

/// Multipart field carrying the package photo
const IMAGE_FIELD: &str = "image";

/// Request to add a medicine to the inventory
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMedicineRequest {
    pub name: String,
    /// `YYYY-MM-DD`
    pub expiry_date: String,
    pub quantity: i32,
    pub batch_number: Option<String>,
}

impl CreateMedicineRequest {
    /// Validate and build the medicine; expiry becomes the end of that local day
    pub fn into_medicine(self) -> Result<Medicine, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        if self.quantity <= 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "quantity".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        let date = NaiveDate::parse_from_str(self.expiry_date.trim(), "%Y-%m-%d").map_err(
            |_| ValidationError::InvalidFieldValue {
                field: "expiryDate".to_string(),
                reason: format!("'{}' is not a YYYY-MM-DD date", self.expiry_date),
            },
        )?;

        let batch_number = self.batch_number.map(|b| b.trim().to_string());

        Ok(Medicine::new(
            name,
            end_of_day_local(date),
            self.quantity,
            batch_number,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

/// List all medicines, soonest expiry first
#[tracing::instrument(skip(state))]
pub async fn list_medicines(
    State(state): State<AppState>,
) -> Result<SuccessResponse<Vec<Medicine>>, ErrorResponse> {
    let repo = MedicineRepository::new(state.db_pool.clone());
    let medicines = repo.find_all().await?;
    Ok(SuccessResponse::new(medicines))
}

/// Add a medicine
#[tracing::instrument(skip(state, req))]
pub async fn create_medicine(
    State(state): State<AppState>,
    Json(req): Json<CreateMedicineRequest>,
) -> Result<Created<Medicine>, ErrorResponse> {
    let medicine = req.into_medicine()?;

    let repo = MedicineRepository::new(state.db_pool.clone());
    repo.create(&medicine).await?;

    tracing::info!(
        medicine_id = %medicine.id,
        name = %medicine.name,
        expiry_date = %medicine.expiry_date,
        "Medicine created"
    );
    Ok(Created(medicine))
}

/// Get one medicine
#[tracing::instrument(skip(state))]
pub async fn get_medicine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SuccessResponse<Medicine>, ErrorResponse> {
    let repo = MedicineRepository::new(state.db_pool.clone());
    let medicine = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ErrorResponse::new("not_found", format!("Medicine {} not found", id)))?;
    Ok(SuccessResponse::new(medicine))
}

/// Not yet notified medicines expiring within `days` (expired ones included)
#[tracing::instrument(skip(state))]
pub async fn list_expiring(
    State(state): State<AppState>,
    Query(query): Query<ExpiringQuery>,
) -> Result<SuccessResponse<Vec<Medicine>>, ErrorResponse> {
    let days = query.days.unwrap_or(DEFAULT_EXPIRING_DAYS);
    if !(0..=3650).contains(&days) {
        return Err(ValidationError::InvalidFieldValue {
            field: "days".to_string(),
            reason: "must be between 0 and 3650".to_string(),
        }
        .into());
    }

    let repo = MedicineRepository::new(state.db_pool.clone());
    let medicines = repo
        .find_unnotified_expiring_before(Utc::now() + Duration::days(days))
        .await?;
    Ok(SuccessResponse::new(medicines))
}

/// Delete a medicine; its notification logs go with it
#[tracing::instrument(skip(state))]
pub async fn delete_medicine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SuccessResponse<()>, ErrorResponse> {
    let repo = MedicineRepository::new(state.db_pool.clone());
    repo.delete(id).await?;

    tracing::info!(medicine_id = %id, "Medicine deleted");
    Ok(SuccessResponse::new(()))
}

/// Read name, expiry date and batch number off an uploaded package photo
#[tracing::instrument(skip(state, multipart))]
pub async fn extract_from_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<SuccessResponse<ExtractedMedicine>, ErrorResponse> {
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ErrorResponse::new("validation_error", format!("Invalid multipart body: {}", e))
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            ErrorResponse::new("validation_error", format!("Failed to read image: {}", e))
        })?;
        image = Some((mime_type, bytes.to_vec()));
        break;
    }

    let (mime_type, bytes) =
        image.ok_or_else(|| ValidationError::MissingField(IMAGE_FIELD.to_string()))?;

    validate_image(&mime_type, bytes.len(), state.config.vision.max_image_bytes)?;

    match state.extractor.extract(&bytes, &mime_type).await {
        Ok(extracted) => {
            telemetry::record_extraction("success");
            Ok(SuccessResponse::new(extracted))
        }
        Err(e) => {
            telemetry::record_extraction(extraction_outcome(&e));
            tracing::warn!(error = %e, "Medicine extraction failed");
            Err(e.into())
        }
    }
}

fn extraction_outcome(err: &ExtractionError) -> &'static str {
    match err {
        ExtractionError::NothingExtracted => "empty",
        _ => "failed",
    }
}
