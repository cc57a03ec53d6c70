// Medicine package photo extraction through a generative vision model

use crate::config::VisionConfig;
use crate::errors::ExtractionError;
use crate::models::ExtractedMedicine;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

/// Accepted upload types
pub const SUPPORTED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

const EXTRACTION_PROMPT: &str = r#"Read the label on this photo of a medicine package and report:
1. name: the product, brand or drug name, with strength or dosage when printed
2. expiryDate: the date marked "EXP", "Expiry", "Use by" or similar, written as YYYY-MM-DD
3. batchNumber: the value marked "Batch", "LOT", "B.No." or similar, alphanumeric only

Reply with exactly one JSON object using the keys "name", "expiryDate" and "batchNumber".
Use null for anything that is missing or not legible. Do not add other keys or any text around the JSON."#;

/// Turns an uploaded image into best-effort medicine fields
#[async_trait]
pub trait ImageExtractor: Send + Sync {
    async fn extract(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedMedicine, ExtractionError>;
}

/// Reject uploads the vision model should never see
pub fn validate_image(mime_type: &str, size: usize, max_bytes: usize) -> Result<(), ExtractionError> {
    if !SUPPORTED_IMAGE_TYPES.contains(&mime_type) {
        return Err(ExtractionError::UnsupportedImageType(mime_type.to_string()));
    }
    if size > max_bytes {
        return Err(ExtractionError::ImageTooLarge {
            size,
            max: max_bytes,
        });
    }
    Ok(())
}

/// GeminiExtractor calls `{api_url}/models/{model}:generateContent`
pub struct GeminiExtractor {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
    max_image_bytes: usize,
}

impl GeminiExtractor {
    pub fn new(config: &VisionConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                ExtractionError::RequestFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_image_bytes: config.max_image_bytes,
        })
    }
}

#[async_trait]
impl ImageExtractor for GeminiExtractor {
    #[tracing::instrument(skip(self, image), fields(size = image.len(), model = %self.model))]
    async fn extract(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedMedicine, ExtractionError> {
        if self.api_key.is_empty() {
            return Err(ExtractionError::NotConfigured);
        }
        validate_image(mime_type, image.len(), self.max_image_bytes)?;

        // The API only knows the canonical JPEG type
        let mime_type = if mime_type == "image/jpg" {
            "image/jpeg"
        } else {
            mime_type
        };

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": EXTRACTION_PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": STANDARD.encode(image) } }
                ]
            }]
        });

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.api_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %text, "Vision API returned an error");
            return Err(ExtractionError::RequestFailed(format!(
                "vision API returned status {}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        let text = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ExtractionError::MalformedResponse("response has no candidate text".to_string())
            })?;

        let extracted = parse_model_answer(text)?;
        tracing::info!(
            has_name = extracted.name.is_some(),
            has_expiry = extracted.expiry_date.is_some(),
            has_batch = extracted.batch_number.is_some(),
            "Medicine details extracted"
        );
        Ok(extracted)
    }
}

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("valid JSON object pattern"))
}

/// Pull the JSON object out of the model's free text answer
pub fn parse_model_answer(text: &str) -> Result<ExtractedMedicine, ExtractionError> {
    let object = json_object_pattern()
        .find(text)
        .ok_or_else(|| ExtractionError::MalformedResponse("no JSON object in answer".to_string()))?;

    let value: Value = serde_json::from_str(object.as_str())
        .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

    let extracted = ExtractedMedicine {
        name: string_field(&value, "name"),
        expiry_date: string_field(&value, "expiryDate").map(|raw| normalize_expiry_date(&raw)),
        batch_number: string_field(&value, "batchNumber"),
    };

    if extracted.is_empty() {
        return Err(ExtractionError::NothingExtracted);
    }
    Ok(extracted)
}

// Models sometimes answer numbers for batch numbers or the string "null"
fn string_field(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text)
    }
}

/// Normalize a printed expiry date to `YYYY-MM-DD`.
///
/// Slash dates read month first (`03/04/2026` is March 4th) and fall back to
/// day first when the leading field cannot be a month. Timestamps keep their
/// UTC date. Month-only dates (`08/2026`, `2026-08`, `AUG 2026`) resolve to
/// the last day of that month. Unparseable input is returned unchanged.
pub fn normalize_expiry_date(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return timestamp
            .with_timezone(&Utc)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return timestamp.date().format("%Y-%m-%d").to_string();
    }

    const FULL_DATE_FORMATS: [&str; 8] = [
        "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%B %d, %Y",
        "%d %B %Y",
    ];
    for format in FULL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    // Month precision: parse as the first of the month, then move to its last day
    const MONTH_FORMATS: [&str; 5] = ["%m/%Y", "%Y-%m", "%m.%Y", "%b %Y", "%B %Y"];
    for format in MONTH_FORMATS {
        let candidate = format!("01 {}", trimmed);
        let with_day = format!("%d {}", format);
        if let Ok(first) = NaiveDate::parse_from_str(&candidate, &with_day) {
            return last_day_of_month(first).format("%Y-%m-%d").to_string();
        }
    }

    trimmed.to_string()
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}
