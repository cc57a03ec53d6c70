// Email channel backed by a Resend-compatible HTTP API

use crate::config::EmailConfig;
use crate::errors::ChannelError;
use crate::models::Medicine;
use crate::notifications::Mailer;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const EXPIRY_ALERT_SUBJECT: &str = "Medicine Expiry Alert";

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

/// ResendMailer posts expiry alerts to `{api_url}/emails`
pub struct ResendMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl ResendMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                ChannelError::HttpRequestFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    #[tracing::instrument(skip(self, medicine, message), fields(medicine_id = %medicine.id))]
    async fn send_expiry_alert(
        &self,
        to: &str,
        medicine: &Medicine,
        message: &str,
    ) -> Result<(), ChannelError> {
        if self.api_key.is_empty() {
            return Err(ChannelError::NotConfigured(
                "email api_key is not set".to_string(),
            ));
        }

        let request = SendEmailRequest {
            from: &self.from_address,
            to: [to],
            subject: EXPIRY_ALERT_SUBJECT,
            html: render_expiry_alert(medicine, message),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(status = status.as_u16(), "Expiry alert email accepted");
        Ok(())
    }
}

/// HTML body of the expiry alert
pub fn render_expiry_alert(medicine: &Medicine, message: &str) -> String {
    let expiry = medicine
        .expiry_date
        .with_timezone(&chrono::Local)
        .format("%B %-d, %Y");

    let batch_row = medicine
        .batch_number
        .as_deref()
        .map(|batch| {
            format!(
                "<tr><td><strong>Batch Number:</strong></td><td>{}</td></tr>",
                escape_html(batch)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<h2>Medicine Expiry Alert</h2>
<table>
<tr><td><strong>Name:</strong></td><td>{name}</td></tr>
<tr><td><strong>Expiry Date:</strong></td><td>{expiry}</td></tr>
<tr><td><strong>Quantity:</strong></td><td>{quantity}</td></tr>
{batch_row}
</table>
<p>{message}</p>
<p><small>This is an automated notification from your Medicine Expiry Tracker.</small></p>"#,
        name = escape_html(&medicine.name),
        expiry = expiry,
        quantity = medicine.quantity,
        batch_row = batch_row,
        message = escape_html(message),
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_render_includes_medicine_details() {
        let medicine = Medicine::new("Amoxicillin 500mg", Utc::now(), 3, Some("LOT-42".to_string()));
        let html = render_expiry_alert(&medicine, "URGENT: Medicine Amoxicillin 500mg will expire tomorrow");

        assert!(html.contains("Amoxicillin 500mg"));
        assert!(html.contains("<td>3</td>"));
        assert!(html.contains("LOT-42"));
        assert!(html.contains("URGENT"));
        assert!(html.contains("automated notification"));
    }

    #[test]
    fn test_render_omits_missing_batch_number() {
        let medicine = Medicine::new("Aspirin", Utc::now(), 1, None);
        let html = render_expiry_alert(&medicine, "msg");
        assert!(!html.contains("Batch Number"));
    }

    #[test]
    fn test_render_escapes_user_text() {
        let medicine = Medicine::new("<b>Bad</b>", Utc::now(), 1, None);
        let html = render_expiry_alert(&medicine, "a & b");
        assert!(html.contains("&lt;b&gt;Bad&lt;/b&gt;"));
        assert!(html.contains("a &amp; b"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_configured() {
        let config = EmailConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            api_key: String::new(),
            from_address: "Tracker <noreply@example.com>".to_string(),
            timeout_seconds: 1,
        };
        let mailer = ResendMailer::new(&config).unwrap();
        let medicine = Medicine::new("Aspirin", Utc::now(), 1, None);

        let err = mailer
            .send_expiry_alert("a@b.com", &medicine, "msg")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }
}
