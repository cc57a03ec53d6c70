// Integration tests for the outbound provider adapters against mock HTTP servers

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use common::channels::{ResendMailer, WebPushSender};
use common::config::{EmailConfig, PushConfig, VisionConfig};
use common::errors::{ChannelError, ExtractionError};
use common::extraction::{GeminiExtractor, ImageExtractor};
use common::models::{Medicine, PushKeys, PushSubscription};
use common::notifications::{Mailer, PushSender};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, header_exists, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn email_config(api_url: String) -> EmailConfig {
    EmailConfig {
        api_url,
        api_key: "re_test_key".to_string(),
        from_address: "Medicine Tracker <alerts@example.com>".to_string(),
        timeout_seconds: 5,
    }
}

fn sample_medicine() -> Medicine {
    Medicine::new(
        "Ibuprofen 200mg",
        Utc.with_ymd_and_hms(2025, 3, 13, 12, 0, 0).unwrap(),
        20,
        Some("IB-42".to_string()),
    )
}

#[tokio::test]
async fn test_resend_mailer_posts_alert_with_bearer_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test_key"))
        .and(body_partial_json(json!({
            "to": ["owner@example.com"],
            "subject": "Medicine Expiry Alert",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email_123"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mailer = ResendMailer::new(&email_config(mock_server.uri())).unwrap();
    let result = mailer
        .send_expiry_alert(
            "owner@example.com",
            &sample_medicine(),
            "URGENT: Medicine Ibuprofen 200mg will expire tomorrow on March 13, 2025",
        )
        .await;

    assert!(result.is_ok(), "expected success, got {:?}", result);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_resend_mailer_maps_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string(r#"{"message":"Invalid `to` field"}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mailer = ResendMailer::new(&email_config(mock_server.uri())).unwrap();
    let err = mailer
        .send_expiry_alert("not-an-address", &sample_medicine(), "message")
        .await
        .unwrap_err();

    match err {
        ChannelError::Rejected { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("Invalid"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

fn vision_config(api_url: String) -> VisionConfig {
    VisionConfig {
        api_url,
        model: "gemini-test".to_string(),
        api_key: "vision-key".to_string(),
        timeout_seconds: 5,
        max_image_bytes: 1024,
    }
}

#[tokio::test]
async fn test_gemini_extractor_reads_candidate_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(query_param("key", "vision-key"))
        .and(body_string_contains(r#""mime_type":"image/jpeg""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "text": "```json\n{\"name\": \"Amoxicillin 500mg\", \"expiryDate\": \"09/2026\", \"batchNumber\": \"AMX-778\"}\n```"
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let extractor = GeminiExtractor::new(&vision_config(mock_server.uri())).unwrap();
    let extracted = extractor
        .extract(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpg")
        .await
        .unwrap();

    assert_eq!(extracted.name.as_deref(), Some("Amoxicillin 500mg"));
    assert_eq!(extracted.expiry_date.as_deref(), Some("2026-09-30"));
    assert_eq!(extracted.batch_number.as_deref(), Some("AMX-778"));
    mock_server.verify().await;
}

#[tokio::test]
async fn test_gemini_extractor_maps_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&mock_server)
        .await;

    let extractor = GeminiExtractor::new(&vision_config(mock_server.uri())).unwrap();
    let err = extractor.extract(&[1, 2, 3], "image/png").await.unwrap_err();

    assert!(matches!(err, ExtractionError::RequestFailed(_)));
}

#[tokio::test]
async fn test_gemini_extractor_rejects_before_calling_api() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let extractor = GeminiExtractor::new(&vision_config(mock_server.uri())).unwrap();

    let too_large = vec![0u8; 2048];
    let err = extractor.extract(&too_large, "image/png").await.unwrap_err();
    assert!(matches!(err, ExtractionError::ImageTooLarge { .. }));

    let err = extractor.extract(&[1, 2, 3], "image/gif").await.unwrap_err();
    assert!(matches!(err, ExtractionError::UnsupportedImageType(_)));

    mock_server.verify().await;
}

/// Browser-side subscription keys for `endpoint`
fn browser_subscription(endpoint: String) -> PushSubscription {
    let ua_secret = SecretKey::random(&mut OsRng);
    let ua_public = ua_secret.public_key().to_encoded_point(false);
    let mut auth = [0u8; 16];
    OsRng.fill_bytes(&mut auth);

    PushSubscription {
        endpoint,
        keys: PushKeys {
            p256dh: URL_SAFE_NO_PAD.encode(ua_public.as_bytes()),
            auth: URL_SAFE_NO_PAD.encode(auth),
        },
    }
}

fn push_config() -> PushConfig {
    let vapid_secret = SecretKey::random(&mut OsRng);
    PushConfig {
        vapid_private_key: URL_SAFE_NO_PAD.encode(vapid_secret.to_bytes()),
        subject: "mailto:alerts@example.com".to_string(),
        ttl_seconds: 86_400,
        timeout_seconds: 5,
    }
}

#[tokio::test]
async fn test_web_push_sender_posts_encrypted_record() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/push/abc"))
        .and(header("content-encoding", "aes128gcm"))
        .and(header("ttl", "86400"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = WebPushSender::new(&push_config()).unwrap();
    let subscription = browser_subscription(format!("{}/push/abc", mock_server.uri()));
    let payload = json!({
        "title": "Medicine Expiry Alert",
        "body": "Medicine Ibuprofen 200mg will expire in 3 days on March 13, 2025",
    })
    .to_string();

    let result = sender.send(&subscription, &payload).await;
    assert!(result.is_ok(), "expected success, got {:?}", result);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let authorization = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(authorization.starts_with("vapid t="));
    assert!(authorization.contains(&format!(", k={}", sender.public_key().unwrap())));
    // salt + record size + key id length + key id + payload + delimiter + tag
    assert_eq!(
        requests[0].body.len(),
        16 + 4 + 1 + 65 + payload.len() + 1 + 16
    );
    mock_server.verify().await;
}

#[tokio::test]
async fn test_web_push_sender_reports_gone_subscription() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/push/expired"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = WebPushSender::new(&push_config()).unwrap();
    let subscription = browser_subscription(format!("{}/push/expired", mock_server.uri()));

    let err = sender.send(&subscription, "{}").await.unwrap_err();
    assert!(matches!(err, ChannelError::SubscriptionGone(410)));
}

#[tokio::test]
async fn test_web_push_sender_without_keys_is_not_configured() {
    let config = PushConfig {
        vapid_private_key: String::new(),
        ..push_config()
    };
    let sender = WebPushSender::new(&config).unwrap();
    let subscription = browser_subscription("https://push.example.com/x".to_string());

    let err = sender.send(&subscription, "{}").await.unwrap_err();
    assert!(matches!(err, ChannelError::NotConfigured(_)));
}
