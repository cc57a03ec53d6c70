// Web Push channel: aes128gcm payload encryption (RFC 8291) with VAPID (RFC 8292)

use crate::config::PushConfig;
use crate::errors::ChannelError;
use crate::models::PushSubscription;
use crate::notifications::PushSender;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Record size advertised in the aes128gcm header
pub const RECORD_SIZE: u32 = 4096;
const TAG_LEN: usize = 16;
const SALT_LEN: usize = 16;
const PUBLIC_KEY_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;
/// Lifetime of the VAPID token
const JWT_VALIDITY_HOURS: i64 = 12;

const KEY_INFO: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";
const COUNTER: &[u8] = &[0x01];

/// VAPID claims (RFC 8292 section 2)
#[derive(Debug, Serialize)]
struct VapidClaims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

/// Application server key pair used to sign VAPID tokens
pub struct VapidKeys {
    secret: SecretKey,
    encoding_key: EncodingKey,
}

impl VapidKeys {
    /// Load from the base64url encoded 32-byte private scalar
    pub fn from_base64_private(private_key: &str) -> Result<Self, ChannelError> {
        let raw = decode_base64url(private_key)
            .map_err(|e| ChannelError::NotConfigured(format!("invalid VAPID private key: {}", e)))?;
        let secret = SecretKey::from_slice(&raw).map_err(|_| {
            ChannelError::NotConfigured("VAPID private key is not a P-256 scalar".to_string())
        })?;
        let der = secret.to_pkcs8_der().map_err(|e| {
            ChannelError::NotConfigured(format!("VAPID private key encoding failed: {}", e))
        })?;
        let encoding_key = EncodingKey::from_ec_der(der.as_bytes());
        Ok(Self {
            secret,
            encoding_key,
        })
    }

    /// Uncompressed public key, base64url; browsers pass it as `applicationServerKey`
    pub fn public_key_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.secret.public_key().to_encoded_point(false).as_bytes())
    }

    /// ES256 JWT for the push service at `audience`
    pub fn sign_token(
        &self,
        audience: &str,
        subject: &str,
        expires_at: i64,
    ) -> Result<String, ChannelError> {
        let claims = VapidClaims {
            aud: audience,
            exp: expires_at,
            sub: subject,
        };
        encode(&Header::new(Algorithm::ES256), &claims, &self.encoding_key)
            .map_err(|e| ChannelError::Encryption(format!("Failed to sign VAPID token: {}", e)))
    }
}

/// WebPushSender delivers encrypted payloads to browser push services
pub struct WebPushSender {
    client: Client,
    keys: Option<VapidKeys>,
    subject: String,
    ttl_seconds: u32,
}

impl WebPushSender {
    /// Build the sender; without a private key every send is `NotConfigured`
    pub fn new(config: &PushConfig) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                ChannelError::HttpRequestFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        let keys = if config.vapid_private_key.trim().is_empty() {
            tracing::warn!("VAPID private key not configured, push notifications disabled");
            None
        } else {
            Some(VapidKeys::from_base64_private(config.vapid_private_key.trim())?)
        };

        Ok(Self {
            client,
            keys,
            subject: config.subject.clone(),
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Public key for browser subscriptions, when configured
    pub fn public_key(&self) -> Option<String> {
        self.keys.as_ref().map(VapidKeys::public_key_base64)
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    #[tracing::instrument(skip(self, subscription, payload), fields(endpoint = %subscription.endpoint))]
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &str,
    ) -> Result<(), ChannelError> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("VAPID keys are not set".to_string()))?;

        let endpoint = Url::parse(&subscription.endpoint).map_err(|e| {
            ChannelError::InvalidSubscription(format!("invalid endpoint: {}", e))
        })?;
        let audience = endpoint.origin().ascii_serialization();

        let ua_public = decode_base64url(&subscription.keys.p256dh)
            .map_err(|e| ChannelError::InvalidSubscription(format!("p256dh: {}", e)))?;
        let auth_secret = decode_base64url(&subscription.keys.auth)
            .map_err(|e| ChannelError::InvalidSubscription(format!("auth: {}", e)))?;

        let body = encrypt_payload(&ua_public, &auth_secret, payload.as_bytes())?;

        let expires_at = (Utc::now() + chrono::Duration::hours(JWT_VALIDITY_HOURS)).timestamp();
        let token = keys.sign_token(&audience, &self.subject, expires_at)?;

        let response = self
            .client
            .post(endpoint)
            .header("TTL", self.ttl_seconds.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header(
                "Authorization",
                format!("vapid t={}, k={}", token, keys.public_key_base64()),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(ChannelError::SubscriptionGone(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(status = status.as_u16(), "Push message accepted");
        Ok(())
    }
}

/// Encrypt `payload` for one subscription as a single aes128gcm record.
///
/// Output layout: `salt(16) | rs(4, BE) | idlen(1) | keyid(65) | ciphertext`,
/// where keyid is the ephemeral application server public key.
pub fn encrypt_payload(
    ua_public: &[u8],
    auth_secret: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>, ChannelError> {
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(ChannelError::InvalidSubscription(format!(
            "auth secret must be {} bytes, got {}",
            AUTH_SECRET_LEN,
            auth_secret.len()
        )));
    }
    let ua_key = PublicKey::from_sec1_bytes(ua_public).map_err(|_| {
        ChannelError::InvalidSubscription("p256dh is not a P-256 public key".to_string())
    })?;
    // Padding delimiter plus tag must fit in one record
    if payload.len() + 1 + TAG_LEN > RECORD_SIZE as usize {
        return Err(ChannelError::Encryption(format!(
            "payload of {} bytes exceeds a single record",
            payload.len()
        )));
    }

    let as_secret = SecretKey::random(&mut OsRng);
    let as_public = as_secret.public_key().to_encoded_point(false);
    let ua_public = ua_key.to_encoded_point(false);

    let shared = p256::ecdh::diffie_hellman(as_secret.to_nonzero_scalar(), ua_key.as_affine());

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let (cek, nonce) = derive_content_keys(
        shared.raw_secret_bytes(),
        auth_secret,
        ua_public.as_bytes(),
        as_public.as_bytes(),
        &salt,
    )?;

    let mut plaintext = Vec::with_capacity(payload.len() + 1);
    plaintext.extend_from_slice(payload);
    plaintext.push(0x02);

    let cipher = <Aes128Gcm as KeyInit>::new_from_slice(&cek)
        .map_err(|e| ChannelError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|e| ChannelError::Encryption(e.to_string()))?;

    let mut body = Vec::with_capacity(SALT_LEN + 5 + PUBLIC_KEY_LEN + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(PUBLIC_KEY_LEN as u8);
    body.extend_from_slice(as_public.as_bytes());
    body.extend_from_slice(&ciphertext);
    Ok(body)
}

/// Content encryption key and nonce from the ECDH secret (RFC 8291 section 3.4)
pub fn derive_content_keys(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12]), ChannelError> {
    let prk_key = hmac_sha256(auth_secret, &[ecdh_secret])?;
    let ikm = hmac_sha256(&prk_key, &[KEY_INFO, ua_public, as_public, COUNTER])?;
    let prk = hmac_sha256(salt, &[&ikm])?;

    let cek_full = hmac_sha256(&prk, &[CEK_INFO, COUNTER])?;
    let nonce_full = hmac_sha256(&prk, &[NONCE_INFO, COUNTER])?;

    let mut cek = [0u8; 16];
    cek.copy_from_slice(&cek_full[..16]);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&nonce_full[..12]);
    Ok((cek, nonce))
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 32], ChannelError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| ChannelError::Encryption(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Browsers hand out keys as unpadded base64url; tolerate padding and the standard alphabet
fn decode_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = value
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

    fn decrypt(body: &[u8], ua_secret: &SecretKey, auth_secret: &[u8]) -> Vec<u8> {
        let salt = &body[..16];
        let rs = u32::from_be_bytes([body[16], body[17], body[18], body[19]]);
        assert_eq!(rs, RECORD_SIZE);
        let id_len = body[20] as usize;
        let as_public = &body[21..21 + id_len];
        let ciphertext = &body[21 + id_len..];

        let as_key = PublicKey::from_sec1_bytes(as_public).unwrap();
        let shared = p256::ecdh::diffie_hellman(ua_secret.to_nonzero_scalar(), as_key.as_affine());
        let ua_public = ua_secret.public_key().to_encoded_point(false);

        let (cek, nonce) = derive_content_keys(
            shared.raw_secret_bytes(),
            auth_secret,
            ua_public.as_bytes(),
            as_public,
            salt,
        )
        .unwrap();

        let cipher = <Aes128Gcm as KeyInit>::new_from_slice(&cek).unwrap();
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .unwrap()
    }

    #[test]
    fn test_encrypted_payload_decrypts_with_subscription_keys() {
        let ua_secret = SecretKey::random(&mut OsRng);
        let ua_public = ua_secret.public_key().to_encoded_point(false);
        let mut auth = [0u8; 16];
        OsRng.fill_bytes(&mut auth);

        let message = "URGENT: Medicine Aspirin will expire tomorrow on March 11, 2025";
        let body = encrypt_payload(ua_public.as_bytes(), &auth, message.as_bytes()).unwrap();

        let plaintext = decrypt(&body, &ua_secret, &auth);
        assert_eq!(plaintext.last(), Some(&0x02));
        assert_eq!(&plaintext[..plaintext.len() - 1], message.as_bytes());
    }

    #[test]
    fn test_each_encryption_uses_fresh_salt_and_key() {
        let ua_secret = SecretKey::random(&mut OsRng);
        let ua_public = ua_secret.public_key().to_encoded_point(false);
        let auth = [7u8; 16];

        let a = encrypt_payload(ua_public.as_bytes(), &auth, b"hello").unwrap();
        let b = encrypt_payload(ua_public.as_bytes(), &auth, b"hello").unwrap();
        assert_ne!(a[..16], b[..16]);
        assert_ne!(a[21..86], b[21..86]);
    }

    #[test]
    fn test_rejects_bad_subscription_keys() {
        let err = encrypt_payload(&[4u8; 65], &[0u8; 16], b"x").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidSubscription(_)));

        let ua_secret = SecretKey::random(&mut OsRng);
        let ua_public = ua_secret.public_key().to_encoded_point(false);
        let err = encrypt_payload(ua_public.as_bytes(), &[0u8; 8], b"x").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidSubscription(_)));
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let ua_secret = SecretKey::random(&mut OsRng);
        let ua_public = ua_secret.public_key().to_encoded_point(false);
        let payload = vec![b'a'; RECORD_SIZE as usize];
        let err = encrypt_payload(ua_public.as_bytes(), &[1u8; 16], &payload).unwrap_err();
        assert!(matches!(err, ChannelError::Encryption(_)));
    }

    #[test]
    fn test_vapid_token_verifies_with_public_key() {
        let secret = SecretKey::random(&mut OsRng);
        let encoded = URL_SAFE_NO_PAD.encode(secret.to_bytes());
        let keys = VapidKeys::from_base64_private(&encoded).unwrap();

        let expires_at = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = keys
            .sign_token("https://fcm.googleapis.com", "mailto:a@b.com", expires_at)
            .unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::ES256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));

        let public = URL_SAFE_NO_PAD.decode(keys.public_key_base64()).unwrap();
        assert_eq!(public.len(), 65);
        let x = URL_SAFE_NO_PAD.encode(&public[1..33]);
        let y = URL_SAFE_NO_PAD.encode(&public[33..]);
        let decoding_key = DecodingKey::from_ec_components(&x, &y).unwrap();

        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_audience(&["https://fcm.googleapis.com"]);
        let claims = decode::<serde_json::Value>(&token, &decoding_key, &validation)
            .unwrap()
            .claims;
        assert_eq!(claims["aud"], "https://fcm.googleapis.com");
        assert_eq!(claims["sub"], "mailto:a@b.com");
        assert_eq!(claims["exp"], expires_at);
    }

    #[test]
    fn test_invalid_private_key_is_not_configured() {
        assert!(matches!(
            VapidKeys::from_base64_private("not base64!"),
            Err(ChannelError::NotConfigured(_))
        ));
        assert!(matches!(
            VapidKeys::from_base64_private(&URL_SAFE_NO_PAD.encode([0u8; 32])),
            Err(ChannelError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_decode_accepts_padded_standard_alphabet() {
        let bytes = vec![0xfb, 0xff, 0x01];
        let standard = base64::engine::general_purpose::STANDARD.encode(&bytes);
        assert_eq!(decode_base64url(&standard).unwrap(), bytes);
    }
}
