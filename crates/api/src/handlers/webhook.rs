//! Inbound provider webhooks for delivery status.
//!
//! Both endpoints take the raw body so the HMAC signature (when a secret
//! is configured) is verified over exactly the bytes the provider signed.
//! Provider vocabulary is constrained per channel by the payload enums;
//! canonicalisation (`opened → read`, `bounced → failed`) happens in the
//! reconciler. Failures are isolated per call: a malformed payload is
//! logged with its raw bytes and answers 422 without touching state.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use meridian_core::error::CoreError;
use meridian_core::types::{DbId, Timestamp};
use meridian_notify::reconciler::WebhookMeta;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Header carrying the hex-encoded HMAC-SHA256 of the raw request body.
const SIGNATURE_HEADER: &str = "x-webhook-signature";

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Status vocabulary of the WhatsApp provider.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhatsAppStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl WhatsAppStatus {
    fn as_str(self) -> &'static str {
        match self {
            WhatsAppStatus::Sent => "sent",
            WhatsAppStatus::Delivered => "delivered",
            WhatsAppStatus::Read => "read",
            WhatsAppStatus::Failed => "failed",
        }
    }
}

/// `POST /webhooks/whatsapp/status` body.
#[derive(Debug, Deserialize)]
pub struct WhatsAppStatusPayload {
    pub log_id: DbId,
    pub status: WhatsAppStatus,
    /// Provider event time; accepted but not authoritative.
    pub timestamp: Option<Timestamp>,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

/// Status vocabulary of the email provider. `opened` and `bounced` are
/// mapped to canonical `read`/`failed` by the reconciler.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Delivered,
    Opened,
    Bounced,
    Failed,
}

impl EmailStatus {
    fn as_str(self) -> &'static str {
        match self {
            EmailStatus::Sent => "sent",
            EmailStatus::Delivered => "delivered",
            EmailStatus::Opened => "opened",
            EmailStatus::Bounced => "bounced",
            EmailStatus::Failed => "failed",
        }
    }
}

/// `POST /webhooks/email/status` body.
#[derive(Debug, Deserialize)]
pub struct EmailStatusPayload {
    pub log_id: DbId,
    pub status: EmailStatus,
    pub timestamp: Option<Timestamp>,
    pub email_id: Option<String>,
    pub bounce_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/whatsapp/status
pub async fn whatsapp_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    if let Some(secret) = &state.config.webhook_secret {
        verify_signature(secret, &headers, &body)?;
    }
    let payload: WhatsAppStatusPayload = parse_payload(&body)?;

    let outcome = state
        .reconciler
        .apply_webhook_status(
            payload.log_id,
            payload.status.as_str(),
            WebhookMeta {
                provider_message_id: payload.message_id,
                error_reason: payload.error,
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "log_id": outcome.log_id,
        "new_status": outcome.new_status,
    })))
}

/// POST /api/v1/webhooks/email/status
pub async fn email_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    if let Some(secret) = &state.config.webhook_secret {
        verify_signature(secret, &headers, &body)?;
    }
    let payload: EmailStatusPayload = parse_payload(&body)?;

    let outcome = state
        .reconciler
        .apply_webhook_status(
            payload.log_id,
            payload.status.as_str(),
            WebhookMeta {
                provider_message_id: payload.email_id,
                error_reason: payload.bounce_reason,
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "log_id": outcome.log_id,
        "new_status": outcome.new_status,
    })))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Parse a webhook body, logging the raw payload on failure for diagnosis.
fn parse_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(
            error = %e,
            raw = %String::from_utf8_lossy(body),
            "Malformed webhook payload"
        );
        CoreError::Validation(format!("Malformed webhook payload: {e}")).into()
    })
}

/// Verify the HMAC-SHA256 signature over the raw body.
///
/// Any missing header, malformed hex, or mismatch yields
/// [`CoreError::SignatureInvalid`]; the caller never reaches the
/// reconciler, so no state is mutated on a failed check.
fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), CoreError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(CoreError::SignatureInvalid)?;
    let provided = decode_hex(provided).ok_or(CoreError::SignatureInvalid)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| CoreError::SignatureInvalid)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| CoreError::SignatureInvalid)
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    fn headers_with_signature(signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
        headers
    }

    #[test]
    fn accepts_a_valid_signature() {
        let body = br#"{"log_id": 1, "status": "read"}"#;
        let headers = headers_with_signature(&sign("s3cret", body));
        assert!(verify_signature("s3cret", &headers, body).is_ok());
    }

    #[test]
    fn rejects_tampered_body_missing_header_and_bad_hex() {
        let body = br#"{"log_id": 1, "status": "read"}"#;
        let headers = headers_with_signature(&sign("s3cret", body));
        assert_matches!(
            verify_signature("s3cret", &headers, br#"{"log_id": 2, "status": "read"}"#),
            Err(CoreError::SignatureInvalid)
        );
        assert_matches!(
            verify_signature("s3cret", &HeaderMap::new(), body),
            Err(CoreError::SignatureInvalid)
        );
        assert_matches!(
            verify_signature("s3cret", &headers_with_signature("zz!!"), body),
            Err(CoreError::SignatureInvalid)
        );
    }

    #[test]
    fn whatsapp_payload_rejects_email_vocabulary() {
        let ok: WhatsAppStatusPayload =
            serde_json::from_str(r#"{"log_id": 42, "status": "delivered"}"#).unwrap();
        assert_eq!(ok.log_id, 42);
        assert_eq!(ok.status.as_str(), "delivered");

        // `opened` belongs to the email provider only.
        assert!(serde_json::from_str::<WhatsAppStatusPayload>(
            r#"{"log_id": 42, "status": "opened"}"#
        )
        .is_err());
    }

    #[test]
    fn email_payload_carries_bounce_metadata() {
        let payload: EmailStatusPayload = serde_json::from_str(
            r#"{"log_id": 7, "status": "bounced", "email_id": "em-1", "bounce_reason": "mailbox full"}"#,
        )
        .unwrap();
        assert_eq!(payload.status.as_str(), "bounced");
        assert_eq!(payload.bounce_reason.as_deref(), Some("mailbox full"));

        // The canonical mapping downstream turns `opened` into `read`.
        use meridian_core::status::DeliveryStatus;
        assert_eq!(
            DeliveryStatus::from_provider(EmailStatus::Opened.as_str()),
            Some(DeliveryStatus::Read)
        );
        assert_eq!(
            DeliveryStatus::from_provider(EmailStatus::Bounced.as_str()),
            Some(DeliveryStatus::Failed)
        );
    }

    #[test]
    fn malformed_payload_maps_to_validation_error() {
        let err = parse_payload::<WhatsAppStatusPayload>(b"{not json").unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::Validation(_)));
    }
}
