//! WhatsApp delivery via the provider HTTP API.
//!
//! [`WhatsAppTransport`] POSTs a JSON message to the configured gateway
//! and reads the provider message id out of the response. Configuration
//! is loaded from environment variables; if `WHATSAPP_API_URL` is not
//! set, [`WhatsAppConfig::from_env`] returns `None` and no transport
//! should be constructed.

use std::time::Duration;

use serde::Deserialize;

use super::{OutboundMessage, ProviderReceipt, Transport, TransportError};

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// WhatsAppConfig
// ---------------------------------------------------------------------------

/// Configuration for the WhatsApp gateway transport.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Base URL of the message endpoint.
    pub api_url: String,
    /// Bearer token for the gateway.
    pub api_token: String,
    /// Sender phone number id, if the gateway requires one.
    pub sender_id: Option<String>,
}

impl WhatsAppConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `WHATSAPP_API_URL` is not set, signalling that
    /// WhatsApp delivery is not configured.
    ///
    /// | Variable             | Required | Default |
    /// |----------------------|----------|---------|
    /// | `WHATSAPP_API_URL`   | yes      | —       |
    /// | `WHATSAPP_API_TOKEN` | no       | empty   |
    /// | `WHATSAPP_SENDER_ID` | no       | —       |
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var("WHATSAPP_API_URL").ok()?;
        Some(Self {
            api_url,
            api_token: std::env::var("WHATSAPP_API_TOKEN").unwrap_or_default(),
            sender_id: std::env::var("WHATSAPP_SENDER_ID").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// WhatsAppTransport
// ---------------------------------------------------------------------------

/// Response body of a successful gateway send.
#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

/// Sends WhatsApp messages through the configured HTTP gateway.
pub struct WhatsAppTransport {
    client: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppTransport {
    /// Create a new transport with a pre-configured HTTP client.
    pub fn new(config: WhatsAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl Transport for WhatsAppTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<ProviderReceipt, TransportError> {
        if message.recipient.trim().is_empty() {
            return Err(TransportError::Rejected(
                "recipient has no phone number on file".to_string(),
            ));
        }

        let mut payload = serde_json::json!({
            "to": message.recipient,
            "body": message.body,
        });
        if let Some(sender) = &self.config.sender_id {
            payload["from"] = serde_json::Value::String(sender.clone());
        }
        if let Some(attachment) = &message.attachment {
            payload["attachment"] = serde_json::json!({
                "file_name": attachment.file_name,
                "url": attachment.url,
            });
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        let parsed: SendResponse = response.json().await?;
        tracing::debug!(
            to = %message.recipient,
            message_id = %parsed.message_id,
            "WhatsApp message accepted by gateway"
        );

        Ok(ProviderReceipt {
            message_id: parsed.message_id,
        })
    }

    fn name(&self) -> &'static str {
        "whatsapp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::channels::Channel;

    fn transport() -> WhatsAppTransport {
        WhatsAppTransport::new(WhatsAppConfig {
            api_url: "http://localhost:9/messages".to_string(),
            api_token: "token".to_string(),
            sender_id: None,
        })
    }

    #[tokio::test]
    async fn empty_recipient_is_rejected_without_network() {
        let message = OutboundMessage {
            channel: Channel::Whatsapp,
            recipient: "  ".to_string(),
            subject: None,
            body: "hi".to_string(),
            attachment: None,
        };
        let err = transport().send(&message).await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
    }

    #[test]
    fn transport_error_display_http_status() {
        let err = TransportError::HttpStatus(502);
        assert_eq!(err.to_string(), "Provider returned HTTP 502");
    }
}
