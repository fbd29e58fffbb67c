//! Message transport seam.
//!
//! A [`Transport`] delivers one [`OutboundMessage`] to an external
//! provider and returns the provider's message id. Implementations cover
//! WhatsApp ([`whatsapp::WhatsAppTransport`]) and SMTP email
//! ([`email::EmailTransport`]); [`ChannelRouter`] picks one by channel.
//! Attachment delivery is the transport's responsibility — the engine
//! only carries the reference.

pub mod email;
pub mod whatsapp;

use async_trait::async_trait;
use meridian_core::channels::Channel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// An optional file riding along with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub file_name: String,
    /// Where the transport can fetch the content.
    pub url: String,
}

/// One message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub channel: Channel,
    /// Phone number (WhatsApp) or email address.
    pub recipient: String,
    /// Email subject; ignored by the WhatsApp transport.
    pub subject: Option<String>,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// What the provider handed back for a successful send.
#[derive(Debug, Clone)]
pub struct ProviderReceipt {
    pub message_id: String,
}

/// Error type for transport failures.
///
/// Never crosses the engine boundary: the sender records it on the log
/// row as the failure reason.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying HTTP request failed (network, DNS, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider returned HTTP {0}")]
    HttpStatus(u16),

    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The message was rejected before any network call.
    #[error("Message rejected: {0}")]
    Rejected(String),

    /// The send did not finish within the configured bound.
    #[error("Transport timed out after {0:?}")]
    Timeout(Duration),
}

/// A delivery channel capable of sending one message.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver the message, returning the provider message id.
    async fn send(&self, message: &OutboundMessage) -> Result<ProviderReceipt, TransportError>;

    /// Channel name for logging (e.g. `"whatsapp"`, `"email"`).
    fn name(&self) -> &'static str;
}

/// Stand-in for a channel whose provider is not configured.
///
/// Every send is rejected before any network call, so the failure lands
/// on the log row like any other transport error instead of crashing the
/// server at startup.
pub struct DisabledTransport {
    channel: &'static str,
}

impl DisabledTransport {
    pub fn new(channel: &'static str) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Transport for DisabledTransport {
    async fn send(&self, _message: &OutboundMessage) -> Result<ProviderReceipt, TransportError> {
        Err(TransportError::Rejected(format!(
            "{} delivery is not configured",
            self.channel
        )))
    }

    fn name(&self) -> &'static str {
        self.channel
    }
}

/// Routes each message to the transport for its channel.
pub struct ChannelRouter {
    whatsapp: Arc<dyn Transport>,
    email: Arc<dyn Transport>,
}

impl ChannelRouter {
    pub fn new(whatsapp: Arc<dyn Transport>, email: Arc<dyn Transport>) -> Self {
        Self { whatsapp, email }
    }
}

#[async_trait]
impl Transport for ChannelRouter {
    async fn send(&self, message: &OutboundMessage) -> Result<ProviderReceipt, TransportError> {
        match message.channel {
            Channel::Whatsapp => self.whatsapp.send(message).await,
            Channel::Email => self.email.send(message).await,
        }
    }

    fn name(&self) -> &'static str {
        "router"
    }
}
