//! Delivery channel names.
//!
//! These must match the channel values stored in the
//! `message_templates.channel` and `notification_logs.channel` columns and
//! referenced by the transports and API handlers.

use serde::{Deserialize, Serialize};

/// WhatsApp message delivered via the provider HTTP API.
pub const CHANNEL_WHATSAPP: &str = "whatsapp";

/// Email delivered via SMTP.
pub const CHANNEL_EMAIL: &str = "email";

/// Template is usable on both channels; the send picks one.
pub const CHANNEL_BOTH: &str = "both";

/// A concrete delivery channel for a single outbound message.
///
/// `both` is a template-level notion only — every individual send resolves
/// to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Email,
}

impl Channel {
    /// Canonical column value for this channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Whatsapp => CHANNEL_WHATSAPP,
            Channel::Email => CHANNEL_EMAIL,
        }
    }

    /// Parse a stored channel value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            CHANNEL_WHATSAPP => Some(Channel::Whatsapp),
            CHANNEL_EMAIL => Some(Channel::Email),
            _ => None,
        }
    }
}

/// The channel set a template may be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateChannel {
    Whatsapp,
    Email,
    Both,
}

impl TemplateChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateChannel::Whatsapp => CHANNEL_WHATSAPP,
            TemplateChannel::Email => CHANNEL_EMAIL,
            TemplateChannel::Both => CHANNEL_BOTH,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            CHANNEL_WHATSAPP => Some(TemplateChannel::Whatsapp),
            CHANNEL_EMAIL => Some(TemplateChannel::Email),
            CHANNEL_BOTH => Some(TemplateChannel::Both),
            _ => None,
        }
    }

    /// Whether a template with this channel setting may be sent on `channel`.
    pub fn allows(self, channel: Channel) -> bool {
        match self {
            TemplateChannel::Both => true,
            TemplateChannel::Whatsapp => channel == Channel::Whatsapp,
            TemplateChannel::Email => channel == Channel::Email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_column_values() {
        assert_eq!(Channel::parse("whatsapp"), Some(Channel::Whatsapp));
        assert_eq!(Channel::parse("email"), Some(Channel::Email));
        assert_eq!(Channel::parse("sms"), None);
        assert_eq!(Channel::Whatsapp.as_str(), "whatsapp");
    }

    #[test]
    fn both_allows_either_channel() {
        assert!(TemplateChannel::Both.allows(Channel::Whatsapp));
        assert!(TemplateChannel::Both.allows(Channel::Email));
        assert!(!TemplateChannel::Email.allows(Channel::Whatsapp));
        assert!(TemplateChannel::Whatsapp.allows(Channel::Whatsapp));
    }
}
