use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which side of the conversation produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Transport a message travelled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryChannel {
    Whatsapp,
    Sms,
}

/// Delivery status recorded when the message is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Append-only conversation log entry. The most recent messages of a
/// patient are the only conversational memory the assistant has.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub direction: Direction,
    pub channel: DeliveryChannel,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

/// Message about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub direction: Direction,
    pub channel: DeliveryChannel,
    pub content: String,
    pub status: MessageStatus,
}

impl NewMessage {
    /// Outbound WhatsApp message, recorded as sent.
    pub fn outbound(patient_id: Uuid, doctor_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            patient_id,
            doctor_id,
            direction: Direction::Outbound,
            channel: DeliveryChannel::Whatsapp,
            content: content.into(),
            status: MessageStatus::Sent,
        }
    }

    /// Inbound WhatsApp message, recorded as delivered.
    pub fn inbound(patient_id: Uuid, doctor_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            patient_id,
            doctor_id,
            direction: Direction::Inbound,
            channel: DeliveryChannel::Whatsapp,
            content: content.into(),
            status: MessageStatus::Delivered,
        }
    }
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(
                        "unknown {} value '{}'",
                        stringify!($ty),
                        other
                    )),
                }
            }
        }
    };
}

text_enum!(Direction {
    Inbound => "INBOUND",
    Outbound => "OUTBOUND",
});

text_enum!(DeliveryChannel {
    Whatsapp => "WHATSAPP",
    Sms => "SMS",
});

text_enum!(MessageStatus {
    Sent => "SENT",
    Delivered => "DELIVERED",
    Read => "READ",
    Failed => "FAILED",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_values_match_database_encoding() {
        assert_eq!(Direction::Outbound.as_str(), "OUTBOUND");
        assert_eq!("INBOUND".parse::<Direction>(), Ok(Direction::Inbound));
        assert_eq!("SMS".parse::<DeliveryChannel>(), Ok(DeliveryChannel::Sms));
        assert!("sent".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn serde_uses_upper_case_names() {
        let json = serde_json::to_value(MessageStatus::Delivered).unwrap();
        assert_eq!(json, serde_json::json!("DELIVERED"));
    }

    #[test]
    fn inbound_messages_are_recorded_as_delivered() {
        let msg = NewMessage::inbound(Uuid::new_v4(), Uuid::new_v4(), "hi");
        assert_eq!(msg.direction, Direction::Inbound);
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.channel, DeliveryChannel::Whatsapp);
    }
}
