//! Protocol message envelope types.
//!
//! These mirror the wire shape of the chat protocol's message events
//! (camelCase JSON), so a serialized envelope can be forwarded to the
//! webhook destination unchanged.

use serde::{Deserialize, Serialize};

use crate::jid;
use crate::poll::PollContent;

/// Serde adapter for optional binary fields carried as base64 strings.
pub(crate) mod base64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => ser.serialize_some(&STANDARD.encode(b)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(de)?;
        value
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Addressing key of a protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// JID of the conversation the message belongs to.
    pub remote_jid: String,
    /// Protocol-assigned message id, unique within the conversation.
    pub id: String,
    /// Whether the message was sent by this session's own account.
    #[serde(default)]
    pub from_me: bool,
    /// Sender JID inside a group conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    /// Alternate (phone-number form) sender JID, when the primary
    /// participant is a linked identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_alt: Option<String>,
}

impl MessageKey {
    /// Sender identity used for authorization and API calls: the
    /// alternate participant when present, else the conversation JID.
    pub fn sender(&self) -> &str {
        self.participant_alt
            .as_deref()
            .unwrap_or(&self.remote_jid)
    }
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Error,
    Pending,
    ServerAck,
    DeliveryAck,
    Read,
    Played,
}

impl MessageStatus {
    /// Maps the protocol's numeric status code to a status, if known.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Error),
            1 => Some(Self::Pending),
            2 => Some(Self::ServerAck),
            3 => Some(Self::DeliveryAck),
            4 => Some(Self::Read),
            5 => Some(Self::Played),
            _ => None,
        }
    }
}

/// Context carried by a reply message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    /// JID of the author of the quoted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    /// Id of the quoted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stanza_id: Option<String>,
    /// Body of the quoted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message: Option<Box<MessageContent>>,
}

/// Text message with reply context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedText {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Media message payload.
///
/// Binary fields travel base64-encoded so a serialized envelope matches
/// the webhook wire format without further conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub media_key: Option<Vec<u8>>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<Vec<u8>>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub file_enc_sha256: Option<Vec<u8>>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub jpeg_thumbnail: Option<Vec<u8>>,
    /// Full media body, base64-encoded. Absent on the wire; filled by the
    /// router when webhook media embedding is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_base64: Option<String>,
}

/// Message body, keyed by the protocol's message-type tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageContent {
    #[serde(rename = "conversation")]
    Conversation(String),
    #[serde(rename = "extendedTextMessage")]
    ExtendedText(ExtendedText),
    #[serde(rename = "imageMessage")]
    Image(MediaContent),
    #[serde(rename = "videoMessage")]
    Video(MediaContent),
    #[serde(rename = "audioMessage")]
    Audio(MediaContent),
    #[serde(rename = "documentMessage")]
    Document(MediaContent),
    #[serde(rename = "pollCreationMessage")]
    Poll(PollContent),
    /// Any message type the router does not inspect, forwarded verbatim.
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl MessageContent {
    /// The protocol message-type tag for this body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conversation(_) => "conversation",
            Self::ExtendedText(_) => "extendedTextMessage",
            Self::Image(_) => "imageMessage",
            Self::Video(_) => "videoMessage",
            Self::Audio(_) => "audioMessage",
            Self::Document(_) => "documentMessage",
            Self::Poll(_) => "pollCreationMessage",
            Self::Other(_) => "unknown",
        }
    }

    /// Plain text carried by this body, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Conversation(text) => Some(text),
            Self::ExtendedText(ext) => Some(&ext.text),
            _ => None,
        }
    }

    /// Media payload carried by this body, if any.
    pub fn media(&self) -> Option<&MediaContent> {
        match self {
            Self::Image(m) | Self::Video(m) | Self::Audio(m) | Self::Document(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable media payload, used for base64 enrichment.
    pub fn media_mut(&mut self) -> Option<&mut MediaContent> {
        match self {
            Self::Image(m) | Self::Video(m) | Self::Audio(m) | Self::Document(m) => Some(m),
            _ => None,
        }
    }

    /// Reply context carried by this body, if any.
    pub fn context_info(&self) -> Option<&ContextInfo> {
        match self {
            Self::ExtendedText(ext) => ext.context_info.as_ref(),
            _ => None,
        }
    }
}

/// A protocol message event as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub key: MessageKey,
    #[serde(rename = "message")]
    pub content: MessageContent,
    /// Unix timestamp (seconds) the message was sent.
    #[serde(rename = "messageTimestamp")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

impl MessageEnvelope {
    /// Plain text of the message, if it is a text message.
    pub fn text(&self) -> Option<&str> {
        self.content.text()
    }

    /// Whether the message was posted in a group conversation.
    pub fn is_group(&self) -> bool {
        jid::is_group(&self.key.remote_jid)
    }

    /// Whether the message is older than `threshold_secs` relative to
    /// `now` (unix seconds). A message exactly at the threshold counts
    /// as stale.
    pub fn is_stale(&self, now: i64, threshold_secs: i64) -> bool {
        now - self.timestamp >= threshold_secs
    }

    /// The quoted image of a reply message, if the message replies to an
    /// image.
    pub fn quoted_image(&self) -> Option<(&ContextInfo, &MediaContent)> {
        let ctx = self.content.context_info()?;
        match ctx.quoted_message.as_deref() {
            Some(MessageContent::Image(media)) => Some((ctx, media)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(jid: &str) -> MessageKey {
        MessageKey {
            remote_jid: jid.to_string(),
            id: "ABC123".to_string(),
            from_me: false,
            participant: None,
            participant_alt: None,
        }
    }

    fn text_envelope(jid: &str, text: &str, timestamp: i64) -> MessageEnvelope {
        MessageEnvelope {
            key: key(jid),
            content: MessageContent::Conversation(text.to_string()),
            timestamp,
            push_name: None,
            status: None,
        }
    }

    #[test]
    fn test_content_serializes_with_protocol_tags() {
        let content = MessageContent::Image(MediaContent {
            mimetype: "image/jpeg".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["imageMessage"]["mimetype"], "image/jpeg");
    }

    #[test]
    fn test_binary_fields_roundtrip_as_base64() {
        let content = MessageContent::Image(MediaContent {
            mimetype: "image/jpeg".to_string(),
            file_sha256: Some(vec![1, 2, 3, 4]),
            ..Default::default()
        });
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["imageMessage"]["fileSha256"], "AQIDBA==");

        let back: MessageContent = serde_json::from_value(json).unwrap();
        assert_eq!(back.media().unwrap().file_sha256, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_unknown_content_survives_verbatim() {
        let raw = serde_json::json!({"stickerMessage": {"isAnimated": true}});
        let content: MessageContent = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(content, MessageContent::Other(_)));
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);
    }

    #[test]
    fn test_sender_prefers_participant_alt() {
        let mut k = key("123-456@g.us");
        k.participant_alt = Some("628512@s.whatsapp.net".to_string());
        assert_eq!(k.sender(), "628512@s.whatsapp.net");

        let plain = key("628512@s.whatsapp.net");
        assert_eq!(plain.sender(), "628512@s.whatsapp.net");
    }

    #[test]
    fn test_staleness_boundary() {
        let msg = text_envelope("1@s.whatsapp.net", "hi", 1_000);
        // Exactly at the threshold is stale.
        assert!(msg.is_stale(1_060, 60));
        assert!(!msg.is_stale(1_059, 60));
        assert!(!msg.is_stale(1_000, 60));
    }

    #[test]
    fn test_quoted_image() {
        let envelope = MessageEnvelope {
            key: key("123-456@g.us"),
            content: MessageContent::ExtendedText(ExtendedText {
                text: "#jurnal 7h aljabar".to_string(),
                context_info: Some(ContextInfo {
                    participant: Some("9@lid".to_string()),
                    stanza_id: Some("Q1".to_string()),
                    quoted_message: Some(Box::new(MessageContent::Image(MediaContent {
                        mimetype: "image/png".to_string(),
                        ..Default::default()
                    }))),
                }),
            }),
            timestamp: 0,
            push_name: None,
            status: None,
        };

        let (ctx, media) = envelope.quoted_image().unwrap();
        assert_eq!(ctx.participant.as_deref(), Some("9@lid"));
        assert_eq!(media.mimetype, "image/png");
    }

    #[test]
    fn test_status_from_code() {
        assert_eq!(MessageStatus::from_code(4), Some(MessageStatus::Read));
        assert_eq!(MessageStatus::from_code(9), None);
        let json = serde_json::to_string(&MessageStatus::DeliveryAck).unwrap();
        assert_eq!(json, "\"DELIVERY_ACK\"");
    }
}
