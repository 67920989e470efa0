use chat_core::{ChatError, MessageType};
use serde::Deserialize;

/// Preview text shown in the conversation list for voice messages.
pub const VOICE_PREVIEW: &str = "🎤 Voice message";

/// Quoted-message snapshot supplied by the client. Stored verbatim as a
/// denormalized copy; never re-resolved against the quoted message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySnapshot {
    pub message_id: i64,
    pub text: String,
    pub sender_id: String,
}

/// Raw message payload as received from the API layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageInput {
    pub message_type: Option<String>,
    pub text: Option<String>,
    pub voice_url: Option<String>,
    pub voice_duration: Option<f64>,
    pub reply_to: Option<ReplySnapshot>,
}

/// Validated, trimmed content ready for persistence.
#[derive(Debug, Clone)]
pub struct ValidatedContent {
    pub message_type: MessageType,
    pub text: String,
    pub voice_url: Option<String>,
    pub voice_duration: Option<f64>,
    pub reply_to: Option<ReplySnapshot>,
    pub preview: String,
}

impl NewMessageInput {
    pub fn validate(self) -> Result<ValidatedContent, ChatError> {
        let message_type = match self.message_type.as_deref() {
            None => MessageType::Text,
            Some(raw) => MessageType::parse(raw)
                .ok_or_else(|| ChatError::invalid_input("unknown message type"))?,
        };

        match message_type {
            MessageType::Voice => {
                let voice_url = self
                    .voice_url
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| ChatError::invalid_input("voice URL is required"))?;
                Ok(ValidatedContent {
                    message_type,
                    text: String::new(),
                    voice_url: Some(voice_url),
                    voice_duration: self.voice_duration,
                    reply_to: self.reply_to,
                    preview: VOICE_PREVIEW.to_string(),
                })
            }
            // Text, and image for lack of a dedicated branch, require
            // non-empty text after trimming.
            MessageType::Text | MessageType::Image => {
                let text = self.text.map(|t| t.trim().to_string()).unwrap_or_default();
                if text.is_empty() {
                    return Err(ChatError::invalid_input("message text is required"));
                }
                Ok(ValidatedContent {
                    message_type,
                    preview: text.clone(),
                    text,
                    voice_url: None,
                    voice_duration: None,
                    reply_to: self.reply_to,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_trimmed_and_previewed() {
        let content = NewMessageInput {
            text: Some("  hi ".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(content.text, "hi");
        assert_eq!(content.preview, "hi");
        assert_eq!(content.message_type, MessageType::Text);
    }

    #[test]
    fn whitespace_only_text_is_rejected() {
        let err = NewMessageInput {
            text: Some("   ".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }

    #[test]
    fn voice_requires_url() {
        let err = NewMessageInput {
            message_type: Some("voice".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }

    #[test]
    fn voice_uses_fixed_preview() {
        let content = NewMessageInput {
            message_type: Some("voice".to_string()),
            voice_url: Some("voice/abc.m4a".to_string()),
            voice_duration: Some(3.5),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(content.preview, VOICE_PREVIEW);
        assert_eq!(content.text, "");
        assert_eq!(content.voice_duration, Some(3.5));
    }

    #[test]
    fn image_passes_through_the_text_branch() {
        // No dedicated image validation exists; it behaves like text.
        let err = NewMessageInput {
            message_type: Some("image".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));

        let content = NewMessageInput {
            message_type: Some("image".to_string()),
            text: Some("photo caption".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(content.message_type, MessageType::Image);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = NewMessageInput {
            message_type: Some("gif".to_string()),
            text: Some("x".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }
}
