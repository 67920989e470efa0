use chat_core::Message;
use serde::Serialize;
use uuid::Uuid;

/// Event envelope delivered to every live connection in a user's room.
/// Emit-only: connections receive it as opaque JSON, nothing parses it back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    #[serde(rename_all = "camelCase")]
    NewMessage { message: Message, sender_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Typing { sender_id: Uuid, is_typing: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn typing_event_shape() {
        let sender = Uuid::from_bytes([7; 16]);
        let event = RealtimeEvent::Typing {
            sender_id: sender,
            is_typing: true,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["senderId"], sender.to_string());
        assert_eq!(json["isTyping"], true);
    }

    #[test]
    fn new_message_event_shape() {
        let sender = Uuid::from_bytes([1; 16]);
        let recipient = Uuid::from_bytes([2; 16]);
        let message = Message {
            id: 42,
            conversation_id: "c".to_string(),
            sender_id: sender.to_string(),
            recipient_id: recipient.to_string(),
            message_type: "text".to_string(),
            content: "hi".to_string(),
            voice_url: None,
            voice_duration: None,
            reply_to_id: None,
            reply_to_text: None,
            reply_to_sender: None,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        let event = RealtimeEvent::NewMessage {
            message,
            sender_id: sender,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["senderId"], sender.to_string());
        assert_eq!(json["message"]["text"], "hi");
        assert_eq!(json["message"]["isRead"], false);
    }
}
