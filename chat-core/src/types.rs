use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deterministic key for the unordered participant pair of a conversation.
///
/// `{A,B}` and `{B,A}` derive the same key, so the unique index on
/// `conversation_id` is the storage-layer uniqueness contract for the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationKey {
    pub low: Uuid,
    pub high: Uuid,
    pub key: String,
}

impl ConversationKey {
    pub fn for_pair(a: Uuid, b: Uuid) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        ConversationKey {
            low,
            high,
            key: format!("{}:{}", low, high),
        }
    }

    /// Parses a stored conversation id. Returns `None` for anything that is
    /// not two UUIDs in sorted order, which is how malformed ids in bulk
    /// operations get silently dropped.
    pub fn parse(key: &str) -> Option<Self> {
        let (low_str, high_str) = key.split_once(':')?;
        let low: Uuid = low_str.parse().ok()?;
        let high: Uuid = high_str.parse().ok()?;
        if low > high {
            return None;
        }
        Some(ConversationKey {
            low,
            high,
            key: key.to_string(),
        })
    }

    pub fn contains(&self, user: Uuid) -> bool {
        self.low == user || self.high == user
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Voice,
    Image,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Voice => "voice",
            MessageType::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            "voice" => Some(MessageType::Voice),
            "image" => Some(MessageType::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::chat_conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub conversation_id: String,
    pub participant_low: String,
    pub participant_high: String,
    pub last_message_text: Option<String>,
    pub last_message_sender: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_low: i32,
    pub unread_high: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user: Uuid) -> bool {
        let user = user.to_string();
        self.participant_low == user || self.participant_high == user
    }

    pub fn other_participant(&self, user: Uuid) -> &str {
        if self.participant_low == user.to_string() {
            &self.participant_high
        } else {
            &self.participant_low
        }
    }

    pub fn unread_for(&self, user: Uuid) -> i32 {
        if self.participant_low == user.to_string() {
            self.unread_low
        } else {
            self.unread_high
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::chat_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub message_type: String,
    #[serde(rename = "text")]
    pub content: String,
    pub voice_url: Option<String>,
    pub voice_duration: Option<f64>,
    pub reply_to_id: Option<i64>,
    pub reply_to_text: Option<String>,
    pub reply_to_sender: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::chat_device_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub id: i64,
    pub user_id: String,
    pub token: String,
    pub platform: String,
    pub device_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::chat_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    pub age: Option<i32>,
    pub photo_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn pair_key_is_order_insensitive() {
        let a = uuid(1);
        let b = uuid(2);
        assert_eq!(ConversationKey::for_pair(a, b), ConversationKey::for_pair(b, a));
    }

    #[test]
    fn pair_key_orders_participants() {
        let key = ConversationKey::for_pair(uuid(9), uuid(3));
        assert_eq!(key.low, uuid(3));
        assert_eq!(key.high, uuid(9));
        assert_eq!(key.key, format!("{}:{}", uuid(3), uuid(9)));
    }

    #[test]
    fn parse_round_trips() {
        let key = ConversationKey::for_pair(uuid(4), uuid(7));
        let parsed = ConversationKey::parse(&key.key).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(ConversationKey::parse("not-a-conversation").is_none());
        assert!(ConversationKey::parse("a:b").is_none());
        // Unsorted pairs never come out of for_pair, so they are malformed.
        let unsorted = format!("{}:{}", uuid(9), uuid(3));
        assert!(ConversationKey::parse(&unsorted).is_none());
    }

    #[test]
    fn contains_checks_both_sides() {
        let key = ConversationKey::for_pair(uuid(1), uuid(2));
        assert!(key.contains(uuid(1)));
        assert!(key.contains(uuid(2)));
        assert!(!key.contains(uuid(3)));
    }

    #[test]
    fn message_type_round_trips() {
        for t in [MessageType::Text, MessageType::Voice, MessageType::Image] {
            assert_eq!(MessageType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MessageType::parse("gif"), None);
    }

    #[test]
    fn unread_counter_follows_participant_side() {
        let a = uuid(1);
        let b = uuid(2);
        let conv = Conversation {
            id: 1,
            conversation_id: ConversationKey::for_pair(a, b).key,
            participant_low: a.to_string(),
            participant_high: b.to_string(),
            last_message_text: None,
            last_message_sender: None,
            last_message_at: None,
            unread_low: 3,
            unread_high: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(conv.unread_for(a), 3);
        assert_eq!(conv.unread_for(b), 5);
        assert_eq!(conv.other_participant(a), b.to_string());
    }
}
