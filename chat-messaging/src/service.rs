use anyhow::anyhow;
use chat_core::db::DbConnection;
use chat_core::schema::{chat_conversations, chat_messages, chat_profiles};
use chat_core::{ChatContext, ChatError, Conversation, ConversationKey, Message, Profile};
use chat_push::{PushDispatcher, PushNotification, PushOutcome};
use chat_realtime::{RealtimeEvent, RealtimeHub};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;
use tracing;
use uuid::Uuid;

use crate::content::NewMessageInput;

const DEFAULT_PAGE_SIZE: i64 = 30;
const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub age: Option<i32>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub text: String,
    pub sender_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub other_user: Option<PublicUser>,
    pub last_message: Option<LastMessage>,
    pub unread_count: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub conversation_id: Option<String>,
    pub page: i64,
    pub has_more: bool,
}

/// Delivery orchestrator: owns conversation/message persistence and the
/// fan-out of new messages to the realtime hub and push dispatcher.
///
/// The persisted message and conversation counters are the source of truth;
/// push and realtime are best-effort secondary channels whose failures never
/// reach the caller.
#[derive(Clone)]
pub struct MessageService {
    ctx: ChatContext,
    hub: RealtimeHub,
    push: PushDispatcher,
}

impl MessageService {
    pub fn new(ctx: ChatContext, hub: RealtimeHub, push: PushDispatcher) -> Self {
        MessageService { ctx, hub, push }
    }

    async fn conn(&self) -> Result<DbConnection, ChatError> {
        self.ctx
            .db_pool
            .get()
            .await
            .map_err(|e| ChatError::Internal(anyhow!("failed to get DB connection: {}", e)))
    }

    pub async fn send_message(
        &self,
        sender: Uuid,
        recipient: Uuid,
        input: NewMessageInput,
    ) -> Result<Message, ChatError> {
        if recipient == sender {
            return Err(ChatError::InvalidRecipient);
        }
        let content = input.validate()?;

        let key = ConversationKey::for_pair(sender, recipient);
        self.get_or_create_conversation(&key).await?;

        let mut conn = self.conn().await?;

        let message: Message = diesel::insert_into(chat_messages::table)
            .values((
                chat_messages::conversation_id.eq(&key.key),
                chat_messages::sender_id.eq(sender.to_string()),
                chat_messages::recipient_id.eq(recipient.to_string()),
                chat_messages::message_type.eq(content.message_type.as_str()),
                chat_messages::content.eq(&content.text),
                chat_messages::voice_url.eq(content.voice_url.as_deref()),
                chat_messages::voice_duration.eq(content.voice_duration),
                chat_messages::reply_to_id.eq(content.reply_to.as_ref().map(|r| r.message_id)),
                chat_messages::reply_to_text
                    .eq(content.reply_to.as_ref().map(|r| r.text.as_str())),
                chat_messages::reply_to_sender
                    .eq(content.reply_to.as_ref().map(|r| r.sender_id.as_str())),
            ))
            .returning(Message::as_returning())
            .get_result(&mut conn)
            .await?;

        // One statement: preview snapshot plus an atomic increment of the
        // recipient's unread counter, so concurrent sends never lose counts.
        let now = Utc::now();
        let target = chat_conversations::table
            .filter(chat_conversations::conversation_id.eq(&key.key));
        if recipient == key.low {
            diesel::update(target)
                .set((
                    chat_conversations::last_message_text.eq(&content.preview),
                    chat_conversations::last_message_sender.eq(sender.to_string()),
                    chat_conversations::last_message_at.eq(message.created_at),
                    chat_conversations::unread_low.eq(chat_conversations::unread_low + 1),
                    chat_conversations::updated_at.eq(now),
                ))
                .execute(&mut conn)
                .await?;
        } else {
            diesel::update(target)
                .set((
                    chat_conversations::last_message_text.eq(&content.preview),
                    chat_conversations::last_message_sender.eq(sender.to_string()),
                    chat_conversations::last_message_at.eq(message.created_at),
                    chat_conversations::unread_high.eq(chat_conversations::unread_high + 1),
                    chat_conversations::updated_at.eq(now),
                ))
                .execute(&mut conn)
                .await?;
        }
        drop(conn);

        self.fan_out(sender, recipient, &message, &content.preview);

        Ok(message)
    }

    /// Detached best-effort delivery; outcomes are logged, never returned.
    fn fan_out(&self, sender: Uuid, recipient: Uuid, message: &Message, preview: &str) {
        let push = self.push.clone();
        let notification = PushNotification {
            title: "New Message".to_string(),
            body: preview.to_string(),
            data: serde_json::json!({
                "type": "new_message",
                "conversationId": message.conversation_id,
                "senderId": sender.to_string(),
            }),
        };
        tokio::spawn(async move {
            match push.send_to_user(recipient, &notification).await {
                Ok(PushOutcome::Sent { success, failed }) => {
                    tracing::debug!(
                        "Push fan-out for {}: {} ok, {} failed",
                        recipient,
                        success,
                        failed
                    );
                }
                Ok(PushOutcome::NoActiveTokens) | Ok(PushOutcome::Disabled) => {}
                Err(e) => tracing::warn!("Push delivery failed for {}: {:#}", recipient, e),
            }
        });

        let hub = self.hub.clone();
        let event = RealtimeEvent::NewMessage {
            message: message.clone(),
            sender_id: sender,
        };
        tokio::spawn(async move {
            if let Err(e) = hub.emit_to_user(recipient, &event).await {
                tracing::warn!("Realtime emit failed for {}: {:#}", recipient, e);
            }
        });
    }

    async fn get_or_create_conversation(
        &self,
        key: &ConversationKey,
    ) -> Result<Conversation, ChatError> {
        let mut conn = self.conn().await?;

        // The unique index on conversation_id makes concurrent creators for
        // the same pair converge: the loser's insert is a no-op and the
        // follow-up select finds the winner's row.
        diesel::insert_into(chat_conversations::table)
            .values((
                chat_conversations::conversation_id.eq(&key.key),
                chat_conversations::participant_low.eq(key.low.to_string()),
                chat_conversations::participant_high.eq(key.high.to_string()),
            ))
            .on_conflict(chat_conversations::conversation_id)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        let conversation = chat_conversations::table
            .filter(chat_conversations::conversation_id.eq(&key.key))
            .select(Conversation::as_select())
            .first(&mut conn)
            .await?;

        Ok(conversation)
    }

    pub async fn start_conversation(
        &self,
        user: Uuid,
        recipient: Uuid,
    ) -> Result<(String, Option<PublicUser>), ChatError> {
        if recipient == user {
            return Err(ChatError::InvalidRecipient);
        }

        let key = ConversationKey::for_pair(user, recipient);
        let conversation = self.get_or_create_conversation(&key).await?;
        let other = self
            .resolve_public_user(conversation.other_participant(user))
            .await?;

        Ok((conversation.conversation_id, other))
    }

    pub async fn get_conversations(
        &self,
        user: Uuid,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        let mut conn = self.conn().await?;
        let user_id = user.to_string();

        let conversations: Vec<Conversation> = chat_conversations::table
            .filter(
                chat_conversations::participant_low
                    .eq(&user_id)
                    .or(chat_conversations::participant_high.eq(&user_id)),
            )
            .order(chat_conversations::updated_at.desc())
            .select(Conversation::as_select())
            .load(&mut conn)
            .await?;
        drop(conn);

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let other = self
                .resolve_public_user(conversation.other_participant(user))
                .await?;

            let last_message = match (
                &conversation.last_message_text,
                &conversation.last_message_sender,
                conversation.last_message_at,
            ) {
                (Some(text), Some(sender), Some(at)) => Some(LastMessage {
                    text: text.clone(),
                    sender_id: sender.clone(),
                    created_at: at,
                }),
                _ => None,
            };

            summaries.push(ConversationSummary {
                unread_count: conversation.unread_for(user),
                updated_at: conversation.updated_at,
                conversation_id: conversation.conversation_id,
                other_user: other,
                last_message,
            });
        }

        Ok(summaries)
    }

    /// A missing or deleted profile yields `None` rather than failing the
    /// enclosing listing.
    async fn resolve_public_user(&self, user_id: &str) -> Result<Option<PublicUser>, ChatError> {
        let mut conn = self.conn().await?;

        let profile: Option<Profile> = chat_profiles::table
            .filter(chat_profiles::user_id.eq(user_id))
            .select(Profile::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        drop(conn);

        let Some(profile) = profile else {
            return Ok(None);
        };

        let photo_url = match &profile.photo_key {
            Some(key) => match self.ctx.object_store.presigned_get(key).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Failed to presign photo for {}: {:#}", user_id, e);
                    None
                }
            },
            None => None,
        };

        Ok(Some(PublicUser {
            id: profile.user_id,
            name: profile.display_name,
            age: profile.age,
            photo_url,
        }))
    }

    pub async fn get_messages(
        &self,
        user: Uuid,
        other: Uuid,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<MessagePage, ChatError> {
        let page = clamp_page(page);
        let limit = clamp_limit(limit);

        let key = ConversationKey::for_pair(user, other);
        let mut conn = self.conn().await?;

        let conversation: Option<Conversation> = chat_conversations::table
            .filter(chat_conversations::conversation_id.eq(&key.key))
            .select(Conversation::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        // A chat screen renders empty-state before any message is ever
        // sent; an unknown pair is a valid empty page, not an error.
        let Some(conversation) = conversation else {
            return Ok(MessagePage {
                messages: Vec::new(),
                conversation_id: None,
                page,
                has_more: false,
            });
        };

        // Ask for one extra row to detect another page without a count.
        let rows: Vec<Message> = chat_messages::table
            .filter(chat_messages::conversation_id.eq(&conversation.conversation_id))
            .order(chat_messages::created_at.desc())
            .offset((page - 1) * limit)
            .limit(limit + 1)
            .select(Message::as_select())
            .load(&mut conn)
            .await?;

        let (messages, has_more) = chronological_page(rows, limit as usize);

        Ok(MessagePage {
            messages,
            conversation_id: Some(conversation.conversation_id),
            page,
            has_more,
        })
    }

    /// Idempotent. The per-message flags and the counter reset are two
    /// independent writes; the counter is a badge cache, not the source of
    /// truth for read status.
    pub async fn mark_as_read(&self, user: Uuid, conversation_id: &str) -> Result<(), ChatError> {
        let key = ConversationKey::parse(conversation_id)
            .ok_or_else(|| ChatError::invalid_input("malformed conversation id"))?;
        if !key.contains(user) {
            return Err(ChatError::NotFound);
        }

        let mut conn = self.conn().await?;

        let exists: Option<i64> = chat_conversations::table
            .filter(chat_conversations::conversation_id.eq(&key.key))
            .select(chat_conversations::id)
            .first(&mut conn)
            .await
            .optional()?;
        if exists.is_none() {
            return Err(ChatError::NotFound);
        }

        diesel::update(
            chat_messages::table
                .filter(chat_messages::conversation_id.eq(&key.key))
                .filter(chat_messages::recipient_id.eq(user.to_string()))
                .filter(chat_messages::is_read.eq(false)),
        )
        .set((
            chat_messages::is_read.eq(true),
            chat_messages::read_at.eq(Some(Utc::now())),
        ))
        .execute(&mut conn)
        .await?;

        let target = chat_conversations::table
            .filter(chat_conversations::conversation_id.eq(&key.key));
        if user == key.low {
            diesel::update(target)
                .set(chat_conversations::unread_low.eq(0))
                .execute(&mut conn)
                .await?;
        } else {
            diesel::update(target)
                .set(chat_conversations::unread_high.eq(0))
                .execute(&mut conn)
                .await?;
        }

        Ok(())
    }

    /// Hard delete. Ids that are malformed or that the caller is not a
    /// participant of are silently dropped from the batch.
    pub async fn delete_conversations(
        &self,
        user: Uuid,
        conversation_ids: &[String],
    ) -> Result<usize, ChatError> {
        let survivors: Vec<String> = conversation_ids
            .iter()
            .filter_map(|id| ConversationKey::parse(id))
            .filter(|key| key.contains(user))
            .map(|key| key.key)
            .collect();

        if survivors.is_empty() {
            return Err(ChatError::NotFound);
        }

        let mut conn = self.conn().await?;

        diesel::delete(
            chat_messages::table.filter(chat_messages::conversation_id.eq_any(&survivors)),
        )
        .execute(&mut conn)
        .await?;

        let deleted = diesel::delete(
            chat_conversations::table
                .filter(chat_conversations::conversation_id.eq_any(&survivors)),
        )
        .execute(&mut conn)
        .await?;

        Ok(deleted)
    }
}

fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Trims a newest-first row set fetched with one extra row down to the page
/// size and flips it into chronological order.
fn chronological_page<T>(mut rows: Vec<T>, limit: usize) -> (Vec<T>, bool) {
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    rows.reverse();
    (rows, has_more)
}

#[cfg(test)]
mod tests {
    use super::{chronological_page, clamp_limit, clamp_page};

    #[test]
    fn page_and_limit_are_clamped() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(-3)), 1);
        assert_eq!(clamp_page(Some(7)), 7);

        assert_eq!(clamp_limit(None), 30);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(200)), 50);
        assert_eq!(clamp_limit(Some(15)), 15);
    }

    #[test]
    fn extra_row_signals_more_pages() {
        // 31 stored rows fetched newest-first with limit 30.
        let rows: Vec<i32> = (0..31).rev().collect();
        let (page, has_more) = chronological_page(rows, 30);
        assert!(has_more);
        assert_eq!(page.len(), 30);
        // Chronological order after the flip.
        assert_eq!(page.first(), Some(&1));
        assert_eq!(page.last(), Some(&30));
    }

    #[test]
    fn exact_page_has_no_more() {
        let rows: Vec<i32> = (0..30).rev().collect();
        let (page, has_more) = chronological_page(rows, 30);
        assert!(!has_more);
        assert_eq!(page.len(), 30);
        assert_eq!(page.first(), Some(&0));
    }

    #[test]
    fn empty_page_is_fine() {
        let (page, has_more) = chronological_page(Vec::<i32>::new(), 30);
        assert!(page.is_empty());
        assert!(!has_more);
    }
}
