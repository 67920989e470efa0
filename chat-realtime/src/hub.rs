use anyhow::Result;
use chat_core::redis::{get_connection, RedisConnection};
use chat_core::RedisPool;
use tracing;
use uuid::Uuid;

use crate::events::RealtimeEvent;

/// How many events a user's room retains; reconnecting clients recover
/// anything older by polling the message history.
const STREAM_MAXLEN: usize = 256;
/// Poll block interval for feed reads, in milliseconds.
const FEED_BLOCK_MS: usize = 1000;

/// Realtime hub: one Redis stream per user identity is that user's "room".
///
/// Emitting to a room is a fan-out write; every live connection of the user
/// follows the stream with its own cursor, so multi-device delivery falls
/// out naturally. Constructed once at startup and handed to collaborators
/// as a plain value, never reached through a global.
#[derive(Clone)]
pub struct RealtimeHub {
    redis: RedisPool,
}

impl RealtimeHub {
    pub fn new(redis: RedisPool) -> Self {
        RealtimeHub { redis }
    }

    fn stream_key(user: Uuid) -> String {
        format!("stream:chat:{}", user)
    }

    /// Appends an event to the user's room. Best effort from the caller's
    /// point of view; delivery to individual connections is not acked.
    pub async fn emit_to_user(&self, user: Uuid, event: &RealtimeEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = get_connection(&self.redis).await?;

        redis::cmd("XADD")
            .arg(Self::stream_key(user))
            .arg("MAXLEN")
            .arg("~")
            .arg(STREAM_MAXLEN)
            .arg("*")
            .arg("data")
            .arg(&payload)
            .query_async::<String>(&mut conn)
            .await?;

        tracing::debug!("Emitted realtime event to room user:{}", user);

        Ok(())
    }

    /// Opens a feed over the user's room starting at the stream tail; only
    /// events emitted after the feed is opened are delivered.
    pub fn open_feed(&self, user: Uuid) -> UserFeed {
        UserFeed {
            redis: self.redis.clone(),
            stream_key: Self::stream_key(user),
            last_id: "$".to_string(),
        }
    }
}

/// Cursor over one connection's view of a user room.
pub struct UserFeed {
    redis: RedisPool,
    stream_key: String,
    last_id: String,
}

type StreamReply = Option<Vec<(String, Vec<(String, Vec<(String, String)>)>)>>;

impl UserFeed {
    /// Blocks up to a second for new events and returns their payloads in
    /// stream order. An empty vec means the block timed out; callers loop.
    pub async fn next_batch(&mut self) -> Result<Vec<String>> {
        let mut conn: RedisConnection = get_connection(&self.redis).await?;

        let reply: StreamReply = redis::cmd("XREAD")
            .arg("BLOCK")
            .arg(FEED_BLOCK_MS)
            .arg("STREAMS")
            .arg(&self.stream_key)
            .arg(&self.last_id)
            .query_async(&mut conn)
            .await?;

        let mut payloads = Vec::new();
        if let Some(streams) = reply {
            for (_, entries) in streams {
                for (entry_id, fields) in entries {
                    self.last_id = entry_id;
                    for (field, value) in fields {
                        if field == "data" {
                            payloads.push(value);
                        }
                    }
                }
            }
        }

        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_key_is_per_user() {
        let a = Uuid::from_bytes([1; 16]);
        let b = Uuid::from_bytes([2; 16]);
        assert_eq!(RealtimeHub::stream_key(a), format!("stream:chat:{}", a));
        assert_ne!(RealtimeHub::stream_key(a), RealtimeHub::stream_key(b));
    }
}
