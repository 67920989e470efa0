use chat_core::schema::chat_device_tokens;
use chat_core::{ChatError, DbPool, DeviceToken};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "android" => Some(Platform::Android),
            "ios" => Some(Platform::Ios),
            _ => None,
        }
    }
}

/// Idempotent registration keyed on the token string. A token already owned
/// by another user is reassigned to the caller.
pub async fn register(
    db: &DbPool,
    user: Uuid,
    token: &str,
    platform: Platform,
    device_id: Option<&str>,
) -> Result<(), ChatError> {
    let mut conn = db.get().await.map_err(anyhow::Error::from)?;

    diesel::insert_into(chat_device_tokens::table)
        .values((
            chat_device_tokens::user_id.eq(user.to_string()),
            chat_device_tokens::token.eq(token),
            chat_device_tokens::platform.eq(platform.as_str()),
            chat_device_tokens::device_id.eq(device_id),
            chat_device_tokens::is_active.eq(true),
        ))
        .on_conflict(chat_device_tokens::token)
        .do_update()
        .set((
            chat_device_tokens::user_id.eq(user.to_string()),
            chat_device_tokens::platform.eq(platform.as_str()),
            chat_device_tokens::device_id.eq(device_id),
            chat_device_tokens::is_active.eq(true),
            chat_device_tokens::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

    Ok(())
}

/// Hard delete on explicit unregister, scoped to the caller's own rows so
/// one user cannot drop another user's token.
pub async fn unregister(db: &DbPool, user: Uuid, token: &str) -> Result<usize, ChatError> {
    let mut conn = db.get().await.map_err(anyhow::Error::from)?;

    let deleted = diesel::delete(
        chat_device_tokens::table
            .filter(chat_device_tokens::user_id.eq(user.to_string()))
            .filter(chat_device_tokens::token.eq(token)),
    )
    .execute(&mut conn)
    .await?;

    Ok(deleted)
}

pub async fn active_for(db: &DbPool, user: Uuid) -> Result<Vec<DeviceToken>, ChatError> {
    let mut conn = db.get().await.map_err(anyhow::Error::from)?;

    let tokens = chat_device_tokens::table
        .filter(chat_device_tokens::user_id.eq(user.to_string()))
        .filter(chat_device_tokens::is_active.eq(true))
        .select(DeviceToken::as_select())
        .load(&mut conn)
        .await?;

    Ok(tokens)
}

/// Soft-deactivation: the row survives for history, the token stops being a
/// delivery target.
pub async fn deactivate(db: &DbPool, tokens: &[String]) -> Result<usize, ChatError> {
    if tokens.is_empty() {
        return Ok(0);
    }

    let mut conn = db.get().await.map_err(anyhow::Error::from)?;

    let updated = diesel::update(
        chat_device_tokens::table.filter(chat_device_tokens::token.eq_any(tokens)),
    )
    .set((
        chat_device_tokens::is_active.eq(false),
        chat_device_tokens::updated_at.eq(Utc::now()),
    ))
    .execute(&mut conn)
    .await?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parse_round_trips() {
        assert_eq!(Platform::parse("android"), Some(Platform::Android));
        assert_eq!(Platform::parse("ios"), Some(Platform::Ios));
        assert_eq!(Platform::parse("web"), None);
        assert_eq!(Platform::parse("iOS"), None);
    }
}
