use anyhow::Result;
use chat_core::schema::chat_ws_connections;
use chat_core::DbPool;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

/// Live-connection bookkeeping. Purely observational: push delivery stays
/// unconditional regardless of what these rows say, since a registered
/// connection tells us nothing about whether the app is foregrounded.
pub async fn register_connection(db: &DbPool, user: Uuid, connection_id: &str) -> Result<()> {
    let mut conn = db.get().await?;

    diesel::insert_into(chat_ws_connections::table)
        .values((
            chat_ws_connections::user_id.eq(user.to_string()),
            chat_ws_connections::connection_id.eq(connection_id),
            chat_ws_connections::connected_at.eq(Utc::now()),
            chat_ws_connections::last_heartbeat_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

    Ok(())
}

pub async fn touch_heartbeat(db: &DbPool, connection_id: &str) -> Result<()> {
    let mut conn = db.get().await?;

    diesel::update(chat_ws_connections::table)
        .filter(chat_ws_connections::connection_id.eq(connection_id))
        .set(chat_ws_connections::last_heartbeat_at.eq(Utc::now()))
        .execute(&mut conn)
        .await?;

    Ok(())
}

pub async fn mark_disconnected(db: &DbPool, connection_id: &str) -> Result<()> {
    let mut conn = db.get().await?;

    diesel::update(chat_ws_connections::table)
        .filter(chat_ws_connections::connection_id.eq(connection_id))
        .set(chat_ws_connections::disconnected_at.eq(Utc::now()))
        .execute(&mut conn)
        .await?;

    Ok(())
}
