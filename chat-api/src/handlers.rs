use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    response::Json,
};
use chat_core::ChatError;
use chat_push::tokens::{self, Platform};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing;
use uuid::Uuid;

use crate::auth::{self, AuthenticatedUser};
use crate::error::ApiError;
use crate::server::ApiState;

/// Maximum accepted voice upload, in bytes.
pub const MAX_VOICE_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const TOKEN_EXPIRY_DAYS: u64 = 30;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "chat-api"
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    pub user_id: Uuid,
}

/// Development token issuer. Production deployments put a real identity
/// provider in front and share only the signing secret with this service.
pub async fn issue_token(
    Extension(state): Extension<ApiState>,
    Json(req): Json<IssueTokenRequest>,
) -> Result<Json<Value>, StatusCode> {
    let token = auth::generate_token(
        req.user_id,
        &state.ctx.config.server.jwt_secret,
        TOKEN_EXPIRY_DAYS,
    )?;

    Ok(Json(json!({
        "token": token,
        "expiresInDays": TOKEN_EXPIRY_DAYS,
    })))
}

pub async fn get_conversations(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, ApiError> {
    let conversations = state.service.get_conversations(user.id).await?;

    Ok(Json(json!({
        "success": true,
        "conversations": conversations,
    })))
}

pub async fn start_chat(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(recipient): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let recipient = parse_user_id(&recipient)?;
    let (conversation_id, other_user) = state.service.start_conversation(user.id, recipient).await?;

    Ok(Json(json!({
        "success": true,
        "conversationId": conversation_id,
        "otherUser": other_user,
    })))
}

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn get_messages(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(recipient): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let recipient = parse_user_id(&recipient)?;
    let page = state
        .service
        .get_messages(user.id, recipient, params.page, params.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "messages": page.messages,
        "conversationId": page.conversation_id,
        "page": page.page,
        "hasMore": page.has_more,
    })))
}

pub async fn send_message(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(recipient): Path<String>,
    Json(input): Json<chat_messaging::NewMessageInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let recipient = parse_user_id(&recipient)?;
    let message = state.service.send_message(user.id, recipient, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": message,
        })),
    ))
}

pub async fn mark_read(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.service.mark_as_read(user.id, &conversation_id).await?;

    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConversationsRequest {
    pub conversation_ids: Vec<String>,
}

pub async fn delete_conversations(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<DeleteConversationsRequest>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state
        .service
        .delete_conversations(user.id, &req.conversation_ids)
        .await?;

    Ok(Json(json!({
        "success": true,
        "deletedCount": deleted,
    })))
}

pub async fn upload_voice(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ChatError::invalid_input(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("audio") {
            continue;
        }

        let content_type = field.content_type().map(|c| c.to_string());
        let file_name = field.file_name().map(|f| f.to_string());
        if !is_supported_audio(content_type.as_deref(), file_name.as_deref()) {
            return Err(ChatError::invalid_input("unsupported audio format").into());
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ChatError::invalid_input(format!("failed to read upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(ChatError::invalid_input("empty audio file").into());
        }
        if bytes.len() > MAX_VOICE_UPLOAD_BYTES {
            return Err(ChatError::invalid_input("audio file exceeds 10MB limit").into());
        }

        let key = format!("voice/{}.m4a", Uuid::new_v4());
        let mime = content_type.unwrap_or_else(|| "audio/mp4".to_string());

        state
            .ctx
            .object_store
            .put(&key, bytes.to_vec(), &mime)
            .await
            .map_err(ChatError::Internal)?;

        let url = state
            .ctx
            .object_store
            .presigned_get(&key)
            .await
            .map_err(ChatError::Internal)?;

        tracing::info!("Stored voice upload {} for user {}", key, user.id);

        return Ok(Json(json!({
            "success": true,
            "voiceKey": key,
            "voiceUrl": url,
        })));
    }

    Err(ChatError::invalid_input("missing audio field").into())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenRequest {
    pub fcm_token: String,
    pub platform: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn register_push_token(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<RegisterTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.fcm_token.trim().is_empty() {
        return Err(ChatError::invalid_input("fcmToken is required").into());
    }
    let platform = Platform::parse(&req.platform)
        .ok_or_else(|| ChatError::invalid_input("platform must be android or ios"))?;

    tokens::register(
        &state.ctx.db_pool,
        user.id,
        &req.fcm_token,
        platform,
        req.device_id.as_deref(),
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterTokenRequest {
    pub fcm_token: String,
}

pub async fn unregister_push_token(
    Extension(state): Extension<ApiState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<UnregisterTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    tokens::unregister(&state.ctx.db_pool, user.id, &req.fcm_token).await?;

    Ok(Json(json!({ "success": true })))
}

fn parse_user_id(raw: &str) -> Result<Uuid, ChatError> {
    Uuid::parse_str(raw).map_err(|_| ChatError::InvalidRecipient)
}

fn is_supported_audio(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    const SUPPORTED: &[&str] = &[
        "audio/mp4",
        "audio/m4a",
        "audio/mpeg",
        "audio/wav",
        "audio/aac",
        "audio/x-m4a",
    ];

    if let Some(mime) = content_type {
        if SUPPORTED.contains(&mime) {
            return true;
        }
    }

    // Some clients send voice memos as application/octet-stream; fall back
    // to the file extension.
    file_name
        .map(|f| f.to_ascii_lowercase().ends_with(".m4a"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_audio_by_mime() {
        assert!(is_supported_audio(Some("audio/mp4"), None));
        assert!(is_supported_audio(Some("audio/x-m4a"), None));
        assert!(!is_supported_audio(Some("video/mp4"), None));
        assert!(!is_supported_audio(Some("text/plain"), Some("notes.txt")));
    }

    #[test]
    fn supported_audio_by_extension_fallback() {
        assert!(is_supported_audio(
            Some("application/octet-stream"),
            Some("Memo.M4A")
        ));
        assert!(!is_supported_audio(None, Some("memo.mp3")));
        assert!(!is_supported_audio(None, None));
    }

    #[test]
    fn recipient_ids_must_be_uuids() {
        assert!(parse_user_id("not-a-uuid").is_err());
        assert!(parse_user_id("b9481d8c-4f12-4c43-8bf3-29c9e0f6e2ab").is_ok());
    }
}
