use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chat_core::ChatError;
use serde_json::json;
use tracing;

/// HTTP projection of [`ChatError`]. Storage and internal failures are
/// logged with full detail and surfaced to clients as a generic 500.
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ChatError::Unauthorized => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            ChatError::InvalidInput(_) | ChatError::InvalidRecipient => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            ChatError::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            ChatError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ChatError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ChatError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(status_of(ChatError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(ChatError::invalid_input("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ChatError::InvalidRecipient), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ChatError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ChatError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
