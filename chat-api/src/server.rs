use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Extension},
    middleware,
    routing::{get, post},
    Router,
};
use chat_core::ChatContext;
use chat_messaging::MessageService;
use chat_realtime::RealtimeHub;
use std::env;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing;

use crate::auth;
use crate::handlers;
use crate::websocket;

/// Shared server state, handed to handlers as an extension.
#[derive(Clone)]
pub struct ApiState {
    pub ctx: ChatContext,
    pub service: MessageService,
    pub hub: RealtimeHub,
}

pub async fn run(state: ApiState) -> Result<()> {
    let host = state.ctx.config.server.host.clone();
    let api_port = state.ctx.config.server.api_port;

    // Allow specific origins when CORS_ORIGINS is set, permissive otherwise.
    let cors_layer = if let Ok(origins) = env::var("CORS_ORIGINS") {
        let mut cors = CorsLayer::new();
        for origin in origins.split(',').map(|s| s.trim()) {
            if let Ok(parsed) = origin.parse::<axum::http::HeaderValue>() {
                cors = cors.allow_origin(parsed);
            }
        }
        cors.allow_methods(Any).allow_headers(Any)
    } else {
        tracing::warn!("CORS_ORIGINS not set, using permissive CORS. Set CORS_ORIGINS for production!");
        CorsLayer::permissive()
    };

    // Every parameterized /chats route uses the same segment name; the
    // router rejects sibling parameters with different names.
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(websocket::websocket_handler))
        .route("/auth/token", post(handlers::issue_token))
        .route(
            "/chats",
            get(handlers::get_conversations).delete(handlers::delete_conversations),
        )
        .route("/chats/start/:id", get(handlers::start_chat))
        .route(
            "/chats/:id/messages",
            get(handlers::get_messages).post(handlers::send_message),
        )
        .route("/chats/:id/read", post(handlers::mark_read))
        .route("/chats/upload-voice", post(handlers::upload_voice))
        .route(
            "/chats/push-token",
            post(handlers::register_push_token).delete(handlers::unregister_push_token),
        )
        .layer(DefaultBodyLimit::max(handlers::MAX_VOICE_UPLOAD_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(state))
                .layer(middleware::from_fn(auth::auth_middleware))
                .layer(cors_layer),
        );

    let addr = format!("{}:{}", host, api_port);
    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
