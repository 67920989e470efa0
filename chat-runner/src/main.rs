use anyhow::Result;
use chat_api::{run as run_api, ApiState};
use chat_core::{ChatContext, Config};
use chat_messaging::MessageService;
use chat_push::{FcmClient, PushDispatcher};
use chat_realtime::RealtimeHub;
use tracing;
use tracing_subscriber;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting chat server");

    let config = Config::from_env();
    let ctx = ChatContext::new(config).await?;

    tracing::info!("Chat context initialized");

    let hub = RealtimeHub::new(ctx.redis_pool.clone());
    let fcm = FcmClient::new(&ctx.config.push)?;
    let push = PushDispatcher::new(ctx.clone(), fcm);
    let service = MessageService::new(ctx.clone(), hub.clone(), push);

    run_api(ApiState { ctx, service, hub }).await?;

    Ok(())
}
