use anyhow::Result;
use chat_core::ChatContext;
use serde::Serialize;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

use crate::fcm::{FcmClient, FcmError};
use crate::tokens;

#[derive(Debug, Clone, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Provider not configured; nothing attempted.
    Disabled,
    /// Common for offline-only users, not an error.
    NoActiveTokens,
    Sent { success: usize, failed: usize },
}

/// Fans a notification out to all of a user's active device tokens and
/// interprets per-token provider failures.
///
/// Callers run this on detached tasks: per-token failures never raise, and
/// even a total provider failure only surfaces as an `Err` for the caller
/// to log. Nothing here may fail an enclosing message send.
#[derive(Clone)]
pub struct PushDispatcher {
    ctx: ChatContext,
    fcm: Arc<FcmClient>,
}

impl PushDispatcher {
    pub fn new(ctx: ChatContext, fcm: FcmClient) -> Self {
        PushDispatcher {
            ctx,
            fcm: Arc::new(fcm),
        }
    }

    pub async fn send_to_user(
        &self,
        user: Uuid,
        notification: &PushNotification,
    ) -> Result<PushOutcome> {
        if !self.fcm.is_configured() {
            tracing::debug!("Push dispatch skipped for {} (FCM disabled)", user);
            return Ok(PushOutcome::Disabled);
        }

        let tokens = tokens::active_for(&self.ctx.db_pool, user).await?;
        if tokens.is_empty() {
            tracing::debug!("No active device tokens for {}", user);
            return Ok(PushOutcome::NoActiveTokens);
        }

        let mut success = 0;
        let mut failed = 0;
        let mut dead_tokens = Vec::new();

        for device in &tokens {
            match self
                .fcm
                .send(
                    &device.token,
                    &notification.title,
                    &notification.body,
                    &notification.data,
                )
                .await
            {
                Ok(()) => success += 1,
                Err(FcmError::Unregistered) => {
                    failed += 1;
                    dead_tokens.push(device.token.clone());
                }
                Err(FcmError::Transient(reason)) => {
                    failed += 1;
                    tracing::warn!(
                        "Transient push failure for user {} ({} token): {}",
                        user,
                        device.platform,
                        reason
                    );
                }
            }
        }

        if !dead_tokens.is_empty() {
            match tokens::deactivate(&self.ctx.db_pool, &dead_tokens).await {
                Ok(n) => tracing::info!("Deactivated {} invalid device tokens for {}", n, user),
                Err(e) => tracing::warn!("Failed to deactivate invalid tokens: {}", e),
            }
        }

        tracing::debug!(
            "Push fan-out for {}: {} delivered, {} failed",
            user,
            success,
            failed
        );

        Ok(PushOutcome::Sent { success, failed })
    }
}
