use anyhow::{anyhow, Result};
use chat_core::config::PushConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing;

/// Per-token send failure, classified so the dispatcher can tell permanent
/// token invalidation apart from transient provider trouble.
#[derive(Debug, Error)]
pub enum FcmError {
    #[error("device token is no longer registered")]
    Unregistered,

    #[error("fcm send failed: {0}")]
    Transient(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims {
    iss: String,
    sub: String,
    scope: String,
    aud: String,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: i64,
}

struct TokenCache {
    access_token: String,
    expires_at: i64,
}

/// FCM HTTP v1 client with OAuth2 service-account auth.
///
/// Runs disabled when no credentials are configured; sends are then skipped
/// with a debug log, mirroring how the rest of the delivery stack degrades.
pub struct FcmClient {
    inner: Option<FcmInner>,
}

struct FcmInner {
    project_id: String,
    credentials: ServiceAccountKey,
    token_cache: Arc<Mutex<Option<TokenCache>>>,
    http: reqwest::Client,
}

impl FcmClient {
    pub fn new(config: &PushConfig) -> Result<Self> {
        let inner = match (&config.fcm_project_id, &config.fcm_credentials_path) {
            (Some(project_id), Some(path)) => {
                tracing::info!("Initializing FCM client");

                let raw = fs::read_to_string(path)
                    .map_err(|e| anyhow!("Failed to read FCM credentials file {}: {}", path, e))?;
                let credentials: ServiceAccountKey = serde_json::from_str(&raw)
                    .map_err(|e| anyhow!("Failed to parse FCM credentials: {}", e))?;

                Some(FcmInner {
                    project_id: project_id.clone(),
                    credentials,
                    token_cache: Arc::new(Mutex::new(None)),
                    http: reqwest::Client::new(),
                })
            }
            _ => {
                tracing::warn!("FCM delivery disabled (missing configuration)");
                None
            }
        };

        Ok(FcmClient { inner })
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    /// Sends one notification to one registration token.
    ///
    /// High priority with the default sound on both platforms; the data
    /// payload rides along for client-side routing.
    pub async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), FcmError> {
        let inner = match &self.inner {
            Some(i) => i,
            None => {
                tracing::debug!("FCM not configured, skipping");
                return Ok(());
            }
        };

        let access_token = inner.access_token().await.map_err(|e| {
            FcmError::Transient(format!("access token exchange failed: {}", e))
        })?;

        let message = serde_json::json!({
            "message": {
                "token": device_token,
                "notification": { "title": title, "body": body },
                "data": data,
                "android": {
                    "priority": "HIGH",
                    "notification": { "sound": "default" }
                },
                "apns": {
                    "headers": { "apns-priority": "10" },
                    "payload": { "aps": { "sound": "default" } }
                }
            }
        });

        let url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            inner.project_id
        );

        let response = inner
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&message)
            .send()
            .await
            .map_err(|e| FcmError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("FCM notification delivered");
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        Err(classify_send_error(status.as_u16(), &error_body))
    }
}

impl FcmInner {
    /// Exchanges a signed JWT assertion for an OAuth2 access token, cached
    /// until shortly before expiry.
    async fn access_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Utc::now().timestamp() + 60 {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let now = Utc::now();
        let claims = AssertionClaims {
            iss: self.credentials.client_email.clone(),
            sub: self.credentials.client_email.clone(),
            scope: "https://www.googleapis.com/auth/firebase.messaging".to_string(),
            aud: self.credentials.token_uri.clone(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| anyhow!("Failed to parse FCM private key: {}", e))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| anyhow!("Failed to sign FCM assertion: {}", e))?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| anyhow!("Token request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Token request failed with status {}",
                response.status()
            ));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse token response: {}", e))?;

        let expires_at = Utc::now().timestamp() + token.expires_in;
        {
            let mut cache = self.token_cache.lock().await;
            *cache = Some(TokenCache {
                access_token: token.access_token.clone(),
                expires_at,
            });
        }

        Ok(token.access_token)
    }
}

/// Maps an FCM v1 error response onto the dispatcher's deactivation policy:
/// `UNREGISTERED` and `INVALID_ARGUMENT` mean the token is permanently dead,
/// anything else is assumed transient and the token stays active.
fn classify_send_error(status: u16, body: &str) -> FcmError {
    let error_status = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("status"))
                .and_then(|s| s.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_default();

    match error_status.as_str() {
        "UNREGISTERED" | "INVALID_ARGUMENT" | "NOT_FOUND" => FcmError::Unregistered,
        _ => FcmError::Transient(format!("status {}: {}", status, error_status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_body(status: &str) -> String {
        serde_json::json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": status
            }
        })
        .to_string()
    }

    #[test]
    fn unregistered_token_is_permanent() {
        assert!(matches!(
            classify_send_error(404, &error_body("UNREGISTERED")),
            FcmError::Unregistered
        ));
        assert!(matches!(
            classify_send_error(400, &error_body("INVALID_ARGUMENT")),
            FcmError::Unregistered
        ));
    }

    #[test]
    fn provider_trouble_is_transient() {
        assert!(matches!(
            classify_send_error(503, &error_body("UNAVAILABLE")),
            FcmError::Transient(_)
        ));
        assert!(matches!(
            classify_send_error(500, "not even json"),
            FcmError::Transient(_)
        ));
    }

    #[test]
    fn unconfigured_client_is_disabled() {
        let client = FcmClient::new(&chat_core::config::PushConfig {
            fcm_project_id: None,
            fcm_credentials_path: None,
        })
        .unwrap();
        assert!(!client.is_configured());
    }
}
