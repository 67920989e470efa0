use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing;
use uuid::Uuid;

use crate::server::ApiState;

/// JWT claims; `sub` is the user's UUID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Authenticated caller, inserted into request extensions by the middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: Uuid,
}

/// Health check, the WebSocket upgrade (which carries its token in the
/// query string) and token issuance are reachable without a bearer token.
/// Exact matches only.
fn is_public_path(path: &str) -> bool {
    path == "/health" || path == "/ws" || path == "/auth/token"
}

fn extract_token(auth_header: Option<&str>) -> Option<String> {
    auth_header?
        .strip_prefix("Bearer ")
        .map(|s| s.trim().to_string())
}

/// Generate a JWT for a user id.
pub fn generate_token(user: Uuid, secret: &str, expires_in_days: u64) -> Result<String, StatusCode> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .as_secs() as usize;

    let claims = Claims {
        sub: user.to_string(),
        exp: now + (expires_in_days * 24 * 60 * 60) as usize,
    };

    let encoding_key = EncodingKey::from_secret(secret.as_ref());

    encode(&Header::default(), &claims, &encoding_key).map_err(|e| {
        tracing::error!("Failed to generate JWT token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Verify a JWT and extract the user id from its `sub` claim.
pub fn verify_token(token: &str, secret: &str) -> Result<Uuid, StatusCode> {
    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let validation = Validation::default();

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => {
            Uuid::parse_str(&token_data.claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)
        }
        Err(e) => {
            tracing::debug!("JWT verification failed: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Axum middleware for JWT authentication.
pub async fn auth_middleware(
    mut req: Request,
    next: axum::middleware::Next,
) -> Result<Response, StatusCode> {
    if is_public_path(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match extract_token(auth_header) {
        Some(t) => t,
        None => {
            tracing::debug!("Missing Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let state = req
        .extensions()
        .get::<ApiState>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = verify_token(&token, &state.ctx.config.server.jwt_secret)?;

    req.extensions_mut().insert(AuthenticatedUser { id: user });

    tracing::debug!("Authenticated user: {}", user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let user = Uuid::new_v4();
        let token = generate_token(user, "test-secret", 1).unwrap();
        assert_eq!(verify_token(&token, "test-secret").unwrap(), user);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token(Uuid::new_v4(), "test-secret", 1).unwrap();
        assert_eq!(
            verify_token(&token, "other-secret").unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_eq!(
            verify_token("not-a-jwt", "test-secret").unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn public_paths_are_exact_matches() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/ws"));
        assert!(is_public_path("/auth/token"));
        assert!(!is_public_path("/wsx"));
        assert!(!is_public_path("/ws/anything"));
        assert!(!is_public_path("/chats"));
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(extract_token(Some("Bearer abc")), Some("abc".to_string()));
        assert_eq!(extract_token(Some("abc")), None);
        assert_eq!(extract_token(None), None);
    }
}
