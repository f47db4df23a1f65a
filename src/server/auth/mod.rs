//! Authentication module with JWT
//!
//! Tokens are issued elsewhere; this service only verifies them and resolves
//! the subscriber they name.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::Subscriber;
use crate::server::db::SubscriberStore;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,        // subscriber id
    pub exp: usize,      // expiration timestamp
}

#[derive(Debug, Serialize)]
pub struct AuthError {
    pub message: String,
}

type Rejection = (StatusCode, Json<AuthError>);

fn reject(status: StatusCode, message: &str) -> Rejection {
    (status, Json(AuthError { message: message.to_string() }))
}

/// Create a JWT token for a subscriber
#[cfg(test)]
pub fn create_token(subscriber_id: i64, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let expiration = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;
    let claims = Claims { sub: subscriber_id, exp: expiration };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate a JWT token and extract claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// JWT Auth extractor - extracts Claims from Authorization header
impl FromRequestParts<Arc<AppState>> for Claims {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Missing authorization header"))?;

        validate_token(bearer.token(), &state.jwt_secret)
            .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid token"))
    }
}

/// The subscriber named by a valid bearer token.
pub struct AuthSubscriber(pub Subscriber);

impl FromRequestParts<Arc<AppState>> for AuthSubscriber {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;

        let subscriber = state
            .orchestrator
            .store()
            .subscriber(claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load subscriber {}: {}", claims.sub, e);
                reject(StatusCode::BAD_GATEWAY, "Database error")
            })?
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Unknown subscriber"))?;

        Ok(AuthSubscriber(subscriber))
    }
}
