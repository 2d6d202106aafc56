//! Bearer-token identity for the app API.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

use crate::error::AidError;

/// The signed-in user, inserted into request extensions by [`require_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies Supabase access tokens (HS256, audience `authenticated`).
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn hs256(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["authenticated"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// The token's `sub` claim.
    pub fn verify(&self, token: &str) -> Result<String, AidError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("Rejected access token: {}", e);
            AidError::Unauthenticated
        })?;
        if data.claims.sub.is_empty() {
            return Err(AidError::Unauthenticated);
        }
        Ok(data.claims.sub)
    }
}

/// Authentication middleware: validates the bearer token.
///
/// Without a configured verifier every request is rejected.
pub async fn require_user(
    State(verifier): State<Option<Arc<JwtVerifier>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AidError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AidError::Unauthenticated)?;

    let verifier = verifier.ok_or(AidError::Unauthenticated)?;
    let user_id = verifier.verify(token)?;

    request.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(request).await)
}
