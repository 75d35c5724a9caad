//! Session extractors.
//!
//! The session token is read from `Authorization: Bearer <jwt>` first, then
//! from the `session` cookie the front end sets after sign-in.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use domains::{DomainError, Identity, UserProfile};

use super::error::ApiError;
use super::AppState;

pub const SESSION_COOKIE: &str = "session";

fn session_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(auth_adapters::bearer_token);
    if let Some(token) = from_header {
        return Some(token.to_string());
    }
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| auth_adapters::cookie_value(cookies, SESSION_COOKIE))
        .map(str::to_string)
}

/// The caller's identity when a valid session is present.
///
/// An invalid or expired token is treated like no session at all.
pub struct MaybeIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(parts) else {
            return Ok(Self(None));
        };
        match state.identity.verify(&token).await {
            Ok(identity) => Ok(Self(Some(identity))),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unusable session token");
                Ok(Self(None))
            }
        }
    }
}

/// Requires a valid session.
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)
            .ok_or_else(|| DomainError::Unauthorized("sign in to continue".into()))?;
        let identity = state.identity.verify(&token).await?;
        Ok(Self(identity))
    }
}

/// Requires a session whose profile has the admin role.
pub struct AdminUser(pub UserProfile);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Authenticated(identity) = Authenticated::from_request_parts(parts, state).await?;
        let profile = state.services.users.require_admin(&identity).await?;
        Ok(Self(profile))
    }
}
