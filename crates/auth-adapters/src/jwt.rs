//! HS256 bearer tokens shared with the identity provider.
//!
//! The provider signs `{sub, email, name?, exp}` with a shared secret; this
//! adapter only verifies. [`JwtIssuer`] exists for seeding and tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use domains::{DomainError, Identity, IdentityProvider, Result, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    exp: i64,
    #[serde(default)]
    iat: i64,
}

pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            DomainError::Unauthorized("invalid or expired session".into())
        })?;
        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(DomainError::Unauthorized("token has no subject".into()));
        }
        Ok(Identity {
            user_id: UserId::new(claims.sub),
            email: claims.email,
            name: claims.name,
        })
    }
}

/// Signs tokens with the same secret the verifier uses.
pub struct JwtIssuer {
    key: EncodingKey,
}

impl JwtIssuer {
    pub fn new(secret: &SecretString) -> Self {
        Self { key: EncodingKey::from_secret(secret.expose_secret().as_bytes()) }
    }

    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| DomainError::Internal(format!("failed to sign token: {e}")))
    }
}
