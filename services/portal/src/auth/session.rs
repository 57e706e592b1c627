//! Portal session tokens.
//!
//! # Purpose
//! After an upstream ID token is verified the portal mints its own short-lived
//! session JWT. Handlers only ever see these session tokens.
//!
//! # Key invariants
//! - Session tokens are always EdDSA (Ed25519); no other algorithm verifies.
//! - `iss` and `aud` are fixed to `prepdesk-portal` and always validated.
//! - `sub` is the lower-cased email. The role claim is informational; access
//!   is re-resolved from the store on every request.
use crate::auth::keys::{SEED_LEN, generate_kid, generate_seed};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use prepdesk_identity::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SESSION_ISSUER: &str = "prepdesk-portal";
pub const SESSION_AUDIENCE: &str = "prepdesk-portal";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("key error: {0}")]
    Key(String),
}

/// Signing material for session tokens, built once at startup.
#[derive(Clone)]
pub struct SessionKeys {
    kid: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("kid", &self.kid)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn from_seed(seed: [u8; SEED_LEN], ttl: Duration) -> Result<Self, SessionError> {
        let signing_key = Ed25519SigningKey::from_bytes(&seed);
        let der = signing_key
            .to_pkcs8_der()
            .map_err(|err| SessionError::Key(err.to_string()))?;
        let public = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());
        let decoding = DecodingKey::from_ed_components(&public)?;
        Ok(Self {
            kid: generate_kid(),
            encoding: EncodingKey::from_ed_der(der.as_bytes()),
            decoding,
            ttl,
        })
    }

    pub fn from_optional_seed(
        seed: Option<[u8; SEED_LEN]>,
        ttl: Duration,
    ) -> Result<Self, SessionError> {
        Self::from_seed(seed.unwrap_or_else(generate_seed), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn mint(&self, email: &str, name: &str, role: Role) -> Result<(String, SessionClaims), SessionError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            iss: SESSION_ISSUER.to_string(),
            aud: SESSION_AUDIENCE.to_string(),
            sub: email.to_string(),
            name: name.to_string(),
            role,
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding)?;
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str, leeway: u64) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.set_audience(&[SESSION_AUDIENCE]);
        validation.leeway = leeway;
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
