//! Upstream OpenID Connect ID-token validation.
//!
//! # Purpose
//! Verifies the ID token the browser receives from the identity provider at
//! sign-in, so the portal can trust the caller's email before minting a
//! session.
//!
//! # Key invariants
//! - Only algorithms from the configured allowlist are accepted, and the JWK
//!   used must agree with the token's algorithm.
//! - `iss` and `aud` are validated against configuration.
//! - An `email` claim with `email_verified == true` is required.
//! - Discovery documents and JWKS are cached for a bounded TTL; an unknown
//!   `kid` forces one JWKS refresh.
//!
//! # Concurrency model
//! Caches live in `DashMap`s shared across clones of the validator.
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use prepdesk_identity::normalize_email;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The single identity provider the portal trusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcIssuer {
    pub issuer: String,
    pub audiences: Vec<String>,
    pub jwks_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpstreamOidcValidator {
    client: reqwest::Client,
    jwks_cache: Arc<DashMap<String, CachedJwks>>,
    discovery_cache: Arc<DashMap<String, CachedDiscovery>>,
    jwks_ttl: Duration,
    discovery_ttl: Duration,
    clock_skew_seconds: u64,
    allowed_algorithms: Vec<Algorithm>,
}

/// Identity read from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub issuer: String,
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("missing issuer")]
    MissingIssuer,
    #[error("issuer not allowed")]
    IssuerNotAllowed,
    #[error("missing subject")]
    MissingSubject,
    #[error("missing email")]
    MissingEmail,
    #[error("email not verified")]
    EmailNotVerified,
    #[error("missing key id")]
    MissingKeyId,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("jwks key not found")]
    JwksKeyNotFound,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct CachedDiscovery {
    jwks_url: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

impl Default for UpstreamOidcValidator {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            60,
            vec![Algorithm::RS256, Algorithm::ES256],
        )
    }
}

impl UpstreamOidcValidator {
    pub fn new(
        jwks_ttl: Duration,
        discovery_ttl: Duration,
        clock_skew_seconds: u64,
        allowed_algorithms: Vec<Algorithm>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_cache: Arc::new(DashMap::new()),
            discovery_cache: Arc::new(DashMap::new()),
            jwks_ttl,
            discovery_ttl,
            clock_skew_seconds,
            allowed_algorithms,
        }
    }

    pub async fn validate(
        &self,
        token: &str,
        issuer_cfg: &OidcIssuer,
    ) -> Result<VerifiedIdentity, OidcError> {
        let header = decode_header(token)?;
        if !self.allowed_algorithms.contains(&header.alg) {
            return Err(OidcError::UnsupportedAlgorithm);
        }
        let kid = header.kid.as_deref().ok_or(OidcError::MissingKeyId)?;

        // Unverified read, only to reject foreign issuers before any fetch.
        let unsafe_claims = decode_unverified_claims(token)?;
        let issuer = extract_string_claim(&unsafe_claims, "iss").ok_or(OidcError::MissingIssuer)?;
        if issuer.trim_end_matches('/') != issuer_cfg.issuer.trim_end_matches('/') {
            return Err(OidcError::IssuerNotAllowed);
        }

        let jwks_url = self.resolve_jwks_url(issuer_cfg).await?;
        let jwks = self.get_jwks(&jwks_url).await?;
        let decoding_key = match find_jwk(&jwks, kid) {
            Some(key) => {
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
            None => {
                let refreshed = self.refresh_jwks(&jwks_url).await?;
                let key = find_jwk(&refreshed, kid).ok_or(OidcError::JwksKeyNotFound)?;
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_audience(&issuer_cfg.audiences);
        validation
            .required_spec_claims
            .extend(["iss".to_string(), "aud".to_string()]);
        validation.leeway = self.clock_skew_seconds;

        let token = decode::<Value>(token, &decoding_key, &validation)?;
        validate_iat(&token.claims, self.clock_skew_seconds)?;

        let subject = extract_string_claim(&token.claims, "sub").ok_or(OidcError::MissingSubject)?;
        let email = extract_string_claim(&token.claims, "email")
            .filter(|email| !email.trim().is_empty())
            .ok_or(OidcError::MissingEmail)?;
        if !email_verified(&token.claims) {
            return Err(OidcError::EmailNotVerified);
        }

        Ok(VerifiedIdentity {
            issuer,
            subject,
            email: normalize_email(&email),
            name: extract_string_claim(&token.claims, "name"),
        })
    }

    async fn resolve_jwks_url(&self, issuer_cfg: &OidcIssuer) -> Result<String, OidcError> {
        if let Some(url) = &issuer_cfg.jwks_url {
            return Ok(url.clone());
        }
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            issuer_cfg.issuer.trim_end_matches('/')
        );

        if let Some(entry) = self.discovery_cache.get(&discovery_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks_url.clone());
        }

        let doc: DiscoveryDocument = self.client.get(&discovery_url).send().await?.json().await?;
        self.discovery_cache.insert(
            discovery_url,
            CachedDiscovery {
                jwks_url: doc.jwks_uri.clone(),
                expires_at: Instant::now() + self.discovery_ttl,
            },
        );
        Ok(doc.jwks_uri)
    }

    async fn get_jwks(&self, jwks_url: &str) -> Result<JwkSet, OidcError> {
        if let Some(entry) = self.jwks_cache.get(jwks_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks.clone());
        }
        self.refresh_jwks(jwks_url).await
    }

    async fn refresh_jwks(&self, jwks_url: &str) -> Result<JwkSet, OidcError> {
        tracing::debug!(%jwks_url, "refreshing jwks");
        let jwks: JwkSet = self.client.get(jwks_url).send().await?.json().await?;
        self.jwks_cache.insert(
            jwks_url.to_string(),
            CachedJwks {
                jwks: jwks.clone(),
                expires_at: Instant::now() + self.jwks_ttl,
            },
        );
        Ok(jwks)
    }
}

fn ensure_jwk_matches_algorithm(jwk: &Jwk, alg: Algorithm) -> Result<(), OidcError> {
    // Some providers omit `alg` on their JWKs; the key type must still agree.
    if let Some(key_alg) = jwk.common.key_algorithm {
        match (key_alg, alg) {
            (KeyAlgorithm::RS256, Algorithm::RS256) => {}
            (KeyAlgorithm::ES256, Algorithm::ES256) => {}
            _ => return Err(OidcError::InvalidJwk("alg mismatch".to_string())),
        }
    }
    match (&jwk.algorithm, alg) {
        (AlgorithmParameters::RSA(_), Algorithm::RS256) => Ok(()),
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            if params.curve != EllipticCurve::P256 {
                return Err(OidcError::InvalidJwk("unexpected EC curve".to_string()));
            }
            Ok(())
        }
        _ => Err(OidcError::InvalidJwk("kty mismatch".to_string())),
    }
}

fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}

fn decode_unverified_claims(token: &str) -> Result<Value, OidcError> {
    let mut parts = token.split('.');
    let _header = parts.next();
    let payload = parts
        .next()
        .ok_or_else(|| OidcError::InvalidClaim("token format".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| OidcError::InvalidClaim("token payload".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| OidcError::InvalidClaim(format!("token payload: {err}")))
}

fn extract_string_claim(claims: &Value, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

/// Some providers encode the flag as the string `"true"`.
fn email_verified(claims: &Value) -> bool {
    match claims.get("email_verified") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn validate_iat(claims: &Value, leeway_seconds: u64) -> Result<(), OidcError> {
    let iat = claims
        .get("iat")
        .and_then(|value| value.as_i64())
        .ok_or_else(|| OidcError::InvalidClaim("iat".to_string()))?;
    let now = Utc::now().timestamp();
    if iat > now + leeway_seconds as i64 {
        return Err(OidcError::InvalidClaim("iat in future".to_string()));
    }
    Ok(())
}
