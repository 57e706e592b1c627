//! Portal configuration.
//!
//! # Purpose
//! Reads `PREPDESK_*` environment variables with defaults, then applies an
//! optional YAML override file named by `PREPDESK_CONFIG`.
//!
//! # Notes
//! Secrets (session seed, bootstrap secret) are accepted from either source but
//! never logged.
use crate::auth::keys::decode_seed;
use anyhow::{Context, Result, bail};
use jsonwebtoken::Algorithm;
use prepdesk_identity::roster::RolePolicy;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MONGO_DATABASE: &str = "prepdesk";
pub const DEFAULT_MONGO_MAX_POOL_SIZE: u32 = 1;
pub const DEFAULT_MONGO_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 8 * 60 * 60;
pub const DEFAULT_OIDC_ALGORITHMS: &str = "RS256,ES256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Mongo,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "mongo" | "mongodb" => Ok(Self::Mongo),
            other => bail!("unknown storage backend {other:?}; expected memory or mongo"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub max_pool_size: u32,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcConfig {
    /// Sign-in is disabled when no issuer is configured.
    pub issuer: Option<String>,
    pub audiences: Vec<String>,
    pub jwks_url: Option<String>,
    pub allowed_algorithms: Vec<Algorithm>,
}

#[derive(Clone)]
pub struct SessionConfig {
    /// Random per process when unset, which invalidates sessions on restart.
    pub signing_seed: Option<[u8; 32]>,
    pub ttl: Duration,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("signing_seed", &self.signing_seed.map(|_| "<redacted>"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub environment: String,
    pub storage: StorageBackend,
    pub mongo: Option<MongoConfig>,
    pub data_dir: PathBuf,
    pub oidc: OidcConfig,
    pub session: SessionConfig,
    pub bootstrap_secret: Option<String>,
    pub role_policy: RolePolicy,
}

#[derive(Debug, Default, Deserialize)]
struct PortalConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    environment: Option<String>,
    storage: Option<String>,
    mongo_uri: Option<String>,
    mongo_database: Option<String>,
    mongo_max_pool_size: Option<u32>,
    mongo_connect_timeout_ms: Option<u64>,
    data_dir: Option<PathBuf>,
    oidc_issuer: Option<String>,
    oidc_audiences: Option<Vec<String>>,
    oidc_jwks_url: Option<String>,
    oidc_algorithms: Option<Vec<String>>,
    session_seed: Option<String>,
    session_ttl_secs: Option<u64>,
    bootstrap_secret: Option<String>,
    role_policy: Option<String>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .parse()
            .map_err(|err| anyhow::anyhow!("parse {key}: {err}")),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_algorithms<S: AsRef<str>>(names: &[S]) -> Result<Vec<Algorithm>> {
    let algorithms = names
        .iter()
        .map(|name| {
            Algorithm::from_str(name.as_ref().trim())
                .with_context(|| format!("unknown jwt algorithm {:?}", name.as_ref()))
        })
        .collect::<Result<Vec<_>>>()?;
    if algorithms.is_empty() {
        bail!("at least one OIDC algorithm must be allowed");
    }
    if algorithms
        .iter()
        .any(|alg| matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
    {
        bail!("symmetric algorithms are not accepted for upstream ID tokens");
    }
    Ok(algorithms)
}

impl PortalConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("PREPDESK_BIND", DEFAULT_BIND)
            .parse()
            .with_context(|| "parse PREPDESK_BIND")?;
        let metrics_bind = env_or("PREPDESK_METRICS_BIND", DEFAULT_METRICS_BIND)
            .parse()
            .with_context(|| "parse PREPDESK_METRICS_BIND")?;
        let storage = env_or("PREPDESK_STORAGE", "memory")
            .parse()
            .with_context(|| "parse PREPDESK_STORAGE")?;

        let mongo = match env_opt("PREPDESK_MONGO_URI") {
            Some(uri) => Some(MongoConfig {
                uri,
                database: env_or("PREPDESK_MONGO_DATABASE", DEFAULT_MONGO_DATABASE),
                max_pool_size: env_parse(
                    "PREPDESK_MONGO_MAX_POOL_SIZE",
                    DEFAULT_MONGO_MAX_POOL_SIZE,
                )?,
                connect_timeout_ms: env_parse(
                    "PREPDESK_MONGO_CONNECT_TIMEOUT_MS",
                    DEFAULT_MONGO_CONNECT_TIMEOUT_MS,
                )?,
            }),
            None => None,
        };

        let algorithms = split_list(&env_or("PREPDESK_OIDC_ALGORITHMS", DEFAULT_OIDC_ALGORITHMS));
        let oidc = OidcConfig {
            issuer: env_opt("PREPDESK_OIDC_ISSUER"),
            audiences: env_opt("PREPDESK_OIDC_AUDIENCES")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            jwks_url: env_opt("PREPDESK_OIDC_JWKS_URL"),
            allowed_algorithms: parse_algorithms(&algorithms)?,
        };

        let session = SessionConfig {
            signing_seed: env_opt("PREPDESK_SESSION_SEED")
                .map(|raw| decode_seed(&raw).with_context(|| "parse PREPDESK_SESSION_SEED"))
                .transpose()?,
            ttl: Duration::from_secs(env_parse(
                "PREPDESK_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?),
        };

        let role_policy = match env_opt("PREPDESK_ROLE_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|err: String| anyhow::anyhow!("parse PREPDESK_ROLE_POLICY: {err}"))?,
            None => RolePolicy::default(),
        };

        Ok(Self {
            bind_addr,
            metrics_bind,
            environment: env_or("PREPDESK_ENV", DEFAULT_ENVIRONMENT),
            storage,
            mongo,
            data_dir: PathBuf::from(env_or("PREPDESK_DATA_DIR", DEFAULT_DATA_DIR)),
            oidc,
            session,
            bootstrap_secret: env_opt("PREPDESK_BOOTSTRAP_SECRET"),
            role_policy,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Some(path) = env_opt("PREPDESK_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read PREPDESK_CONFIG: {path}"))?;
            let override_cfg: PortalConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse portal config yaml")?;
            config.apply(override_cfg)?;
        }
        Ok(config)
    }

    fn apply(&mut self, cfg: PortalConfigOverride) -> Result<()> {
        if let Some(value) = cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = cfg.environment {
            self.environment = value;
        }
        if let Some(value) = cfg.storage {
            self.storage = value.parse().with_context(|| "parse storage")?;
        }
        if let Some(uri) = cfg.mongo_uri {
            let mongo = self.mongo.get_or_insert_with(|| MongoConfig {
                uri: String::new(),
                database: DEFAULT_MONGO_DATABASE.to_string(),
                max_pool_size: DEFAULT_MONGO_MAX_POOL_SIZE,
                connect_timeout_ms: DEFAULT_MONGO_CONNECT_TIMEOUT_MS,
            });
            mongo.uri = uri;
        }
        if let Some(mongo) = self.mongo.as_mut() {
            if let Some(value) = cfg.mongo_database {
                mongo.database = value;
            }
            if let Some(value) = cfg.mongo_max_pool_size {
                mongo.max_pool_size = value;
            }
            if let Some(value) = cfg.mongo_connect_timeout_ms {
                mongo.connect_timeout_ms = value;
            }
        }
        if let Some(value) = cfg.data_dir {
            self.data_dir = value;
        }
        if let Some(value) = cfg.oidc_issuer {
            self.oidc.issuer = Some(value);
        }
        if let Some(value) = cfg.oidc_audiences {
            self.oidc.audiences = value;
        }
        if let Some(value) = cfg.oidc_jwks_url {
            self.oidc.jwks_url = Some(value);
        }
        if let Some(value) = cfg.oidc_algorithms {
            self.oidc.allowed_algorithms = parse_algorithms(&value)?;
        }
        if let Some(value) = cfg.session_seed {
            self.session.signing_seed =
                Some(decode_seed(&value).with_context(|| "parse session_seed")?);
        }
        if let Some(value) = cfg.session_ttl_secs {
            self.session.ttl = Duration::from_secs(value);
        }
        if let Some(value) = cfg.bootstrap_secret {
            self.bootstrap_secret = Some(value);
        }
        if let Some(value) = cfg.role_policy {
            self.role_policy = value
                .parse()
                .map_err(|err: String| anyhow::anyhow!("parse role_policy: {err}"))?;
        }
        Ok(())
    }
}
