use serde::Deserialize;
use shared::listener::{Listener, ListenerError};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ROTATION_THRESHOLD: u64 = kvpool::pool::DEFAULT_ROTATION_THRESHOLD;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 50;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("api_id must be set")]
    MissingApiId,

    #[error("api_hash must be set")]
    MissingApiHash,

    #[error("at least one storage backend is required")]
    NoBackends,

    #[error("Empty backend name")]
    EmptyBackendName,

    #[error("Duplicate backend name: {0}")]
    DuplicateBackend(String),

    #[error("invalid environment variable {name}: {reason}")]
    InvalidEnv { name: String, reason: String },
}

/// MTProto application credentials.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TelegramConfig {
    pub api_id: i32,
    pub api_hash: String,
    /// Accept only sessions that belong to the test data centers. Sessions
    /// from the other environment are refused before connecting.
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum BackendType {
    Upstash { url: Url, token: String },
    Memory,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub name: String,
    #[serde(flatten)]
    pub r#type: BackendType,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    pub telegram: TelegramConfig,
    /// Storage backends in rotation order.
    pub backends: Vec<BackendConfig>,
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold: u64,
    /// Lifetime of stored sessions. 0 keeps them until evicted.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Pause between consecutive sends of a bulk request.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    /// Deadline for a single remote call. 0 disables it.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Largest accepted login request body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_rotation_threshold() -> u64 {
    DEFAULT_ROTATION_THRESHOLD
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_send_interval_ms() -> u64 {
    DEFAULT_SEND_INTERVAL_MS
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

fn default_static_dir() -> PathBuf {
    DEFAULT_STATIC_DIR.into()
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.telegram.api_id == 0 {
            return Err(ValidationError::MissingApiId);
        }
        if self.telegram.api_hash.is_empty() {
            return Err(ValidationError::MissingApiHash);
        }

        if self.backends.is_empty() {
            return Err(ValidationError::NoBackends);
        }

        let mut names = HashSet::new();
        for backend in &self.backends {
            if backend.name.is_empty() {
                return Err(ValidationError::EmptyBackendName);
            }
            if !names.insert(&backend.name) {
                return Err(ValidationError::DuplicateBackend(backend.name.clone()));
            }
        }

        Ok(())
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }

    /// Builds the configuration from environment variables.
    ///
    /// Backends are read from `UPSTASH_REDIS_REST_URL_<n>` and
    /// `UPSTASH_REDIS_REST_TOKEN_<n>` for n = 1, 2, ... until the first
    /// missing index. The result still has to pass [`Config::validate`].
    pub fn from_env() -> Result<Self, ValidationError> {
        Config::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ValidationError> {
        let vars: BTreeMap<String, String> = vars.into_iter().collect();
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let mut backends = Vec::new();
        for n in 1.. {
            let (Some(url), Some(token)) = (
                get(&format!("UPSTASH_REDIS_REST_URL_{n}")),
                get(&format!("UPSTASH_REDIS_REST_TOKEN_{n}")),
            ) else {
                break;
            };

            let url = Url::parse(url).map_err(|e| ValidationError::InvalidEnv {
                name: format!("UPSTASH_REDIS_REST_URL_{n}"),
                reason: e.to_string(),
            })?;
            backends.push(BackendConfig {
                name: format!("upstash-{n}"),
                r#type: BackendType::Upstash {
                    url,
                    token: token.to_string(),
                },
            });
        }

        let listener = Listener {
            host: get("HOST").map_or_else(|| Listener::default().host, str::to_string),
            port: parse_var(get("PORT"), "PORT", shared::listener::DEFAULT_PORT)?,
        };

        Ok(Config {
            listener,
            telegram: TelegramConfig {
                api_id: parse_var(get("API_ID"), "API_ID", 0)?,
                api_hash: get("API_HASH").unwrap_or_default().to_string(),
                test_mode: parse_var(get("TELEGRAM_TEST_MODE"), "TELEGRAM_TEST_MODE", false)?,
            },
            backends,
            rotation_threshold: parse_var(
                get("ROTATION_THRESHOLD"),
                "ROTATION_THRESHOLD",
                DEFAULT_ROTATION_THRESHOLD,
            )?,
            session_ttl_secs: parse_var(
                get("SESSION_TTL_SECS"),
                "SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?,
            send_interval_ms: parse_var(
                get("SEND_INTERVAL_MS"),
                "SEND_INTERVAL_MS",
                DEFAULT_SEND_INTERVAL_MS,
            )?,
            call_timeout_secs: parse_var(
                get("CALL_TIMEOUT_SECS"),
                "CALL_TIMEOUT_SECS",
                DEFAULT_CALL_TIMEOUT_SECS,
            )?,
            static_dir: get("STATIC_DIR").map_or_else(default_static_dir, PathBuf::from),
            max_upload_bytes: parse_var(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
        })
    }
}

fn parse_var<T>(value: Option<&str>, name: &str, default: T) -> Result<T, ValidationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ValidationError::InvalidEnv {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}
