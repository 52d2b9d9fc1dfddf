//! Client for the Upstash Redis REST interface.
//!
//! Every command is a `POST` of a JSON array (`["SET", "k", "v"]`) to the
//! database URL, authenticated with a bearer token. Replies are
//! `{"result": ...}` or `{"error": "..."}`.

use crate::errors::StoreError;
use crate::store::KvStore;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const USAGE_STAT: &str = "total_commands_processed";

/// Upper bound on a single REST command, connect time included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct UpstashReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct UpstashStore {
    name: String,
    client: reqwest::Client,
    url: Url,
    token: String,
    timeout: Duration,
}

impl UpstashStore {
    pub fn new(name: impl Into<String>, url: Url, token: impl Into<String>) -> Self {
        UpstashStore {
            name: name.into(),
            client: reqwest::Client::new(),
            url,
            token: token.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn command(&self, args: &[&str]) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(args)
            .send()
            .await?;

        let status = response.status();

        // Command errors come back as a JSON envelope with a 4xx status; anything
        // that isn't an envelope is reported by status alone.
        let reply = match response.json::<UpstashReply>().await {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => return Err(StoreError::Status(status)),
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = reply.error {
            return Err(StoreError::Backend(error));
        }

        if !status.is_success() {
            return Err(StoreError::Status(status));
        }

        Ok(reply.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl KvStore for UpstashStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.command(&["GET", key]).await? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            other => Err(StoreError::UnexpectedResponse(format!(
                "GET returned {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let result = match ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1).to_string();
                self.command(&["SET", key, value, "EX", secs.as_str()]).await?
            }
            None => self.command(&["SET", key, value]).await?,
        };

        match result {
            Value::String(ref ok) if ok == "OK" => Ok(()),
            other => Err(StoreError::UnexpectedResponse(format!(
                "SET returned {other}"
            ))),
        }
    }

    async fn commands_processed(&self) -> Result<u64, StoreError> {
        match self.command(&["INFO", "stats"]).await? {
            Value::String(info) => parse_info_stat(&info, USAGE_STAT).ok_or_else(|| {
                StoreError::UnexpectedResponse(format!("INFO stats has no {USAGE_STAT}"))
            }),
            other => Err(StoreError::UnexpectedResponse(format!(
                "INFO returned {other}"
            ))),
        }
    }
}

/// Reads a numeric `field:value` line out of Redis `INFO` output.
fn parse_info_stat(info: &str, field: &str) -> Option<u64> {
    info.lines().find_map(|line| {
        let (name, value) = line.trim().split_once(':')?;
        if name == field {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
