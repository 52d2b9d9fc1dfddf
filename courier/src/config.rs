use gateway::config::{Config as GatewayConfig, ValidationError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_vars(std::env::vars())
    }

    /// `SENTRY_DSN` and `STATSD_HOST`/`STATSD_PORT` on top of the gateway's
    /// own variables.
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let vars: BTreeMap<String, String> = vars.into_iter().collect();
        let get = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();

        let logging = get("SENTRY_DSN").map(|sentry_dsn| LoggingConfig { sentry_dsn });

        let metrics = match (get("STATSD_HOST"), get("STATSD_PORT")) {
            (Some(statsd_host), port) => Some(MetricsConfig {
                statsd_host,
                statsd_port: match port {
                    Some(port) => port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                        name: "STATSD_PORT",
                        value: port.clone(),
                    })?,
                    None => DEFAULT_STATSD_PORT,
                },
            }),
            (None, _) => None,
        };

        Ok(Config {
            common: CommonConfig { metrics, logging },
            gateway: GatewayConfig::from_vars(vars.clone())?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        Ok(())
    }
}

const DEFAULT_STATSD_PORT: u16 = 8125;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}
