//! HTTP gateway: session file login and bulk message relay.

pub mod api;
pub mod config;
pub mod errors;
pub mod metrics_defs;
#[cfg(feature = "mtproto")]
pub mod mtproto;
pub mod protocol;

use config::{BackendConfig, BackendType, Config, ValidationError};
use kvpool::memory::MemoryStore;
use kvpool::upstash::UpstashStore;
use kvpool::{BackendPool, KvStore, PoolError, SessionStore};
use protocol::{Connector, ProtocolClient};
use sessionfile::Decoders;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum GatewayStartError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("backend pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("this build has no MTProto client; rebuild with the `mtproto` feature")]
    NoProtocolClient,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn build_backends(configs: &[BackendConfig]) -> Vec<Arc<dyn KvStore>> {
    configs
        .iter()
        .map(|backend| -> Arc<dyn KvStore> {
            match &backend.r#type {
                BackendType::Upstash { url, token } => {
                    Arc::new(UpstashStore::new(&backend.name, url.clone(), token))
                }
                BackendType::Memory => Arc::new(MemoryStore::new(&backend.name)),
            }
        })
        .collect()
}

#[cfg(feature = "mtproto")]
fn connector(config: &Config) -> Result<Arc<dyn Connector>, GatewayStartError> {
    Ok(Arc::new(mtproto::GrammersConnector::new(&config.telegram)))
}

#[cfg(not(feature = "mtproto"))]
fn connector(_config: &Config) -> Result<Arc<dyn Connector>, GatewayStartError> {
    Err(GatewayStartError::NoProtocolClient)
}

/// Builds the application state for `config` around the given connector.
pub fn app_state(
    config: &Config,
    connector: Arc<dyn Connector>,
) -> Result<api::AppState, GatewayStartError> {
    let pool = BackendPool::new(build_backends(&config.backends), config.rotation_threshold)?;

    Ok(api::AppState {
        sessions: SessionStore::new(Arc::new(pool), config.session_ttl()),
        protocol: ProtocolClient::new(connector, config.call_timeout()),
        decoders: Arc::new(Decoders::default()),
        send_interval: config.send_interval(),
        max_upload_bytes: config.max_upload_bytes,
    })
}

pub async fn run(config: Config) -> Result<(), GatewayStartError> {
    config.validate()?;

    let state = app_state(&config, connector(&config)?)?;
    tracing::info!(
        backends = config.backends.len(),
        rotation_threshold = config.rotation_threshold,
        test_mode = config.telegram.test_mode,
        "starting gateway"
    );

    let app = api::router(state, &config.static_dir);
    api::serve(&config.listener, app).await?;
    Ok(())
}
