//! Remote procedure calls against the messaging network.
//!
//! A [`Connector`] turns a stored [`SessionRecord`] into a live
//! [`RemoteSession`]; calls are only reachable through a loaded session.
//! [`ProtocolClient`] adds the per-call deadline and the typed helpers used by
//! the HTTP handlers.

use async_trait::async_trait;
use serde_json::{Value, json};
use sessionfile::SessionRecord;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const GET_FULL_USER: &str = "users.getFullUser";
pub const SEND_MESSAGE: &str = "messages.sendMessage";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// The session was revoked, expired or never authorized.
    #[error("session is not authorized: {0}")]
    Unauthorized(String),

    /// Network failure or timeout. Safe to retry.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The remote refused the request, e.g. an unknown recipient.
    #[error("rejected with code {code}: {message}")]
    Rejected { code: i32, message: String },
}

impl CallError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Transient(_))
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn load_session(
        &self,
        record: &SessionRecord,
    ) -> Result<Box<dyn RemoteSession>, CallError>;
}

#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError>;

    async fn close(&self);
}

/// The authenticated account behind a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Option<i64>,
}

impl Identity {
    fn from_full_user(result: &Value) -> Self {
        let user_id = result
            .pointer("/full_user/id")
            .or_else(|| result.pointer("/users/0/id"))
            .and_then(Value::as_i64);
        Identity { user_id }
    }
}

#[derive(Clone)]
pub struct ProtocolClient {
    connector: Arc<dyn Connector>,
    call_timeout: Option<Duration>,
}

impl ProtocolClient {
    pub fn new(connector: Arc<dyn Connector>, call_timeout: Option<Duration>) -> Self {
        ProtocolClient {
            connector,
            call_timeout,
        }
    }

    pub async fn load_session(&self, record: &SessionRecord) -> Result<LoadedSession, CallError> {
        let remote = with_deadline(self.call_timeout, self.connector.load_session(record)).await?;
        Ok(LoadedSession {
            remote,
            call_timeout: self.call_timeout,
        })
    }
}

pub struct LoadedSession {
    remote: Box<dyn RemoteSession>,
    call_timeout: Option<Duration>,
}

impl LoadedSession {
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        tracing::trace!(method, "remote call");
        with_deadline(self.call_timeout, self.remote.call(method, params)).await
    }

    /// Fetches the account of the session itself. Fails with
    /// [`CallError::Unauthorized`] for sessions the network does not accept.
    pub async fn verify_identity(&self) -> Result<Identity, CallError> {
        let result = self
            .call(GET_FULL_USER, json!({ "id": { "_": "inputUserSelf" } }))
            .await?;
        Ok(Identity::from_full_user(&result))
    }

    pub async fn send_text(&self, user_id: i64, message: &str) -> Result<(), CallError> {
        let params = json!({
            "peer": { "_": "inputPeerUser", "user_id": user_id },
            "message": message,
            "random_id": rand::random::<i64>(),
        });
        self.call(SEND_MESSAGE, params).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.remote.close().await;
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, CallError>>,
) -> Result<T, CallError> {
    match deadline {
        Some(deadline) => tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| CallError::Transient(format!("no response within {deadline:?}")))?,
        None => fut.await,
    }
}

#[cfg(test)]
pub(crate) mod testutils {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub method: String,
        pub params: Value,
        pub at: Instant,
    }

    /// Accepts sessions whose first auth key byte is not `0xff` and records
    /// every call made through them.
    #[derive(Default)]
    pub struct MockConnector {
        pub calls: Arc<Mutex<Vec<RecordedCall>>>,
        /// Sends to these user ids are rejected.
        pub rejected_users: Vec<i64>,
        /// Delay applied to every call.
        pub latency: Option<Duration>,
    }

    impl MockConnector {
        pub fn sends(&self) -> Vec<RecordedCall> {
            self.calls
                .lock()
                .iter()
                .filter(|c| c.method == SEND_MESSAGE)
                .cloned()
                .collect()
        }
    }

    struct MockSession {
        calls: Arc<Mutex<Vec<RecordedCall>>>,
        rejected_users: Vec<i64>,
        latency: Option<Duration>,
        dc_id: i32,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn load_session(
            &self,
            record: &SessionRecord,
        ) -> Result<Box<dyn RemoteSession>, CallError> {
            if record.auth_key.first() == Some(&0xff) {
                return Err(CallError::Unauthorized("AUTH_KEY_UNREGISTERED".into()));
            }
            Ok(Box::new(MockSession {
                calls: self.calls.clone(),
                rejected_users: self.rejected_users.clone(),
                latency: self.latency,
                dc_id: record.dc_id,
            }))
        }
    }

    #[async_trait]
    impl RemoteSession for MockSession {
        async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }

            self.calls.lock().push(RecordedCall {
                method: method.to_string(),
                params: params.clone(),
                at: Instant::now(),
            });

            match method {
                GET_FULL_USER => Ok(json!({
                    "_": "users.userFull",
                    "full_user": { "id": 7_000_000 + i64::from(self.dc_id) },
                })),
                SEND_MESSAGE => {
                    let user_id = params.pointer("/peer/user_id").and_then(Value::as_i64);
                    match user_id {
                        Some(id) if self.rejected_users.contains(&id) => Err(CallError::Rejected {
                            code: 400,
                            message: "PEER_ID_INVALID".into(),
                        }),
                        Some(_) => Ok(json!({ "_": "updateShortSentMessage" })),
                        None => Err(CallError::Rejected {
                            code: 400,
                            message: "INPUT_USER_DEACTIVATED".into(),
                        }),
                    }
                }
                _ => Err(CallError::Rejected {
                    code: 400,
                    message: format!("unsupported method {method}"),
                }),
            }
        }

        async fn close(&self) {}
    }
}
