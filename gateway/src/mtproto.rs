//! [`Connector`] backed by the grammers MTProto client.
//!
//! The stored DC address and auth key are injected into an in-memory grammers
//! session, so no login flow runs here. Only the methods the gateway issues
//! are mapped onto typed requests.

use crate::config::TelegramConfig;
use crate::protocol::{CallError, Connector, GET_FULL_USER, RemoteSession, SEND_MESSAGE};
use async_trait::async_trait;
use grammers_client::{Client, Config, InitParams, InputMessage, InvocationError};
use grammers_session::{PackedChat, PackedType, Session};
use grammers_tl_types as tl;
use serde_json::{Value, json};
use sessionfile::SessionRecord;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Data centers of the test environment (DC 1 to 3).
const TEST_DC_ADDRESSES: [Ipv4Addr; 3] = [
    Ipv4Addr::new(149, 154, 175, 10),
    Ipv4Addr::new(149, 154, 167, 40),
    Ipv4Addr::new(149, 154, 175, 117),
];

pub struct GrammersConnector {
    api_id: i32,
    api_hash: String,
    test_mode: bool,
}

impl GrammersConnector {
    pub fn new(config: &TelegramConfig) -> Self {
        GrammersConnector {
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            test_mode: config.test_mode,
        }
    }
}

fn map_rpc_error(code: i32, name: String) -> CallError {
    if code == 401 {
        CallError::Unauthorized(name)
    } else {
        CallError::Rejected {
            code,
            message: name,
        }
    }
}

fn map_invocation_error(err: InvocationError) -> CallError {
    match err {
        InvocationError::Rpc(rpc) => map_rpc_error(rpc.code, rpc.name),
        other => CallError::Transient(other.to_string()),
    }
}

/// Sessions only authorize against the environment they were created in, so a
/// record from the other one is refused before any connection is made.
fn check_environment(addr: &SocketAddr, test_mode: bool) -> Result<(), CallError> {
    let is_test_dc = match addr.ip() {
        IpAddr::V4(ip) => TEST_DC_ADDRESSES.contains(&ip),
        IpAddr::V6(_) => false,
    };

    match (is_test_dc, test_mode) {
        (true, false) => Err(CallError::Rejected {
            code: 400,
            message: format!("{addr} is a test data center"),
        }),
        (false, true) => Err(CallError::Rejected {
            code: 400,
            message: format!("{addr} is not a test data center"),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl Connector for GrammersConnector {
    async fn load_session(
        &self,
        record: &SessionRecord,
    ) -> Result<Box<dyn RemoteSession>, CallError> {
        let addr = record
            .socket_addr()
            .map_err(|e| CallError::Rejected {
                code: 400,
                message: format!("invalid server address: {e}"),
            })?;
        let auth_key = record.auth_key_array().ok_or_else(|| CallError::Rejected {
            code: 400,
            message: "auth key has the wrong length".into(),
        })?;
        check_environment(&addr, self.test_mode)?;

        let session = Session::new();
        session.insert_dc(record.dc_id, addr, auth_key);
        session.set_user(0, record.dc_id, false);

        tracing::debug!(
            dc_id = record.dc_id,
            %addr,
            test_mode = self.test_mode,
            "connecting to MTProto data center"
        );

        let client = Client::connect(Config {
            session,
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| CallError::Transient(e.to_string()))?;

        if !client.is_authorized().await.map_err(map_invocation_error)? {
            return Err(CallError::Unauthorized("session is not logged in".into()));
        }

        Ok(Box::new(GrammersSession { client }))
    }
}

struct GrammersSession {
    client: Client,
}

impl GrammersSession {
    async fn get_full_user(&self) -> Result<Value, CallError> {
        let request = tl::functions::users::GetFullUser {
            id: tl::enums::InputUser::UserSelf,
        };
        let tl::enums::users::UserFull::Full(full) = self
            .client
            .invoke(&request)
            .await
            .map_err(map_invocation_error)?;

        let tl::enums::UserFull::Full(user) = full.full_user;
        let users: Vec<i64> = full
            .users
            .iter()
            .filter_map(|u| match u {
                tl::enums::User::User(u) => Some(u.id),
                tl::enums::User::Empty(_) => None,
            })
            .collect();

        Ok(json!({
            "_": "users.userFull",
            "full_user": { "id": user.id },
            "users": users.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
        }))
    }

    async fn send_message(&self, params: &Value) -> Result<Value, CallError> {
        let user_id = params
            .pointer("/peer/user_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| CallError::Rejected {
                code: 400,
                message: "PEER_ID_INVALID".into(),
            })?;
        let text = params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let peer = PackedChat {
            ty: PackedType::User,
            id: user_id,
            access_hash: None,
        };
        let sent = self
            .client
            .send_message(peer, InputMessage::text(text))
            .await
            .map_err(map_invocation_error)?;

        Ok(json!({ "_": "message", "id": sent.id() }))
    }
}

#[async_trait]
impl RemoteSession for GrammersSession {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        match method {
            GET_FULL_USER => self.get_full_user().await,
            SEND_MESSAGE => self.send_message(&params).await,
            _ => Err(CallError::Rejected {
                code: 400,
                message: format!("unsupported method {method}"),
            }),
        }
    }

    async fn close(&self) {
        // The connection is torn down when the client handle is dropped.
        tracing::trace!("closing MTProto session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(test_mode: bool) -> GrammersConnector {
        GrammersConnector::new(&TelegramConfig {
            api_id: 1,
            api_hash: "abc".into(),
            test_mode,
        })
    }

    fn record(server_address: &str, port: u16) -> SessionRecord {
        SessionRecord {
            dc_id: 2,
            server_address: server_address.into(),
            port: Some(port),
            auth_key: vec![7; sessionfile::record::AUTH_KEY_LEN],
            takeout_id: None,
        }
    }

    #[test]
    fn test_map_rpc_error() {
        assert!(matches!(
            map_rpc_error(401, "AUTH_KEY_UNREGISTERED".into()),
            CallError::Unauthorized(name) if name == "AUTH_KEY_UNREGISTERED"
        ));
        assert!(matches!(
            map_rpc_error(400, "PEER_ID_INVALID".into()),
            CallError::Rejected { code: 400, message } if message == "PEER_ID_INVALID"
        ));
        assert!(matches!(
            map_rpc_error(420, "FLOOD_WAIT".into()),
            CallError::Rejected { code: 420, .. }
        ));
    }

    #[test]
    fn test_check_environment() {
        let production: SocketAddr = "149.154.167.51:443".parse().unwrap();
        let test: SocketAddr = "149.154.167.40:443".parse().unwrap();

        assert!(check_environment(&production, false).is_ok());
        assert!(check_environment(&test, true).is_ok());
        assert!(matches!(
            check_environment(&test, false),
            Err(CallError::Rejected { code: 400, .. })
        ));
        assert!(matches!(
            check_environment(&production, true),
            Err(CallError::Rejected { code: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_load_session_wrong_environment() {
        let result = connector(true).load_session(&record("149.154.167.51", 443)).await;
        assert!(matches!(result, Err(CallError::Rejected { code: 400, .. })));
    }

    #[tokio::test]
    async fn test_load_session_unreachable() {
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            connector(false).load_session(&record("127.0.0.1", 9)),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(CallError::Transient(_))));
    }
}
