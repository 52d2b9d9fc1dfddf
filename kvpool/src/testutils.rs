use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

#[derive(Default)]
struct MockState {
    token: String,
    data: Mutex<HashMap<String, (String, Option<u64>)>>,
    commands: AtomicU64,
}

/// In-process stand-in for an Upstash REST endpoint, bound to an ephemeral port.
pub struct MockUpstash {
    addr: std::net::SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockUpstash {
    pub async fn spawn(token: &str) -> Self {
        let state = Arc::new(MockState {
            token: token.to_string(),
            ..Default::default()
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/", post(handle_command))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockUpstash {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.state.data.lock().get(key).and_then(|(_, ttl)| *ttl)
    }

    pub fn add_commands(&self, n: u64) {
        self.state.commands.fetch_add(n, Ordering::SeqCst);
    }
}

impl Drop for MockUpstash {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn handle_command(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(args): Json<Vec<String>>,
) -> Response {
    let expected = format!("Bearer {}", state.token);
    if headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return reply(StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }));
    }

    let processed = state.commands.fetch_add(1, Ordering::SeqCst) + 1;

    let command = args.first().map(|c| c.to_ascii_uppercase());
    match (command.as_deref(), args.as_slice()) {
        (Some("GET"), [_, key]) => {
            let value = state.data.lock().get(key).map(|(v, _)| v.clone());
            reply(StatusCode::OK, json!({ "result": value }))
        }
        (Some("SET"), [_, key, value, rest @ ..]) => {
            let ttl = match rest {
                [ex, secs] if ex.eq_ignore_ascii_case("EX") => secs.parse().ok(),
                _ => None,
            };
            state
                .data
                .lock()
                .insert(key.clone(), (value.clone(), ttl));
            reply(StatusCode::OK, json!({ "result": "OK" }))
        }
        (Some("INFO"), _) => {
            let info = format!(
                "# Stats\r\ntotal_connections_received:1\r\ntotal_commands_processed:{processed}\r\n"
            );
            reply(StatusCode::OK, json!({ "result": info }))
        }
        _ => reply(
            StatusCode::BAD_REQUEST,
            json!({ "error": "ERR unknown command" }),
        ),
    }
}
